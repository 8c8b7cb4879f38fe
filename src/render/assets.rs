//! Asset-loading boundary and the out-of-band fetch dispatcher.
//!
//! The pipeline never blocks a queue thread on the loader: escalation
//! fetches go through an [`AssetFetcher`], which forwards them to worker
//! tasks and surfaces completions through a non-blocking poll.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tokio::runtime::Runtime;
use tokio::sync::mpsc;

/// What kind of dependency is being fetched.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AssetKind {
    /// Display texture for a material
    Texture,
    /// Source texture a sculpted mesh is generated from
    SculptTexture,
    /// Entity details (e.g. an unresolved parent)
    Entity,
}

/// The asset-loading collaborator: resolve a dependency by identity,
/// making it available to the local caches. Called from fetcher worker
/// tasks; may block.
pub trait AssetLoader: Send + Sync {
    fn load(&self, ident: &str, kind: AssetKind) -> crate::core::Result<()>;
}

/// A fetch forwarded to the loader.
#[derive(Clone, Debug)]
pub struct FetchRequest {
    pub ident: String,
    pub kind: AssetKind,
    pub priority: u32,
}

/// Outcome of a fetch, delivered via [`AssetFetcher::poll_completed`].
#[derive(Debug)]
pub enum FetchResult {
    /// Dependency is now available locally
    Loaded { ident: String, kind: AssetKind },
    /// Loader failed; dependents keep polling and may re-escalate
    Failed {
        ident: String,
        kind: AssetKind,
        reason: String,
    },
}

impl FetchResult {
    fn key(&self) -> (String, AssetKind) {
        match self {
            FetchResult::Loaded { ident, kind } | FetchResult::Failed { ident, kind, .. } => {
                (ident.clone(), *kind)
            }
        }
    }
}

/// Concurrent dependency fetcher with its own runtime.
///
/// Requests are deduplicated against the pending set, dispatched to the
/// loader by priority, and their completions collected for the owner to
/// poll each frame.
pub struct AssetFetcher {
    request_tx: mpsc::UnboundedSender<FetchRequest>,
    result_rx: Mutex<mpsc::UnboundedReceiver<FetchResult>>,
    pending: Mutex<HashSet<(String, AssetKind)>>,
    #[allow(dead_code)]
    runtime: Runtime,
}

impl AssetFetcher {
    /// Create a fetcher dispatching to `loader` with at most
    /// `max_concurrent` fetches in flight at the loader.
    pub fn new(loader: Arc<dyn AssetLoader>, max_concurrent: usize) -> Self {
        let (request_tx, mut request_rx) = mpsc::unbounded_channel::<FetchRequest>();
        let (result_tx, result_rx) = mpsc::unbounded_channel::<FetchResult>();

        let runtime = Runtime::new().expect("failed to create tokio runtime");
        runtime.spawn(async move {
            Self::worker_loop(loader, max_concurrent, &mut request_rx, result_tx).await;
        });

        Self {
            request_tx,
            result_rx: Mutex::new(result_rx),
            pending: Mutex::new(HashSet::new()),
            runtime,
        }
    }

    /// Worker loop dispatching fetches with concurrency control.
    async fn worker_loop(
        loader: Arc<dyn AssetLoader>,
        max_concurrent: usize,
        request_rx: &mut mpsc::UnboundedReceiver<FetchRequest>,
        result_tx: mpsc::UnboundedSender<FetchResult>,
    ) {
        use tokio::task::JoinSet;

        let mut active_tasks = JoinSet::new();
        let mut waiting: Vec<FetchRequest> = Vec::new();

        loop {
            tokio::select! {
                Some(request) = request_rx.recv() => {
                    waiting.push(request);
                }

                Some(result) = active_tasks.join_next(), if !active_tasks.is_empty() => {
                    match result {
                        Ok(fetch_result) => {
                            let _ = result_tx.send(fetch_result);
                        }
                        Err(e) => {
                            log::error!("asset fetch task panicked: {}", e);
                        }
                    }
                }

                // Exit when the channel is closed and no more work
                else => {
                    if waiting.is_empty() && active_tasks.is_empty() {
                        break;
                    }
                }
            }

            while active_tasks.len() < max_concurrent && !waiting.is_empty() {
                // Most urgent (smallest priority) first
                waiting.sort_by(|a, b| a.priority.cmp(&b.priority));
                let request = waiting.remove(0);
                let loader = Arc::clone(&loader);
                active_tasks.spawn(async move { Self::fetch_task(loader, request).await });
            }
        }
    }

    /// Task that resolves a single fetch through the loader.
    async fn fetch_task(loader: Arc<dyn AssetLoader>, request: FetchRequest) -> FetchResult {
        let ident = request.ident.clone();
        let kind = request.kind;

        let outcome =
            tokio::task::spawn_blocking(move || loader.load(&request.ident, request.kind)).await;

        match outcome {
            Ok(Ok(())) => FetchResult::Loaded { ident, kind },
            Ok(Err(e)) => FetchResult::Failed {
                ident,
                kind,
                reason: e.to_string(),
            },
            Err(e) => FetchResult::Failed {
                ident,
                kind,
                reason: e.to_string(),
            },
        }
    }

    /// Request a dependency fetch.
    ///
    /// Returns `false` if the same dependency is already pending, `true`
    /// if the request was dispatched.
    pub fn request(&self, ident: &str, kind: AssetKind, priority: u32) -> bool {
        {
            let mut pending = self.pending.lock().unwrap();
            if !pending.insert((ident.to_string(), kind)) {
                return false;
            }
        }

        self.request_tx
            .send(FetchRequest {
                ident: ident.to_string(),
                kind,
                priority,
            })
            .expect("asset fetch worker died");
        true
    }

    /// Poll for completed fetches (non-blocking). Completed dependencies
    /// leave the pending set and may be requested again.
    pub fn poll_completed(&self) -> Vec<FetchResult> {
        let mut results = Vec::new();
        let mut rx = self.result_rx.lock().unwrap();
        while let Ok(result) = rx.try_recv() {
            self.pending.lock().unwrap().remove(&result.key());
            results.push(result);
        }
        results
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    pub fn is_pending(&self, ident: &str, kind: AssetKind) -> bool {
        self.pending
            .lock()
            .unwrap()
            .contains(&(ident.to_string(), kind))
    }
}
