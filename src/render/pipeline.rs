//! Render-resource creation pipeline with dependency retry.
//!
//! Creation runs in two stages: gathering happens on the continuous
//! worker queue, and the resulting scene-graph mutation is posted to the
//! budgeted frame queue so the engine is only touched between frames.
//! Work whose inputs are missing reports not-yet-ready and is requeued;
//! every Nth consecutive miss for the same dependency escalates into one
//! explicit fetch through the asset loader.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Weak};

use crate::core::config::SchedulerConfig;
use crate::core::stats::{SchedulerStats, StatsSnapshot};
use crate::core::{Result, Vec3};
use crate::work::{Attempt, OnDemandQueue, RunFlag, WorkFn, WorkOutcome, WorkerQueue};
use crate::world::{Entity, EntityId, EntityName, RegionContext, RegionId, UpdateCodes, WorldState};

use super::assets::{AssetFetcher, AssetKind, AssetLoader, FetchResult};
use super::interest::Interest;
use super::sink::{MaterialDef, MeshData, Placement, RenderSink, ResourceKind};

/// Concurrent fetches allowed at the asset loader
const FETCH_CONCURRENCY: usize = 4;

/// Result of gathering inputs for a resource: the data, or the
/// dependency that blocks it.
pub enum Gathered<T> {
    Ready(T),
    Missing(Dependency),
}

/// A dependency that must resolve before creation can complete.
#[derive(Clone, Debug)]
pub struct Dependency {
    pub ident: String,
    pub kind: AssetKind,
}

/// The mesh/material gathering collaborator (world-to-renderer
/// converter). Numerical geometry generation lives behind this trait.
pub trait GeometrySource: Send + Sync {
    /// Mesh data for an entity, or the dependency blocking generation
    /// (e.g. the source texture of a sculpted shape).
    fn mesh(&self, entity: &Entity) -> Result<Gathered<MeshData>>;

    /// Material definition for one of an entity's material resources.
    fn material(&self, entity: &Entity, material: &str) -> Result<Gathered<MaterialDef>>;
}

/// Renderer-side state attached to an entity.
#[derive(Clone, Debug)]
pub struct Attachment {
    pub scene_node: String,
}

/// The resource-creation pipeline.
///
/// Owns the continuous gather queue and the budgeted frame queue;
/// renderer-side state lives in explicit maps keyed by entity identity.
pub struct RenderPipeline {
    /// Handle to ourselves for queued closures. Weak, so undelivered
    /// work never keeps the pipeline alive.
    me: Weak<RenderPipeline>,
    config: SchedulerConfig,
    world: Arc<WorldState>,
    sink: Arc<dyn RenderSink>,
    source: Arc<dyn GeometrySource>,
    fetcher: AssetFetcher,
    interest: Interest,
    stats: Arc<SchedulerStats>,
    /// Continuous gather queue
    work: WorkerQueue,
    /// Budgeted between-frames queue, pumped once per displayed frame
    frames: OnDemandQueue,
    /// Resource names currently being created
    in_flight: Mutex<HashSet<String>>,
    /// Scene-node attachments per entity
    attachments: Mutex<HashMap<EntityId, Attachment>>,
    /// Root scene nodes of mapped regions
    region_roots: Mutex<HashMap<RegionId, String>>,
}

impl RenderPipeline {
    pub fn new(
        config: SchedulerConfig,
        world: Arc<WorldState>,
        sink: Arc<dyn RenderSink>,
        source: Arc<dyn GeometrySource>,
        loader: Arc<dyn AssetLoader>,
        run: RunFlag,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            interest: Interest::new(&config),
            stats: Arc::new(SchedulerStats::new()),
            fetcher: AssetFetcher::new(loader, FETCH_CONCURRENCY),
            work: WorkerQueue::new("render-work", run),
            frames: OnDemandQueue::new("between-frames"),
            config,
            world,
            sink,
            source,
            in_flight: Mutex::new(HashSet::new()),
            attachments: Mutex::new(HashMap::new()),
            region_roots: Mutex::new(HashMap::new()),
        })
    }

    /// Wrap a pipeline method into a queue action. If the pipeline is
    /// gone by the time the item runs, the item completes as a no-op.
    fn action<F>(&self, mut body: F) -> WorkFn
    where
        F: FnMut(&Arc<RenderPipeline>, &Attempt) -> Result<WorkOutcome> + Send + 'static,
    {
        let me = self.me.clone();
        Box::new(move |attempt: &Attempt| match me.upgrade() {
            Some(pipeline) => body(&pipeline, attempt),
            None => Ok(WorkOutcome::Done),
        })
    }

    /// Remember the camera position for interest ranking.
    pub fn note_viewpoint(&self, position: Vec3) {
        self.interest.note_viewpoint(position);
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// The counters themselves, shared with the comm adapter.
    pub fn shared_stats(&self) -> Arc<SchedulerStats> {
        Arc::clone(&self.stats)
    }

    /// Depth of the continuous gather queue.
    pub fn work_depth(&self) -> usize {
        self.work.len()
    }

    /// Depth of the between-frames queue — the backpressure metric.
    pub fn frame_depth(&self) -> usize {
        self.frames.len()
    }

    /// Scene node recorded for an entity, if placed.
    pub fn attachment(&self, id: EntityId) -> Option<Attachment> {
        self.attachments.lock().unwrap().get(&id).cloned()
    }

    /// Stop the gather worker. Queued items are dropped.
    pub fn stop(&self) {
        self.work.stop_and_join();
    }

    // ------------------------------------------------------------------
    // Frame pump
    // ------------------------------------------------------------------

    /// One budgeted pass over the between-frames queue. The render
    /// thread calls this once per displayed frame; it never blocks.
    /// Returns the number of items still queued.
    pub fn pump_frame(&self) -> usize {
        self.absorb_fetches();
        self.frames.pump(self.config.frame_budget)
    }

    /// Turn completed dependency fetches into refresh work.
    fn absorb_fetches(&self) {
        for result in self.fetcher.poll_completed() {
            match result {
                FetchResult::Loaded { ident, kind } => match kind {
                    AssetKind::Texture => {
                        // fresh pixels are in the cache; remap on a frame
                        let sink = Arc::clone(&self.sink);
                        self.frames.enqueue(
                            self.config.default_interest,
                            self.config.costs.map_texture,
                            Box::new(move |a: &Attempt| {
                                sink.refresh_resource(a.priority, ResourceKind::Texture, &ident);
                                Ok(WorkOutcome::Done)
                            }),
                        );
                    }
                    AssetKind::SculptTexture | AssetKind::Entity => {
                        // the blocked items are requeued and will find it
                        log::debug!("dependency resolved: {} ({:?})", ident, kind);
                    }
                },
                FetchResult::Failed { ident, kind, reason } => {
                    log::warn!("dependency fetch failed: {} ({:?}): {}", ident, kind, reason);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Entity placement
    // ------------------------------------------------------------------

    /// Queue creation of an entity's scene node. A node already being
    /// created is dropped silently.
    pub fn render_entity(&self, id: EntityId) {
        let Some(entity) = self.world.entity(id) else {
            log::debug!("render_entity: unknown entity {}", id);
            return;
        };

        let node_name = entity.name.node_name();
        if !self.in_flight.lock().unwrap().insert(node_name.clone()) {
            return;
        }

        let priority = self.interest.rank(entity.position);
        self.work.enqueue(
            priority,
            self.config.costs.create_scene_node,
            self.action(move |pipeline, attempt| pipeline.place_entity(id, &node_name, attempt)),
        );
    }

    /// Gather stage of placement; runs on the worker thread.
    fn place_entity(&self, id: EntityId, node_name: &str, attempt: &Attempt) -> Result<WorkOutcome> {
        self.stats.item_executed();

        let Some(entity) = self.world.entity(id) else {
            // entity vanished while queued
            log::debug!("place {}: entity is gone", node_name);
            self.release_in_flight(node_name);
            return Ok(WorkOutcome::Done);
        };

        if self.attachments.lock().unwrap().contains_key(&id) {
            // already placed
            self.release_in_flight(node_name);
            return Ok(WorkOutcome::Done);
        }

        // Resolve the node this one hangs off: the parent entity's node,
        // or the region root for parentless entities.
        let parent_node = match entity.parent {
            Some(parent_id) => {
                let attached = self
                    .attachments
                    .lock()
                    .unwrap()
                    .get(&parent_id)
                    .map(|a| a.scene_node.clone());
                match attached {
                    Some(node) => node,
                    None => {
                        let ident = match self.world.entity(parent_id) {
                            Some(parent) => parent.name.to_string(),
                            None => parent_id.to_string(),
                        };
                        self.maybe_escalate(attempt, &ident, AssetKind::Entity);
                        log::debug!(
                            "place {}/{}: {} waiting for parent {}",
                            attempt.sequence,
                            attempt.retries,
                            node_name,
                            parent_id
                        );
                        self.stats.item_requeued();
                        return Ok(WorkOutcome::NotYetReady);
                    }
                }
            }
            None => entity.region.node_name(),
        };

        let mesh_name = entity.name.mesh_name();
        let placement = Placement {
            position: entity.position,
            rotation: entity.rotation,
            scale: entity.scale,
        };
        let node = node_name.to_string();

        // Mutation stage: attach between frames, under the frame budget
        self.frames.enqueue(
            attempt.priority,
            self.config.costs.create_scene_node,
            self.action(move |pipeline, a| {
                let created = pipeline.sink.create_scene_node(
                    a.priority,
                    &node,
                    Some(&parent_node),
                    Some(&mesh_name),
                    &placement,
                );
                if !created {
                    // the engine does not know the parent node yet
                    log::debug!(
                        "place {}/{}: {} waiting for node {}",
                        a.sequence,
                        a.retries,
                        node,
                        parent_node
                    );
                    pipeline.stats.item_requeued();
                    return Ok(WorkOutcome::NotYetReady);
                }
                pipeline
                    .attachments
                    .lock()
                    .unwrap()
                    .insert(id, Attachment { scene_node: node.clone() });
                pipeline.release_in_flight(&node);
                Ok(WorkOutcome::Done)
            }),
        );

        Ok(WorkOutcome::Done)
    }

    /// React to a changed entity.
    pub fn update_entity(&self, id: EntityId, what: UpdateCodes) {
        let Some(entity) = self.world.entity(id) else {
            return;
        };

        if what.intersects(UpdateCodes::POSITION | UpdateCodes::ROTATION) {
            if let Some(attachment) = self.attachment(id) {
                let priority = self.interest.rank(entity.position);
                let sink = Arc::clone(&self.sink);
                let position = what.contains(UpdateCodes::POSITION).then_some(entity.position);
                let rotation = what.contains(UpdateCodes::ROTATION).then_some(entity.rotation);
                self.frames.enqueue(
                    priority,
                    self.config.costs.update_scene_node,
                    Box::new(move |a: &Attempt| {
                        sink.update_scene_node(a.priority, &attachment.scene_node, position, rotation);
                        Ok(WorkOutcome::Done)
                    }),
                );
            }
        }

        if what.intersects(UpdateCodes::PARENT | UpdateCodes::PRIM_DATA | UpdateCodes::TEXTURES) {
            if what.contains(UpdateCodes::PARENT) {
                // the node must re-hang off its new parent
                self.attachments.lock().unwrap().remove(&id);
            }
            self.render_entity(id);
        }
    }

    /// Tear down an entity's renderer state.
    pub fn remove_entity(&self, id: EntityId) {
        let Some(attachment) = self.attachments.lock().unwrap().remove(&id) else {
            return;
        };
        let sink = Arc::clone(&self.sink);
        self.frames.enqueue(
            self.config.default_interest,
            self.config.costs.update_scene_node,
            Box::new(move |_: &Attempt| {
                sink.remove_scene_node(&attachment.scene_node);
                Ok(WorkOutcome::Done)
            }),
        );
    }

    // ------------------------------------------------------------------
    // Region mapping and terrain
    // ------------------------------------------------------------------

    /// Queue creation of a region's root scene node. Everything in the
    /// region hangs off this node, so it must exist before entity
    /// placement or terrain can complete.
    pub fn map_region(&self, region: &Arc<RegionContext>) {
        let region = Arc::clone(region);
        self.frames.enqueue(
            self.config.default_interest,
            self.config.costs.map_region,
            self.action(move |pipeline, a| {
                if pipeline.region_roots.lock().unwrap().contains_key(region.id()) {
                    return Ok(WorkOutcome::Done);
                }
                let node = region.id().node_name();
                let created = pipeline.sink.create_scene_node(
                    a.priority,
                    &node,
                    None,
                    None,
                    &Placement::identity(),
                );
                if !created {
                    pipeline.stats.item_requeued();
                    return Ok(WorkOutcome::NotYetReady);
                }
                log::debug!("mapped region {}", region.id());
                pipeline
                    .region_roots
                    .lock()
                    .unwrap()
                    .insert(region.id().clone(), node);
                Ok(WorkOutcome::Done)
            }),
        );
    }

    /// Queue a rebuild of a region's terrain mesh. Waits for the region
    /// root to be mapped first.
    pub fn update_terrain(&self, region: &Arc<RegionContext>) {
        let region = Arc::clone(region);
        self.frames.enqueue(
            self.config.default_interest,
            self.config.costs.update_terrain,
            self.action(move |pipeline, a| {
                let root = pipeline.region_roots.lock().unwrap().get(region.id()).cloned();
                let Some(root) = root else {
                    log::debug!("terrain {}: waiting for region root", region.id());
                    pipeline.stats.item_requeued();
                    return Ok(WorkOutcome::NotYetReady);
                };
                let terrain = region.terrain();
                if terrain.is_empty() {
                    return Ok(WorkOutcome::Done);
                }
                pipeline.sink.update_terrain(a.priority, &root, &terrain);
                Ok(WorkOutcome::Done)
            }),
        );
    }

    // ------------------------------------------------------------------
    // Resource requests from the engine
    // ------------------------------------------------------------------

    /// Entry point for the engine's missing-resource callbacks: it hit a
    /// resource it does not have and asks us to produce it.
    pub fn request_resource(&self, kind: ResourceKind, resource: &str) {
        match kind {
            ResourceKind::Mesh => {
                self.stats.mesh_requested();
                self.request_mesh(resource);
            }
            ResourceKind::Material => {
                self.stats.material_requested();
                self.request_material(resource);
            }
            ResourceKind::Texture => {
                self.stats.texture_requested();
                self.request_texture(resource);
            }
        }
    }

    fn request_mesh(&self, mesh_name: &str) {
        log::debug!("request for mesh {}", mesh_name);
        if !self.in_flight.lock().unwrap().insert(mesh_name.to_string()) {
            return;
        }

        let entity_name = EntityName::from_resource(mesh_name);
        let Some(entity) = self.world.entity_by_name(&entity_name) else {
            log::error!("request_mesh: could not find entity {}", entity_name);
            self.release_in_flight(mesh_name);
            return;
        };

        let priority = self.interest.rank(entity.position);
        let mesh = mesh_name.to_string();
        let id = entity.id;
        self.work.enqueue(
            priority,
            self.config.costs.create_mesh,
            self.action(move |pipeline, attempt| {
                let result = pipeline.build_mesh(id, &mesh, attempt);
                if result.is_err() {
                    // malformed input; never requeued
                    pipeline.stats.item_failed();
                    pipeline.release_in_flight(&mesh);
                }
                result
            }),
        );
    }

    /// Gather stage of mesh creation; runs on the worker thread.
    fn build_mesh(&self, id: EntityId, mesh_name: &str, attempt: &Attempt) -> Result<WorkOutcome> {
        self.stats.item_executed();

        let Some(entity) = self.world.entity(id) else {
            self.release_in_flight(mesh_name);
            return Ok(WorkOutcome::Done);
        };

        match self.source.mesh(&entity)? {
            Gathered::Missing(dep) => {
                log::debug!(
                    "mesh {}/{}: {} waiting for {} ({:?})",
                    attempt.sequence,
                    attempt.retries,
                    mesh_name,
                    dep.ident,
                    dep.kind
                );
                self.maybe_escalate(attempt, &dep.ident, dep.kind);
                self.stats.item_requeued();
                Ok(WorkOutcome::NotYetReady)
            }
            Gathered::Ready(data) => {
                let mesh = mesh_name.to_string();
                self.frames.enqueue(
                    attempt.priority,
                    self.config.costs.create_mesh,
                    self.action(move |pipeline, a| {
                        pipeline.sink.create_mesh(a.priority, &mesh, &data);
                        pipeline.sink.refresh_resource(a.priority, ResourceKind::Mesh, &mesh);
                        pipeline.release_in_flight(&mesh);
                        Ok(WorkOutcome::Done)
                    }),
                );
                Ok(WorkOutcome::Done)
            }
        }
    }

    fn request_material(&self, material_name: &str) {
        log::debug!("request for material {}", material_name);
        if !self.in_flight.lock().unwrap().insert(material_name.to_string()) {
            return;
        }

        let entity_name = EntityName::from_resource(material_name);
        let Some(entity) = self.world.entity_by_name(&entity_name) else {
            log::error!("request_material: could not find entity {}", entity_name);
            self.release_in_flight(material_name);
            return;
        };

        let priority = self.interest.rank(entity.position);
        let material = material_name.to_string();
        let id = entity.id;
        self.work.enqueue(
            priority,
            self.config.costs.create_material,
            self.action(move |pipeline, attempt| {
                let result = pipeline.build_material(id, &material, attempt);
                if result.is_err() {
                    pipeline.stats.item_failed();
                    pipeline.release_in_flight(&material);
                }
                result
            }),
        );
    }

    /// Gather stage of material creation; runs on the worker thread.
    fn build_material(
        &self,
        id: EntityId,
        material_name: &str,
        attempt: &Attempt,
    ) -> Result<WorkOutcome> {
        self.stats.item_executed();

        let Some(entity) = self.world.entity(id) else {
            self.release_in_flight(material_name);
            return Ok(WorkOutcome::Done);
        };

        match self.source.material(&entity, material_name)? {
            Gathered::Missing(dep) => {
                self.maybe_escalate(attempt, &dep.ident, dep.kind);
                self.stats.item_requeued();
                Ok(WorkOutcome::NotYetReady)
            }
            Gathered::Ready(def) => {
                let material = material_name.to_string();
                self.frames.enqueue(
                    attempt.priority,
                    self.config.costs.create_material,
                    self.action(move |pipeline, a| {
                        pipeline.sink.create_material(a.priority, &material, &def);
                        pipeline
                            .sink
                            .refresh_resource(a.priority, ResourceKind::Material, &material);
                        pipeline.release_in_flight(&material);
                        Ok(WorkOutcome::Done)
                    }),
                );
                Ok(WorkOutcome::Done)
            }
        }
    }

    /// Texture requests go straight to the fetcher (which dedups); the
    /// completion comes back as a refresh on a later frame.
    fn request_texture(&self, texture_name: &str) {
        log::debug!("request for texture {}", texture_name);
        let priority = match self.world.entity_by_name(&EntityName::from_resource(texture_name)) {
            Some(entity) => self.interest.rank(entity.position),
            None => self.config.default_interest,
        };
        self.fetcher.request(texture_name, AssetKind::Texture, priority);
    }

    // ------------------------------------------------------------------

    fn release_in_flight(&self, name: &str) {
        self.in_flight.lock().unwrap().remove(name);
    }

    /// In-flight names, for observability and tests.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.lock().unwrap().len()
    }

    /// Issue one out-of-band fetch for a missing dependency on every Nth
    /// consecutive failed attempt.
    fn maybe_escalate(&self, attempt: &Attempt, ident: &str, kind: AssetKind) {
        let n = self.config.escalate_every;
        if n == 0 {
            return;
        }
        let failures = attempt.retries + 1; // counting this attempt
        if failures % n == 0 && self.fetcher.request(ident, kind, attempt.priority) {
            self.stats.fetch_escalated();
            log::debug!(
                "escalating fetch of {} ({:?}) after {} attempts",
                ident,
                kind,
                failures
            );
        }
    }
}
