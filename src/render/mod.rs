//! Render scheduling: interest ranking, the resource-creation pipeline,
//! and the collaborator boundaries.

pub mod interest;
pub mod sink;
pub mod assets;
pub mod pipeline;

pub use interest::Interest;
pub use sink::{MaterialDef, MeshData, Placement, RenderSink, ResourceKind};
pub use assets::{AssetFetcher, AssetKind, AssetLoader, FetchRequest, FetchResult};
pub use pipeline::{Attachment, Dependency, Gathered, GeometrySource, RenderPipeline};
