//! Boundary to the external rendering engine.
//!
//! The engine is invoked, never reimplemented: everything behind
//! [`RenderSink`] runs inside the renderer's own scene-graph machinery.
//! Calls carry the scheduling priority so the engine can order its own
//! internal queues the same way.

use glam::{Quat, Vec3};

use crate::world::TerrainData;

/// Kinds of renderer resources addressed by refresh requests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Mesh,
    Material,
    Texture,
}

/// Placement of a scene node.
#[derive(Clone, Copy, Debug)]
pub struct Placement {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Placement {
    pub fn identity() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// Mesh geometry handed to the engine: interleaved vertex attributes and
/// triangle indices, one concatenated buffer per face the way the
/// generator packs them.
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

/// Material description handed to the engine.
#[derive(Clone, Debug, Default)]
pub struct MaterialDef {
    pub color: [f32; 4],
    pub textures: Vec<String>,
    pub transparent: bool,
}

/// The rendering-engine collaborator.
pub trait RenderSink: Send + Sync {
    /// Create and place a scene node. `parent` of None attaches at the
    /// engine root; `mesh` of None creates a bare grouping node (region
    /// roots). Returns false when the parent node is not known to the
    /// engine yet — the caller requeues.
    fn create_scene_node(
        &self,
        priority: u32,
        node: &str,
        parent: Option<&str>,
        mesh: Option<&str>,
        placement: &Placement,
    ) -> bool;

    /// Move or reorient an existing scene node.
    fn update_scene_node(
        &self,
        priority: u32,
        node: &str,
        position: Option<Vec3>,
        rotation: Option<Quat>,
    );

    /// Remove a scene node and its subtree.
    fn remove_scene_node(&self, node: &str);

    /// Create a mesh resource.
    fn create_mesh(&self, priority: u32, mesh: &str, data: &MeshData);

    /// Create a material resource.
    fn create_material(&self, priority: u32, material: &str, def: &MaterialDef);

    /// Rebuild a region's terrain geometry beneath its root node.
    fn update_terrain(&self, priority: u32, region_node: &str, terrain: &TerrainData);

    /// Reload a resource so the engine picks up new content.
    fn refresh_resource(&self, priority: u32, kind: ResourceKind, name: &str);
}
