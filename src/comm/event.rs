//! World-change events consumed from the protocol collaborator.
//!
//! The network layer parses the wire protocol and invokes one handler
//! method per event kind from its callback threads. Handlers must stay
//! responsive: all heavy work is deferred through the scheduler.

use std::sync::Arc;

use glam::{Quat, Vec3};

use crate::world::{EntityId, EntityName, RegionContext, RegionState, TerrainPatch, UpdateCodes};

/// Entity fields carried by create/update events.
#[derive(Clone, Debug)]
pub struct EntityPayload {
    pub id: EntityId,
    pub name: EntityName,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub parent: Option<EntityId>,
}

/// Fixed interface for world-change notifications, one method per event
/// kind. Implemented by the scheduler-facing adapter.
pub trait WorldEventHandler: Send + Sync {
    /// A new entity appeared in `region`.
    fn on_entity_created(&self, region: &Arc<RegionContext>, payload: EntityPayload);

    /// Fields of a known entity changed; `what` says which.
    fn on_entity_updated(&self, region: &Arc<RegionContext>, payload: EntityPayload, what: UpdateCodes);

    /// An entity left the world.
    fn on_entity_removed(&self, region: &Arc<RegionContext>, id: EntityId);

    /// A rectangle of the region heightfield changed.
    fn on_terrain_patch(&self, region: &Arc<RegionContext>, patch: TerrainPatch);

    /// The region's connectivity changed. `Online` runs the backlog
    /// transition protocol exactly once per offline-to-online edge.
    fn on_region_state(&self, region: &Arc<RegionContext>, state: RegionState);
}
