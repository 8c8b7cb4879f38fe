//! World state shared between the comm adapter and the render pipeline.

pub mod entity;
pub mod region;

pub use entity::{Entity, EntityId, EntityName, UpdateCodes};
pub use region::{RegionContext, RegionId, RegionState, TerrainData, TerrainPatch};

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// The viewer's model of the connected world.
///
/// The region list and the entity map are guarded by independent
/// mutexes; there is no global lock.
#[derive(Default)]
pub struct WorldState {
    regions: Mutex<Vec<Arc<RegionContext>>>,
    entities: Mutex<HashMap<EntityId, Entity>>,
    names: Mutex<HashMap<EntityName, EntityId>>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a region by id, creating it (Offline) on first reference.
    pub fn find_or_create_region(&self, id: &RegionId) -> Arc<RegionContext> {
        let mut regions = self.regions.lock().unwrap();
        for region in regions.iter() {
            if region.id() == id {
                return Arc::clone(region);
            }
        }
        log::debug!("creating region context for {}", id);
        let region = Arc::new(RegionContext::new(id.clone()));
        regions.push(Arc::clone(&region));
        region
    }

    pub fn find_region(&self, id: &RegionId) -> Option<Arc<RegionContext>> {
        self.regions
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id() == id)
            .map(Arc::clone)
    }

    pub fn region_count(&self) -> usize {
        self.regions.lock().unwrap().len()
    }

    /// Insert or replace an entity record.
    pub fn upsert_entity(&self, entity: Entity) {
        self.names
            .lock()
            .unwrap()
            .insert(entity.name.clone(), entity.id);
        self.entities.lock().unwrap().insert(entity.id, entity);
    }

    /// Mutate an entity record in place. Returns false if unknown.
    pub fn update_entity<F>(&self, id: EntityId, apply: F) -> bool
    where
        F: FnOnce(&mut Entity),
    {
        let mut entities = self.entities.lock().unwrap();
        match entities.get_mut(&id) {
            Some(entity) => {
                apply(entity);
                true
            }
            None => false,
        }
    }

    pub fn remove_entity(&self, id: EntityId) -> Option<Entity> {
        let removed = self.entities.lock().unwrap().remove(&id);
        if let Some(ref entity) = removed {
            self.names.lock().unwrap().remove(&entity.name);
        }
        removed
    }

    /// Snapshot of an entity record.
    pub fn entity(&self, id: EntityId) -> Option<Entity> {
        self.entities.lock().unwrap().get(&id).cloned()
    }

    /// Look an entity up by its stable name.
    pub fn entity_by_name(&self, name: &EntityName) -> Option<Entity> {
        let id = *self.names.lock().unwrap().get(name)?;
        self.entity(id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.lock().unwrap().len()
    }
}
