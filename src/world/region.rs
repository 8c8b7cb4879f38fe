//! Region contexts: identified partitions of world state with an
//! online/offline lifecycle.

use std::collections::HashSet;
use std::sync::Mutex;

use super::entity::EntityId;

/// Identity of a region (e.g. `"grid/Region/Harbor"`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub String);

impl RegionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of the region's root scene node.
    pub fn node_name(&self) -> String {
        format!("{}.root", self.0)
    }
}

impl std::fmt::Display for RegionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle state of a region.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegionState {
    /// Known but not yet ready to accept events
    #[default]
    Offline,
    /// Live; events apply directly
    Online,
}

/// A rectangular heightfield update.
#[derive(Clone, Debug)]
pub struct TerrainPatch {
    /// Column offset of the patch within the region heightfield
    pub x: usize,
    /// Row offset of the patch
    pub y: usize,
    pub width: usize,
    pub length: usize,
    /// Row-major heights, `width * length` values
    pub heights: Vec<f32>,
}

/// Region terrain heightfield, grown as patches arrive.
#[derive(Clone, Debug, Default)]
pub struct TerrainData {
    pub width: usize,
    pub length: usize,
    pub heights: Vec<f32>,
}

impl TerrainData {
    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    /// Copy a patch into the heightfield, growing it if the patch
    /// extends past the current bounds.
    pub fn apply_patch(&mut self, patch: &TerrainPatch) {
        let need_w = patch.x + patch.width;
        let need_l = patch.y + patch.length;
        if need_w > self.width || need_l > self.length {
            let new_w = self.width.max(need_w);
            let new_l = self.length.max(need_l);
            let mut grown = vec![0.0; new_w * new_l];
            for row in 0..self.length {
                let src = row * self.width;
                let dst = row * new_w;
                grown[dst..dst + self.width].copy_from_slice(&self.heights[src..src + self.width]);
            }
            self.width = new_w;
            self.length = new_l;
            self.heights = grown;
        }

        for row in 0..patch.length {
            let src = row * patch.width;
            let dst = (patch.y + row) * self.width + patch.x;
            self.heights[dst..dst + patch.width]
                .copy_from_slice(&patch.heights[src..src + patch.width]);
        }
    }
}

/// One connected region and the entities it owns.
///
/// State, entity set and terrain each have their own lock; none is held
/// while work executes.
pub struct RegionContext {
    id: RegionId,
    state: Mutex<RegionState>,
    entities: Mutex<HashSet<EntityId>>,
    terrain: Mutex<TerrainData>,
}

impl RegionContext {
    pub fn new(id: RegionId) -> Self {
        Self {
            id,
            state: Mutex::new(RegionState::Offline),
            entities: Mutex::new(HashSet::new()),
            terrain: Mutex::new(TerrainData::default()),
        }
    }

    pub fn id(&self) -> &RegionId {
        &self.id
    }

    pub fn state(&self) -> RegionState {
        *self.state.lock().unwrap()
    }

    pub fn is_online(&self) -> bool {
        self.state() == RegionState::Online
    }

    pub(crate) fn set_state(&self, state: RegionState) {
        *self.state.lock().unwrap() = state;
    }

    /// Record that this region owns an entity.
    pub fn adopt(&self, id: EntityId) {
        self.entities.lock().unwrap().insert(id);
    }

    /// Release an entity from this region's set.
    pub fn release(&self, id: EntityId) {
        self.entities.lock().unwrap().remove(&id);
    }

    pub fn owns(&self, id: EntityId) -> bool {
        self.entities.lock().unwrap().contains(&id)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.lock().unwrap().len()
    }

    /// Apply a heightfield patch.
    pub fn apply_terrain(&self, patch: &TerrainPatch) {
        self.terrain.lock().unwrap().apply_patch(patch);
    }

    /// Snapshot of the current heightfield.
    pub fn terrain(&self) -> TerrainData {
        self.terrain.lock().unwrap().clone()
    }
}

impl std::fmt::Debug for RegionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegionContext")
            .field("id", &self.id)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
