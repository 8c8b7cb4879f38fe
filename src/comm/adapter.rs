//! The scheduler-facing event adapter.
//!
//! Implements [`WorldEventHandler`]: every event passes the context gate
//! first; applied events mutate world state and hand ranked work to the
//! render pipeline. Nothing here blocks or panics across the callback
//! boundary — the protocol thread must stay responsive.

use std::sync::Arc;

use crate::core::stats::SchedulerStats;
use crate::render::RenderPipeline;
use crate::world::{
    Entity, EntityId, RegionContext, RegionState, TerrainPatch, UpdateCodes, WorldState,
};

use super::backlog::{BacklogRegistry, GateOutcome};
use super::event::{EntityPayload, WorldEventHandler};

pub struct CommAdapter {
    world: Arc<WorldState>,
    backlog: Arc<BacklogRegistry>,
    pipeline: Arc<RenderPipeline>,
    stats: Arc<SchedulerStats>,
}

impl CommAdapter {
    pub fn new(
        world: Arc<WorldState>,
        backlog: Arc<BacklogRegistry>,
        pipeline: Arc<RenderPipeline>,
    ) -> Self {
        let stats = pipeline.shared_stats();
        Self {
            world,
            backlog,
            pipeline,
            stats,
        }
    }

    pub fn stats(&self) -> &SchedulerStats {
        &self.stats
    }

    fn note_outcome(&self, outcome: GateOutcome, what: &str, region: &RegionContext) {
        if outcome == GateOutcome::Queued {
            self.stats.event_deferred();
            log::debug!("deferred {} for offline region {}", what, region.id());
        }
    }

    fn apply_entity_created(
        world: &WorldState,
        pipeline: &Arc<RenderPipeline>,
        region: &Arc<RegionContext>,
        payload: EntityPayload,
    ) {
        let id = payload.id;
        world.upsert_entity(Entity {
            id,
            name: payload.name,
            region: region.id().clone(),
            position: payload.position,
            rotation: payload.rotation,
            scale: payload.scale,
            parent: payload.parent,
        });
        region.adopt(id);
        pipeline.render_entity(id);
    }

    fn apply_entity_updated(
        world: &WorldState,
        pipeline: &Arc<RenderPipeline>,
        payload: EntityPayload,
        what: UpdateCodes,
    ) {
        let id = payload.id;
        let known = world.update_entity(id, |entity| {
            if what.contains(UpdateCodes::POSITION) {
                entity.position = payload.position;
            }
            if what.contains(UpdateCodes::ROTATION) {
                entity.rotation = payload.rotation;
            }
            if what.contains(UpdateCodes::SCALE) {
                entity.scale = payload.scale;
            }
            if what.contains(UpdateCodes::PARENT) {
                entity.parent = payload.parent;
            }
        });
        if !known {
            log::debug!("dropping update for unknown entity {}", id);
            return;
        }
        pipeline.update_entity(id, what);
    }

    fn apply_entity_removed(
        world: &WorldState,
        pipeline: &Arc<RenderPipeline>,
        region: &Arc<RegionContext>,
        id: EntityId,
    ) {
        pipeline.remove_entity(id);
        region.release(id);
        world.remove_entity(id);
    }

    fn apply_terrain_patch(
        pipeline: &Arc<RenderPipeline>,
        region: &Arc<RegionContext>,
        patch: TerrainPatch,
    ) {
        if patch.heights.len() != patch.width * patch.length {
            // malformed patch must not take down the callback thread
            log::error!(
                "terrain patch for {} has {} samples, expected {}",
                region.id(),
                patch.heights.len(),
                patch.width * patch.length
            );
            return;
        }
        region.apply_terrain(&patch);
        pipeline.update_terrain(region);
    }
}

impl WorldEventHandler for CommAdapter {
    fn on_entity_created(&self, region: &Arc<RegionContext>, payload: EntityPayload) {
        let world = Arc::clone(&self.world);
        let pipeline = Arc::clone(&self.pipeline);
        let region_ref = Arc::clone(region);
        let outcome = self.backlog.gate(region, move || {
            Self::apply_entity_created(&world, &pipeline, &region_ref, payload);
        });
        self.note_outcome(outcome, "entity create", region);
    }

    fn on_entity_updated(
        &self,
        region: &Arc<RegionContext>,
        payload: EntityPayload,
        what: UpdateCodes,
    ) {
        let world = Arc::clone(&self.world);
        let pipeline = Arc::clone(&self.pipeline);
        let outcome = self.backlog.gate(region, move || {
            Self::apply_entity_updated(&world, &pipeline, payload, what);
        });
        self.note_outcome(outcome, "entity update", region);
    }

    fn on_entity_removed(&self, region: &Arc<RegionContext>, id: EntityId) {
        let world = Arc::clone(&self.world);
        let pipeline = Arc::clone(&self.pipeline);
        let region_ref = Arc::clone(region);
        let outcome = self.backlog.gate(region, move || {
            Self::apply_entity_removed(&world, &pipeline, &region_ref, id);
        });
        self.note_outcome(outcome, "entity remove", region);
    }

    fn on_terrain_patch(&self, region: &Arc<RegionContext>, patch: TerrainPatch) {
        let pipeline = Arc::clone(&self.pipeline);
        let region_ref = Arc::clone(region);
        let outcome = self.backlog.gate(region, move || {
            Self::apply_terrain_patch(&pipeline, &region_ref, patch);
        });
        self.note_outcome(outcome, "terrain patch", region);
    }

    fn on_region_state(&self, region: &Arc<RegionContext>, state: RegionState) {
        match state {
            RegionState::Online => {
                if region.is_online() {
                    return;
                }
                // Establish the region's root placement, then replay the
                // backlog; new events are live only behind the replay.
                self.pipeline.map_region(region);
                let replayed = self.backlog.transition_online(region);
                log::info!(
                    "region {} online, {} deferred events replayed",
                    region.id(),
                    replayed
                );
            }
            RegionState::Offline => {
                log::info!("region {} offline", region.id());
                region.set_state(RegionState::Offline);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    use glam::{Quat, Vec3};

    use crate::core::config::SchedulerConfig;
    use crate::render::pipeline::{Gathered, GeometrySource};
    use crate::render::sink::{MaterialDef, MeshData, Placement, RenderSink, ResourceKind};
    use crate::render::{AssetKind, AssetLoader};
    use crate::work::RunFlag;
    use crate::world::{EntityName, RegionId, TerrainData};

    struct NullSink {
        calls: Mutex<Vec<String>>,
        known_nodes: Mutex<HashSet<String>>,
    }

    impl Default for NullSink {
        fn default() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                known_nodes: Mutex::new(HashSet::new()),
            }
        }
    }

    impl RenderSink for NullSink {
        fn create_scene_node(
            &self,
            _priority: u32,
            node: &str,
            parent: Option<&str>,
            _mesh: Option<&str>,
            _placement: &Placement,
        ) -> bool {
            if let Some(parent) = parent {
                if !self.known_nodes.lock().unwrap().contains(parent) {
                    return false;
                }
            }
            self.known_nodes.lock().unwrap().insert(node.to_string());
            self.calls.lock().unwrap().push(format!("node:{}", node));
            true
        }

        fn update_scene_node(
            &self,
            _priority: u32,
            node: &str,
            _position: Option<Vec3>,
            _rotation: Option<Quat>,
        ) {
            self.calls.lock().unwrap().push(format!("move:{}", node));
        }

        fn remove_scene_node(&self, node: &str) {
            self.calls.lock().unwrap().push(format!("remove:{}", node));
        }

        fn create_mesh(&self, _priority: u32, mesh: &str, _data: &MeshData) {
            self.calls.lock().unwrap().push(format!("mesh:{}", mesh));
        }

        fn create_material(&self, _priority: u32, material: &str, _def: &MaterialDef) {
            self.calls.lock().unwrap().push(format!("material:{}", material));
        }

        fn update_terrain(&self, _priority: u32, region_node: &str, _terrain: &TerrainData) {
            self.calls.lock().unwrap().push(format!("terrain:{}", region_node));
        }

        fn refresh_resource(&self, _priority: u32, _kind: ResourceKind, name: &str) {
            self.calls.lock().unwrap().push(format!("refresh:{}", name));
        }
    }

    struct NullSource;

    impl GeometrySource for NullSource {
        fn mesh(&self, _entity: &Entity) -> crate::core::Result<Gathered<MeshData>> {
            Ok(Gathered::Ready(MeshData::default()))
        }

        fn material(
            &self,
            _entity: &Entity,
            _material: &str,
        ) -> crate::core::Result<Gathered<MaterialDef>> {
            Ok(Gathered::Ready(MaterialDef::default()))
        }
    }

    struct NullLoader;

    impl AssetLoader for NullLoader {
        fn load(&self, _ident: &str, _kind: AssetKind) -> crate::core::Result<()> {
            Ok(())
        }
    }

    struct Fixture {
        adapter: CommAdapter,
        world: Arc<WorldState>,
        pipeline: Arc<RenderPipeline>,
        backlog: Arc<BacklogRegistry>,
        run: RunFlag,
    }

    fn fixture() -> Fixture {
        let world = Arc::new(WorldState::new());
        let backlog = Arc::new(BacklogRegistry::new());
        let run = RunFlag::new();
        let pipeline = RenderPipeline::new(
            SchedulerConfig::default(),
            Arc::clone(&world),
            Arc::new(NullSink::default()),
            Arc::new(NullSource),
            Arc::new(NullLoader),
            run.clone(),
        );
        let adapter = CommAdapter::new(
            Arc::clone(&world),
            Arc::clone(&backlog),
            Arc::clone(&pipeline),
        );
        Fixture {
            adapter,
            world,
            pipeline,
            backlog,
            run,
        }
    }

    impl Drop for Fixture {
        fn drop(&mut self) {
            self.run.stop();
        }
    }

    fn payload(id: u64, name: &str) -> EntityPayload {
        EntityPayload {
            id: EntityId(id),
            name: EntityName::new(name),
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            parent: None,
        }
    }

    #[test]
    fn test_events_defer_until_region_online() {
        let f = fixture();
        let region = f.world.find_or_create_region(&RegionId::new("r"));

        // E1, E2 while the region is offline
        f.adapter.on_entity_created(&region, payload(1, "r/prim/1"));
        f.adapter.on_entity_created(&region, payload(2, "r/prim/2"));
        assert_eq!(f.world.entity_count(), 0);
        assert_eq!(f.backlog.depth(region.id()), 2);
        assert_eq!(f.adapter.stats().snapshot().events_deferred, 2);

        // The transition replays E1, E2 before E3 is accepted
        f.adapter.on_region_state(&region, RegionState::Online);
        assert_eq!(f.world.entity_count(), 2);

        f.adapter.on_entity_created(&region, payload(3, "r/prim/3"));
        assert_eq!(f.world.entity_count(), 3);
        assert_eq!(f.backlog.queue_count(), 0);
    }

    #[test]
    fn test_replay_applies_in_arrival_order() {
        let f = fixture();
        let region = f.world.find_or_create_region(&RegionId::new("r"));

        // Create then update the same entity while offline; replay must
        // keep that order or the update would be dropped as unknown.
        f.adapter.on_entity_created(&region, payload(1, "r/prim/1"));
        let mut moved = payload(1, "r/prim/1");
        moved.position = Vec3::new(9.0, 9.0, 9.0);
        f.adapter
            .on_entity_updated(&region, moved, UpdateCodes::POSITION);

        f.adapter.on_region_state(&region, RegionState::Online);

        let entity = f.world.entity(EntityId(1)).unwrap();
        assert_eq!(entity.position, Vec3::new(9.0, 9.0, 9.0));
    }

    #[test]
    fn test_online_region_applies_directly() {
        let f = fixture();
        let region = f.world.find_or_create_region(&RegionId::new("r"));
        f.adapter.on_region_state(&region, RegionState::Online);

        f.adapter.on_entity_created(&region, payload(1, "r/prim/1"));
        assert_eq!(f.world.entity_count(), 1);
        assert!(region.owns(EntityId(1)));
        assert_eq!(f.adapter.stats().snapshot().events_deferred, 0);
    }

    #[test]
    fn test_entity_removal_round_trip() {
        let f = fixture();
        let region = f.world.find_or_create_region(&RegionId::new("r"));
        f.adapter.on_region_state(&region, RegionState::Online);

        f.adapter.on_entity_created(&region, payload(1, "r/prim/1"));
        f.adapter.on_entity_removed(&region, EntityId(1));

        assert_eq!(f.world.entity_count(), 0);
        assert!(!region.owns(EntityId(1)));
    }

    #[test]
    fn test_malformed_terrain_patch_is_dropped() {
        let f = fixture();
        let region = f.world.find_or_create_region(&RegionId::new("r"));
        f.adapter.on_region_state(&region, RegionState::Online);

        f.adapter.on_terrain_patch(
            &region,
            TerrainPatch {
                x: 0,
                y: 0,
                width: 4,
                length: 4,
                heights: vec![0.0; 3], // wrong sample count
            },
        );
        assert!(region.terrain().is_empty());
    }

    #[test]
    fn test_terrain_patch_applies_and_schedules_rebuild() {
        let f = fixture();
        let region = f.world.find_or_create_region(&RegionId::new("r"));
        f.adapter.on_region_state(&region, RegionState::Online);
        let before = f.pipeline.frame_depth();

        f.adapter.on_terrain_patch(
            &region,
            TerrainPatch {
                x: 0,
                y: 0,
                width: 2,
                length: 2,
                heights: vec![1.0; 4],
            },
        );
        assert!(!region.terrain().is_empty());
        assert_eq!(f.pipeline.frame_depth(), before + 1);
    }

    #[test]
    fn test_second_online_transition_is_ignored() {
        let f = fixture();
        let region = f.world.find_or_create_region(&RegionId::new("r"));

        f.adapter.on_region_state(&region, RegionState::Online);
        let depth = f.pipeline.frame_depth();

        // A duplicate online notification must not re-map the region
        f.adapter.on_region_state(&region, RegionState::Online);
        assert_eq!(f.pipeline.frame_depth(), depth);
    }

    #[test]
    fn test_cross_thread_events_settle() {
        // Events fired from a background thread while the render thread
        // pumps; everything must land without loss.
        let f = fixture();
        let region = f.world.find_or_create_region(&RegionId::new("r"));
        f.adapter.on_region_state(&region, RegionState::Online);

        std::thread::scope(|scope| {
            let adapter = &f.adapter;
            let region_ref = &region;
            scope.spawn(move || {
                for i in 0..50 {
                    adapter.on_entity_created(region_ref, payload(i, &format!("r/prim/{}", i)));
                }
            });

            let deadline = Instant::now() + Duration::from_secs(5);
            while f.world.entity_count() < 50 {
                f.pipeline.pump_frame();
                assert!(Instant::now() < deadline, "events lost");
                std::thread::sleep(Duration::from_millis(1));
            }
        });

        assert_eq!(f.world.entity_count(), 50);
        assert_eq!(region.entity_count(), 50);
    }
}
