//! Scheduler configuration: per-work-kind pump costs and retry policy.

use serde::{Deserialize, Serialize};

/// Cost charged against the per-frame budget for each kind of deferred
/// engine mutation. Units are abstract; only ratios and the frame budget
/// matter.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct WorkCosts {
    /// Creating a material resource
    pub create_material: u32,
    /// Creating and placing a scene node
    pub create_scene_node: u32,
    /// Moving or reorienting an existing scene node
    pub update_scene_node: u32,
    /// Creating a mesh resource
    pub create_mesh: u32,
    /// Refreshing (reloading) an existing resource
    pub refresh_resource: u32,
    /// Mapping a region into the view (root node setup)
    pub map_region: u32,
    /// Rebuilding a region's terrain mesh
    pub update_terrain: u32,
    /// Re-mapping a texture after its pixels arrive
    pub map_texture: u32,
}

impl Default for WorkCosts {
    fn default() -> Self {
        Self {
            create_material: 5,
            create_scene_node: 20,
            update_scene_node: 10,
            create_mesh: 20,
            refresh_resource: 20,
            map_region: 50,
            update_terrain: 50,
            map_texture: 10,
        }
    }
}

/// Top-level scheduling configuration.
///
/// Hosts load this from wherever they keep settings; the core only
/// consumes the values.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Total cost allowance for one frame's pump
    pub frame_budget: u32,
    /// Per-work-kind costs
    pub costs: WorkCosts,
    /// Issue one dependency fetch every this many consecutive
    /// not-yet-ready attempts (0 disables escalation)
    pub escalate_every: u32,
    /// Priority assigned when no viewpoint has been observed yet
    pub default_interest: u32,
    /// Distances beyond this rank equally (= least urgent)
    pub max_interest_distance: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_budget: 300,
            costs: WorkCosts::default(),
            escalate_every: 3,
            default_interest: 100,
            max_interest_distance: 1000.0,
        }
    }
}

impl SchedulerConfig {
    /// Parse a configuration the host fetched from its settings store.
    pub fn from_json(text: &str) -> crate::core::Result<Self> {
        serde_json::from_str(text).map_err(|e| crate::core::Error::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_costs_are_positive() {
        let costs = WorkCosts::default();
        for cost in [
            costs.create_material,
            costs.create_scene_node,
            costs.update_scene_node,
            costs.create_mesh,
            costs.refresh_resource,
            costs.map_region,
            costs.update_terrain,
            costs.map_texture,
        ] {
            assert!(cost > 0);
        }
    }

    #[test]
    fn test_frame_budget_covers_largest_item() {
        // A single frame must always be able to start the most expensive kind
        let config = SchedulerConfig::default();
        assert!(config.frame_budget >= config.costs.update_terrain);
    }

    #[test]
    fn test_from_json_overrides() {
        let config = SchedulerConfig::from_json(
            r#"{
                "frame_budget": 120,
                "costs": {
                    "create_material": 5,
                    "create_scene_node": 20,
                    "update_scene_node": 10,
                    "create_mesh": 20,
                    "refresh_resource": 20,
                    "map_region": 50,
                    "update_terrain": 50,
                    "map_texture": 10
                },
                "escalate_every": 5,
                "default_interest": 100,
                "max_interest_distance": 512.0
            }"#,
        )
        .unwrap();

        assert_eq!(config.frame_budget, 120);
        assert_eq!(config.escalate_every, 5);
        assert!(SchedulerConfig::from_json("not json").is_err());
    }
}
