//! Entity records shared between the comm adapter and the renderer.

use glam::{Quat, Vec3};

use super::region::RegionId;

/// Identity of an entity within the world.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "entity:{}", self.0)
    }
}

/// Stable name of an entity, used to derive render resource identities.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityName(pub String);

impl EntityName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name of this entity's mesh resource.
    pub fn mesh_name(&self) -> String {
        format!("{}.mesh", self.0)
    }

    /// Name of this entity's material resource.
    pub fn material_name(&self) -> String {
        format!("{}.material", self.0)
    }

    /// Name of this entity's scene node.
    pub fn node_name(&self) -> String {
        format!("{}.node", self.0)
    }

    /// Recover the entity name from a resource name by stripping the
    /// type suffix (`Harbor/12.mesh` -> `Harbor/12`). Names without a
    /// suffix pass through unchanged.
    pub fn from_resource(resource: &str) -> Self {
        match resource.rsplit_once('.') {
            Some((stem, _)) => Self(stem.to_string()),
            None => Self(resource.to_string()),
        }
    }
}

impl std::fmt::Display for EntityName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which aspects of an entity changed in an update event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateCodes(u32);

impl UpdateCodes {
    pub const POSITION: Self = Self(1);
    pub const ROTATION: Self = Self(1 << 1);
    pub const SCALE: Self = Self(1 << 2);
    pub const PARENT: Self = Self(1 << 3);
    pub const PRIM_DATA: Self = Self(1 << 4);
    pub const TEXTURES: Self = Self(1 << 5);

    pub fn empty() -> Self {
        Self(0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every flag in `other` is set in `self`.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if any flag in `other` is set in `self`.
    pub fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }
}

impl std::ops::BitOr for UpdateCodes {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for UpdateCodes {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// A world entity as known to the scheduler.
#[derive(Clone, Debug)]
pub struct Entity {
    pub id: EntityId,
    pub name: EntityName,
    pub region: RegionId,
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    /// Entity this one is attached to, if any; placement waits for it
    pub parent: Option<EntityId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_name_round_trip() {
        let name = EntityName::new("Harbor/prim/42");
        assert_eq!(name.mesh_name(), "Harbor/prim/42.mesh");
        assert_eq!(EntityName::from_resource(&name.mesh_name()), name);
    }

    #[test]
    fn test_from_resource_without_suffix() {
        let name = EntityName::from_resource("plain");
        assert_eq!(name.as_str(), "plain");
    }

    #[test]
    fn test_update_codes_flags() {
        let what = UpdateCodes::POSITION | UpdateCodes::TEXTURES;
        assert!(what.contains(UpdateCodes::POSITION));
        assert!(!what.contains(UpdateCodes::ROTATION));
        assert!(what.intersects(UpdateCodes::TEXTURES | UpdateCodes::PARENT));
        assert!(!what.intersects(UpdateCodes::SCALE));
        assert!(UpdateCodes::empty().is_empty());
    }
}
