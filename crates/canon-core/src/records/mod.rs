//! Read-only loaders for the reference datasets the validator checks
//! against: scene index, skills catalog, tag registry.

pub mod scenes;
pub mod skills;
pub mod tags;

pub use scenes::{SceneBounds, SceneIndex};
pub use skills::{SkillCatalog, strip_rarity};
pub use tags::{RegistryDocument, Resolution, TagEntry, TagRegistry, TagStatus, check_registry};
