pub mod compare;
pub mod completions;
pub mod migrate;
pub mod registry;
pub mod scene_ids;
pub mod snapshot;
pub mod sort;
pub mod validate;
