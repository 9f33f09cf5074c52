//! Core data model: scene ids, node ids, citations and timeline events.

pub mod event;
pub mod ids;
pub mod scene;
pub mod source_ref;

pub use event::{Event, EventKind, KnowledgeDelta};
pub use ids::{NodeId, NodeIdError};
pub use scene::{SceneId, SceneIdError, SceneIdFormat};
pub use source_ref::{SourceKind, SourceRef};
