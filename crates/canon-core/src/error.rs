//! Fail-fast errors for the timeline loader and the projector.
//!
//! Referential problems found by the dataset validator are not errors; see
//! [`crate::report`].

use crate::io::JsonFileError;
use crate::model::SceneIdError;

/// A timeline that cannot be replayed.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error(transparent)]
    File(#[from] JsonFileError),

    #[error("timeline must be a JSON array")]
    NotAnArray,

    #[error("timeline entry #{index} is not an object")]
    NotAnObject { index: usize },

    #[error("timeline entry #{index}: bad event_id {value}")]
    BadEventId { index: usize, value: String },

    #[error("{event_id}: bad scene_id {value}")]
    BadSceneId { event_id: String, value: String },

    #[error("{event_id}: order must be an integer >= 1, got {value}")]
    BadOrder { event_id: String, value: String },

    #[error("{event_id}: source_ref must be a non-empty list")]
    MissingSourceRef { event_id: String },

    #[error("{event_id}: source_ref[{index}] {reason}")]
    BadCitation {
        event_id: String,
        index: usize,
        reason: String,
    },

    #[error("{event_id}: knowledge_delta[{index}] {reason}")]
    BadDelta {
        event_id: String,
        index: usize,
        reason: String,
    },

    #[error("{event_id}: {field} {reason}")]
    BadField {
        event_id: String,
        field: &'static str,
        reason: String,
    },
}

/// Projection cannot proceed safely.
#[derive(Debug, thiserror::Error)]
pub enum ProjectionError {
    #[error(transparent)]
    Timeline(#[from] TimelineError),

    #[error("bad cutoff: {0}")]
    Cutoff(#[from] SceneIdError),

    #[error("{event_id}: bad node id '{value}' (expected sn.<slug>[.<rank>])")]
    BadNodeId { event_id: String, value: String },

    #[error("{event_id}: skill_upgraded requires from_node_id and to_node_id")]
    MissingUpgradePair { event_id: String },
}
