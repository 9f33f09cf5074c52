//! Timeline events.

use std::fmt;

use serde::{Serialize, Serializer};
use serde_json::Value;

use super::scene::SceneId;
use super::source_ref::SourceRef;

/// The `type` of a timeline event.
///
/// Unknown types are kept as [`EventKind::Other`] so newer timelines still
/// load and replay.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    SkillAcquired,
    SkillEvolved,
    SkillUpgraded,
    SkillObservation,
    BeliefCorrected,
    Other(String),
}

impl EventKind {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "skill_acquired" => Self::SkillAcquired,
            "skill_evolved" => Self::SkillEvolved,
            "skill_upgraded" => Self::SkillUpgraded,
            "skill_observation" => Self::SkillObservation,
            "belief_corrected" => Self::BeliefCorrected,
            other => Self::Other(other.to_string()),
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::SkillAcquired => "skill_acquired",
            Self::SkillEvolved => "skill_evolved",
            Self::SkillUpgraded => "skill_upgraded",
            Self::SkillObservation => "skill_observation",
            Self::BeliefCorrected => "belief_corrected",
            Self::Other(raw) => raw,
        }
    }

    /// Kinds that create or extend a single knowledge node.
    #[must_use]
    pub const fn touches_single_node(&self) -> bool {
        matches!(
            self,
            Self::SkillAcquired | Self::SkillEvolved | Self::SkillObservation | Self::BeliefCorrected
        )
    }

    /// Kinds that count as an upgrade when comparing before/after evidence.
    #[must_use]
    pub const fn is_upgrade(&self) -> bool {
        matches!(self, Self::SkillEvolved | Self::SkillUpgraded)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One `knowledge_delta` entry: set `field_path` to `new_value`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeDelta {
    pub field_path: String,
    pub new_value: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

impl KnowledgeDelta {
    /// Confidence defaults to certain when the author left it out.
    #[must_use]
    pub fn confidence_or_certain(&self) -> f64 {
        self.confidence.unwrap_or(1.0)
    }
}

/// A validated timeline entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub event_id: String,
    pub scene_id: SceneId,
    /// Tie-breaker within a scene, always `>= 1`.
    pub order: u32,
    #[serde(rename = "type")]
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skill_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_node_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_node_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub knowledge_delta: Vec<KnowledgeDelta>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Never empty after loading.
    pub source_ref: Vec<SourceRef>,
    /// `epistemic_at.scene_id`: when the character actually learned this.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epistemic_scene: Option<SceneId>,
}

impl Event {
    /// The node this event is about: `node_id`, falling back to `skill_id`.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.node_id
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.skill_id.as_deref().filter(|s| !s.is_empty()))
    }

    /// Every node id the event mentions, in field order.
    pub fn mentioned_nodes(&self) -> impl Iterator<Item = &str> {
        [
            self.node_id.as_deref(),
            self.skill_id.as_deref(),
            self.from_node_id.as_deref(),
            self.to_node_id.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bare_event() -> Event {
        Event {
            event_id: "ev.jake.01.01.01.x".into(),
            scene_id: SceneId::parse("01.01.01").expect("scene"),
            order: 1,
            kind: EventKind::SkillAcquired,
            node_id: None,
            skill_id: None,
            from_node_id: None,
            to_node_id: None,
            knowledge_delta: Vec::new(),
            tags: Vec::new(),
            source_ref: vec![SourceRef::scene("01.01.01", 1, 2)],
            epistemic_scene: None,
        }
    }

    #[test]
    fn kinds_round_trip_and_keep_unknowns() {
        for raw in [
            "skill_acquired",
            "skill_evolved",
            "skill_upgraded",
            "skill_observation",
            "belief_corrected",
            "stat_changed",
        ] {
            assert_eq!(EventKind::parse(raw).as_str(), raw);
        }
        assert_eq!(
            EventKind::parse("stat_changed"),
            EventKind::Other("stat_changed".into())
        );
    }

    #[test]
    fn subject_prefers_node_id_and_skips_empty() {
        let mut ev = bare_event();
        assert_eq!(ev.subject(), None);
        ev.skill_id = Some("sn.b".into());
        assert_eq!(ev.subject(), Some("sn.b"));
        ev.node_id = Some(String::new());
        assert_eq!(ev.subject(), Some("sn.b"));
        ev.node_id = Some("sn.a".into());
        assert_eq!(ev.subject(), Some("sn.a"));
    }

    #[test]
    fn missing_confidence_is_certain() {
        let delta = KnowledgeDelta {
            field_path: "mp_regen".into(),
            new_value: Value::Null,
            confidence: None,
        };
        assert!((delta.confidence_or_certain() - 1.0).abs() < f64::EPSILON);
    }
}
