//! Knowledge projection: fold a character's timeline into what they know at
//! a given scene.
//!
//! # Algorithm
//!
//! 1. Sort events by [`sort_key`] for the requested [`View`].
//! 2. Walk in that order, stopping at the first event whose *book* scene is
//!    past the cutoff. The cutoff is always book order, so the character
//!    view can reorder what came before it but never reveal what comes after.
//! 3. Dispatch on event kind:
//!    - acquire / evolve / observe / correct: append citations to the node's
//!      evidence, then apply `knowledge_delta` (last write wins).
//!    - upgrade: remove `from`, merge its evidence then the event's citations
//!      into `to`, take `from`'s facts as a base, then apply the delta.
//!    - anything else: ignored.
//! 4. Every retained event contributes its tags to `flags`, which are sorted
//!    and deduplicated at the end.
//!
//! The result is a pure function of the events and the cutoff. All maps are
//! `BTreeMap` so serialisation is byte-stable.

pub mod compare;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::Layout;
use crate::error::ProjectionError;
use crate::model::{Event, EventKind, KnowledgeDelta, NodeId, SceneId, SourceRef};
use crate::timeline::{load_timeline, sort_key};

/// Which clock orders the replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    /// Book order.
    Reader,
    /// Book order, except events carrying `epistemic_at` sort by when the
    /// character learned them.
    #[default]
    Character,
}

impl View {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reader => "reader",
            Self::Character => "character",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reader" => Ok(Self::Reader),
            "character" => Ok(Self::Character),
            other => Err(format!(
                "unknown view '{other}': expected reader or character"
            )),
        }
    }
}

/// One skill as known by the character.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeNode {
    pub known: bool,
    pub facts: BTreeMap<String, Value>,
    pub evidence: Vec<SourceRef>,
}

impl Default for KnowledgeNode {
    fn default() -> Self {
        Self {
            known: true,
            facts: BTreeMap::new(),
            evidence: Vec::new(),
        }
    }
}

impl KnowledgeNode {
    fn apply(&mut self, deltas: &[KnowledgeDelta]) {
        for d in deltas {
            self.facts.insert(d.field_path.clone(), d.new_value.clone());
        }
    }
}

/// Snapshot of a character's knowledge at a cutoff scene.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionState {
    pub character: String,
    pub scene: SceneId,
    pub skills: BTreeMap<NodeId, KnowledgeNode>,
    pub flags: Vec<String>,
}

/// Load the timeline of `character_id` and project it to `cutoff`.
///
/// # Errors
///
/// Returns [`ProjectionError`] if the cutoff is not a scene id, the timeline
/// is malformed, or an event names an invalid node / incomplete upgrade.
#[instrument(skip(layout))]
pub fn project(
    layout: &Layout,
    character_id: &str,
    cutoff: &str,
    view: View,
) -> Result<ProjectionState, ProjectionError> {
    let cutoff = SceneId::parse(cutoff)?;
    let events = load_timeline(layout, character_id)?;
    project_events(character_id, &cutoff, view, &events)
}

/// Fold `events` (any input order) up to and including `cutoff`.
///
/// # Errors
///
/// Returns [`ProjectionError::BadNodeId`] or
/// [`ProjectionError::MissingUpgradePair`] for events that cannot be applied.
pub fn project_events(
    character_id: &str,
    cutoff: &SceneId,
    view: View,
    events: &[Event],
) -> Result<ProjectionState, ProjectionError> {
    let mut ordered: Vec<&Event> = events.iter().collect();
    ordered.sort_by(|a, b| sort_key(a, view).cmp(&sort_key(b, view)));

    let mut skills: BTreeMap<NodeId, KnowledgeNode> = BTreeMap::new();
    let mut flags: BTreeSet<String> = BTreeSet::new();
    let mut applied = 0usize;

    for ev in ordered {
        if ev.scene_id > *cutoff {
            break;
        }
        applied += 1;

        match &ev.kind {
            kind if kind.touches_single_node() => {
                if let Some(raw) = ev.subject() {
                    let node = skills.entry(node_id(ev, raw)?).or_default();
                    node.evidence.extend(ev.source_ref.iter().cloned());
                    node.apply(&ev.knowledge_delta);
                } else {
                    debug!(event_id = %ev.event_id, kind = %ev.kind, "no node id, skipping");
                }
            }
            EventKind::SkillUpgraded => {
                let (Some(from), Some(to)) = (
                    ev.from_node_id.as_deref().filter(|s| !s.is_empty()),
                    ev.to_node_id.as_deref().filter(|s| !s.is_empty()),
                ) else {
                    return Err(ProjectionError::MissingUpgradePair {
                        event_id: ev.event_id.clone(),
                    });
                };
                let from = node_id(ev, from)?;
                let to = node_id(ev, to)?;

                let prev = skills.remove(&from).unwrap_or_default();
                let node = skills.entry(to).or_default();
                node.evidence.extend(prev.evidence);
                node.evidence.extend(ev.source_ref.iter().cloned());
                node.facts.extend(prev.facts);
                node.apply(&ev.knowledge_delta);
            }
            _ => {}
        }

        flags.extend(ev.tags.iter().cloned());
    }

    debug!(
        character = character_id,
        cutoff = %cutoff,
        applied,
        nodes = skills.len(),
        "projection complete"
    );

    Ok(ProjectionState {
        character: character_id.to_string(),
        scene: cutoff.clone(),
        skills,
        flags: flags.into_iter().collect(),
    })
}

fn node_id(ev: &Event, raw: &str) -> Result<NodeId, ProjectionError> {
    NodeId::parse(raw).map_err(|e| ProjectionError::BadNodeId {
        event_id: ev.event_id.clone(),
        value: e.raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::parse_timeline;
    use serde_json::json;

    fn scene(raw: &str) -> SceneId {
        SceneId::parse(raw).expect("scene id")
    }

    fn cite(scene_id: &str, start: u64) -> Value {
        json!([{"type": "scene", "scene_id": scene_id, "line_start": start, "line_end": start + 1}])
    }

    fn events(doc: &Value) -> Vec<Event> {
        parse_timeline(doc).expect("valid timeline")
    }

    #[test]
    fn single_acquisition_matches_expected_shape() {
        let evs = events(&json!([{
            "event_id": "ev.jake.01.02.01.x",
            "scene_id": "01.02.01",
            "order": 1,
            "type": "skill_acquired",
            "node_id": "sn.meditation.rank1",
            "source_ref": [{"type": "scene", "scene_id": "01.02.01", "line_start": 10, "line_end": 12}]
        }]));
        let state = project_events("jake", &scene("01.02.01"), View::Character, &evs)
            .expect("project");
        let json = serde_json::to_value(&state).expect("serialize");
        assert_eq!(
            json,
            json!({
                "character": "jake",
                "scene": "01.02.01",
                "skills": {"sn.meditation.rank1": {
                    "known": true,
                    "facts": {},
                    "evidence": [{"type": "scene", "scene_id": "01.02.01", "line_start": 10, "line_end": 12}]
                }},
                "flags": []
            })
        );
    }

    #[test]
    fn upgrade_moves_evidence_and_facts_forward() {
        let evs = events(&json!([
            {"event_id": "ev.j.a", "scene_id": "01.01.01", "order": 1, "type": "skill_acquired",
             "node_id": "sn.a", "source_ref": cite("01.01.01", 1),
             "knowledge_delta": [{"field_path": "cost", "new_value": 5}, {"field_path": "range", "new_value": 1}]},
            {"event_id": "ev.j.b", "scene_id": "01.01.02", "order": 1, "type": "skill_upgraded",
             "from_node_id": "sn.a", "to_node_id": "sn.b", "source_ref": cite("01.01.02", 3),
             "knowledge_delta": [{"field_path": "cost", "new_value": 3}]}
        ]));
        let state = project_events("j", &scene("02.00.00"), View::Reader, &evs).expect("project");

        let a = NodeId::parse("sn.a").expect("id");
        let b = NodeId::parse("sn.b").expect("id");
        assert!(!state.skills.contains_key(&a));
        let node = &state.skills[&b];
        let lines: Vec<_> = node.evidence.iter().map(|r| r.line_start).collect();
        assert_eq!(lines, vec![Some(1), Some(3)]);
        assert_eq!(node.facts["cost"], json!(3));
        assert_eq!(node.facts["range"], json!(1));
    }

    #[test]
    fn upgrade_from_unknown_node_starts_empty() {
        let evs = events(&json!([
            {"event_id": "ev.j.b", "scene_id": "01.01.02", "order": 1, "type": "skill_upgraded",
             "from_node_id": "sn.never_seen", "to_node_id": "sn.b", "source_ref": cite("01.01.02", 3)}
        ]));
        let state = project_events("j", &scene("01.01.02"), View::Reader, &evs).expect("project");
        assert_eq!(state.skills.len(), 1);
        assert_eq!(state.skills.values().next().map(|n| n.evidence.len()), Some(1));
    }

    #[test]
    fn upgrade_without_pair_fails() {
        let evs = events(&json!([
            {"event_id": "ev.j.b", "scene_id": "01.01.02", "order": 1, "type": "skill_upgraded",
             "to_node_id": "sn.b", "source_ref": cite("01.01.02", 3)}
        ]));
        let err = project_events("j", &scene("01.01.02"), View::Reader, &evs).expect_err("fail");
        assert!(matches!(err, ProjectionError::MissingUpgradePair { .. }));
    }

    #[test]
    fn bad_node_id_fails() {
        let evs = events(&json!([
            {"event_id": "ev.j.a", "scene_id": "01.01.01", "order": 1, "type": "skill_acquired",
             "node_id": "Meditation", "source_ref": cite("01.01.01", 1)}
        ]));
        let err = project_events("j", &scene("01.01.01"), View::Reader, &evs).expect_err("fail");
        assert!(matches!(err, ProjectionError::BadNodeId { .. }));
    }

    #[test]
    fn cutoff_excludes_later_scenes_and_unknown_types_are_ignored() {
        let evs = events(&json!([
            {"event_id": "ev.j.late", "scene_id": "01.03.01", "order": 1, "type": "skill_acquired",
             "node_id": "sn.late", "source_ref": cite("01.03.01", 1), "tags": ["late_flag"]},
            {"event_id": "ev.j.stat", "scene_id": "01.01.01", "order": 2, "type": "stat_changed",
             "source_ref": cite("01.01.01", 5), "tags": ["office_life", "office_life"]},
            {"event_id": "ev.j.early", "scene_id": "01.01.01", "order": 1, "type": "skill_observation",
             "skill_id": "sn.early", "source_ref": cite("01.01.01", 1), "tags": ["cultivation"]}
        ]));
        let state = project_events("j", &scene("01.02.00"), View::Reader, &evs).expect("project");
        let ids: Vec<&str> = state.skills.keys().map(NodeId::as_str).collect();
        assert_eq!(ids, vec!["sn.early"]);
        assert_eq!(state.flags, vec!["cultivation", "office_life"]);
    }

    #[test]
    fn character_view_reorders_but_keeps_book_cutoff() {
        // Learned in 01.01.09 (epistemic) but narrated in 01.02.01.
        let evs = events(&json!([
            {"event_id": "ev.j.first", "scene_id": "01.01.05", "order": 1, "type": "skill_acquired",
             "node_id": "sn.x", "source_ref": cite("01.01.05", 1),
             "knowledge_delta": [{"field_path": "note", "new_value": "book"}]},
            {"event_id": "ev.j.flash", "scene_id": "01.02.01", "order": 1, "type": "skill_observation",
             "node_id": "sn.x", "source_ref": cite("01.02.01", 1),
             "epistemic_at": {"scene_id": "01.01.01"},
             "knowledge_delta": [{"field_path": "note", "new_value": "epistemic"}]}
        ]));

        let reader = project_events("j", &scene("01.02.01"), View::Reader, &evs).expect("reader");
        let character =
            project_events("j", &scene("01.02.01"), View::Character, &evs).expect("character");
        let x = NodeId::parse("sn.x").expect("id");
        assert_eq!(reader.skills[&x].facts["note"], json!("epistemic"));
        assert_eq!(character.skills[&x].facts["note"], json!("book"));

        // The flashback sorts first in character view, and its book scene is
        // past this cutoff, so replay stops before anything is applied.
        let early = project_events("j", &scene("01.01.09"), View::Character, &evs).expect("early");
        assert!(early.skills.is_empty());
    }

    #[test]
    fn view_parses() {
        assert_eq!("reader".parse::<View>(), Ok(View::Reader));
        assert_eq!(View::default(), View::Character);
        assert!("omniscient".parse::<View>().is_err());
    }
}
