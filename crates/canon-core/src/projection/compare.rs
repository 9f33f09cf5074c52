//! Before/after verdicts: did evidence for a topic show up before the
//! upgrade that supposedly introduced it?
//!
//! Evidence is any `knowledge_delta` on a topic event whose `field_path`
//! ends with one of the tracked suffixes (optionally followed by `_rate`).
//! A delta is a *suspicion* when its confidence is below 1.0 or the event
//! cites an inference; otherwise it is a *confirmation*.

use serde::Serialize;

use crate::config::Layout;
use crate::error::TimelineError;
use crate::model::{Event, KnowledgeDelta, SceneId, SourceRef};
use crate::projection::View;
use crate::timeline::{load_timeline, sort_key};

pub const DEFAULT_FIELD_SUFFIXES: [&str; 2] = ["recovery", "regen"];

/// An event cited by a verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvidencePack {
    pub event_id: String,
    pub scene_id: SceneId,
    pub source_ref: Vec<SourceRef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub knowledge_delta: Vec<KnowledgeDelta>,
}

impl EvidencePack {
    fn new(ev: &Event, delta: Option<&KnowledgeDelta>) -> Self {
        Self {
            event_id: ev.event_id.clone(),
            scene_id: ev.scene_id.clone(),
            source_ref: ev.source_ref.clone(),
            knowledge_delta: delta.into_iter().cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// No evolve/upgrade event mentions the topic.
    NoUpgradeEvent,
    /// A confirmation predates the upgrade. `first_confirmation` carries the
    /// matching `knowledge_delta` the same way the other confirmation and
    /// suspicion packs do.
    ConfirmedBefore {
        upgrade: EvidencePack,
        first_confirmation: EvidencePack,
    },
    SuspectedBeforeConfirmedAfter {
        upgrade: EvidencePack,
        first_suspicion: EvidencePack,
        first_confirmation: EvidencePack,
    },
    ConfirmedAfter {
        upgrade: EvidencePack,
        first_confirmation: EvidencePack,
    },
    NoConfirmationEvidence {
        upgrade: EvidencePack,
        first_suspicion: EvidencePack,
    },
    NoEvidence {
        upgrade: EvidencePack,
    },
}

impl Verdict {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::NoUpgradeEvent => "no_upgrade_event",
            Self::ConfirmedBefore { .. } => "confirmed_before",
            Self::SuspectedBeforeConfirmedAfter { .. } => "suspected_before_confirmed_after",
            Self::ConfirmedAfter { .. } => "confirmed_after",
            Self::NoConfirmationEvidence { .. } => "no_confirmation_evidence",
            Self::NoEvidence { .. } => "no_evidence",
        }
    }
}

fn field_matches(field_path: &str, suffixes: &[String]) -> bool {
    suffixes.iter().any(|s| {
        field_path.ends_with(s.as_str())
            || field_path
                .strip_suffix("_rate")
                .is_some_and(|p| p.ends_with(s.as_str()))
    })
}

fn is_suspicion(ev: &Event, delta: &KnowledgeDelta) -> bool {
    delta.confidence_or_certain() < 1.0
        || ev
            .source_ref
            .iter()
            .any(|r| r.inference_type.as_deref().is_some_and(|t| !t.is_empty()))
}

/// Compute the verdict for `topic_prefix` over `events` (any order).
#[must_use]
pub fn compare_before_after(events: &[Event], topic_prefix: &str, suffixes: &[String]) -> Verdict {
    let on_topic = |ev: &&Event| ev.mentioned_nodes().any(|n| n.starts_with(topic_prefix));

    let mut upgrades: Vec<&Event> = events
        .iter()
        .filter(on_topic)
        .filter(|ev| ev.kind.is_upgrade())
        .collect();
    upgrades.sort_by(|a, b| sort_key(a, View::Reader).cmp(&sort_key(b, View::Reader)));
    let Some(up) = upgrades.first().copied() else {
        return Verdict::NoUpgradeEvent;
    };

    let mut deltas: Vec<(&Event, &KnowledgeDelta)> = events
        .iter()
        .filter(on_topic)
        .flat_map(|ev| ev.knowledge_delta.iter().map(move |d| (ev, d)))
        .filter(|(_, d)| field_matches(&d.field_path, suffixes))
        .collect();
    deltas.sort_by(|(a, _), (b, _)| sort_key(a, View::Reader).cmp(&sort_key(b, View::Reader)));

    let first_sus = deltas.iter().copied().find(|(e, d)| is_suspicion(e, d));
    let first_con = deltas.iter().copied().find(|(e, d)| !is_suspicion(e, d));

    let upgrade = EvidencePack::new(up, None);
    let pack = |(ev, d): (&Event, &KnowledgeDelta)| EvidencePack::new(ev, Some(d));

    match (first_sus, first_con) {
        (_, Some(con)) if (&con.0.scene_id, con.0.order) < (&up.scene_id, up.order) => {
            Verdict::ConfirmedBefore {
                upgrade,
                first_confirmation: pack(con),
            }
        }
        (Some(sus), Some(con))
            if con.0.scene_id > up.scene_id && sus.0.scene_id < up.scene_id =>
        {
            Verdict::SuspectedBeforeConfirmedAfter {
                upgrade,
                first_suspicion: pack(sus),
                first_confirmation: pack(con),
            }
        }
        (_, Some(con)) => Verdict::ConfirmedAfter {
            upgrade,
            first_confirmation: pack(con),
        },
        (Some(sus), None) => Verdict::NoConfirmationEvidence {
            upgrade,
            first_suspicion: pack(sus),
        },
        (None, None) => Verdict::NoEvidence { upgrade },
    }
}

/// Load the timeline of `character_id` and compare.
///
/// # Errors
///
/// Returns [`TimelineError`] if the timeline is unreadable or malformed.
pub fn compare(
    layout: &Layout,
    character_id: &str,
    topic_prefix: &str,
    suffixes: &[String],
) -> Result<Verdict, TimelineError> {
    let events = load_timeline(layout, character_id)?;
    Ok(compare_before_after(&events, topic_prefix, suffixes))
}
