//! Timeline loading and shape validation.
//!
//! A timeline is `records/characters/<name>/timeline.json`: a JSON array of
//! event objects. Loading is conservative. It checks shape (ids, scene ids,
//! order, citations) and rejects the whole file on the first malformed
//! event, because replaying a partially valid log gives meaningless results.
//! Referential checks (does the scene exist, is the range inside it) belong
//! to [`crate::verify`].

use std::collections::BTreeMap;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Layout;
use crate::error::TimelineError;
use crate::io::read_json;
use crate::model::ids::is_event_id;
use crate::model::{Event, EventKind, KnowledgeDelta, SceneId, SourceKind, SourceRef};
use crate::projection::View;

/// Load and validate the timeline of `character_id`.
///
/// # Errors
///
/// Returns [`TimelineError`] if the file is unreadable or any event is
/// malformed.
pub fn load_timeline(layout: &Layout, character_id: &str) -> Result<Vec<Event>, TimelineError> {
    read_timeline(&layout.timeline_path(character_id))
}

/// Load and validate the timeline at `path`.
///
/// # Errors
///
/// Returns [`TimelineError`] if the file is unreadable or any event is
/// malformed.
pub fn read_timeline(path: &Path) -> Result<Vec<Event>, TimelineError> {
    let doc = read_json(path)?;
    let events = parse_timeline(&doc)?;
    debug!(path = %path.display(), events = events.len(), "loaded timeline");
    Ok(events)
}

/// Validate an already-parsed timeline document.
///
/// # Errors
///
/// Returns [`TimelineError`] describing the first malformed event.
pub fn parse_timeline(doc: &Value) -> Result<Vec<Event>, TimelineError> {
    let entries = doc.as_array().ok_or(TimelineError::NotAnArray)?;
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| parse_event(index, entry))
        .collect()
}

/// Replay order: `(effective scene, order, event_id)`.
///
/// The character view prefers `epistemic_at.scene_id` when present.
#[must_use]
pub fn sort_key(event: &Event, view: View) -> (&SceneId, u32, &str) {
    let scene = match view {
        View::Character => event.epistemic_scene.as_ref().unwrap_or(&event.scene_id),
        View::Reader => &event.scene_id,
    };
    (scene, event.order, event.event_id.as_str())
}

fn render(value: Option<&Value>) -> String {
    value.map_or_else(|| "(missing)".to_string(), Value::to_string)
}

fn parse_event(index: usize, entry: &Value) -> Result<Event, TimelineError> {
    let obj = entry
        .as_object()
        .ok_or(TimelineError::NotAnObject { index })?;

    let event_id = match obj.get("event_id").and_then(Value::as_str) {
        Some(id) if is_event_id(id) => id.to_string(),
        _ => {
            return Err(TimelineError::BadEventId {
                index,
                value: render(obj.get("event_id")),
            });
        }
    };

    let scene_id = obj
        .get("scene_id")
        .and_then(Value::as_str)
        .and_then(|raw| SceneId::parse(raw).ok())
        .ok_or_else(|| TimelineError::BadSceneId {
            event_id: event_id.clone(),
            value: render(obj.get("scene_id")),
        })?;

    let order = obj
        .get("order")
        .and_then(Value::as_u64)
        .filter(|&n| n >= 1)
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| TimelineError::BadOrder {
            event_id: event_id.clone(),
            value: render(obj.get("order")),
        })?;

    let kind = match obj.get("type") {
        None | Some(Value::Null) => EventKind::Other(String::new()),
        Some(Value::String(raw)) => EventKind::parse(raw),
        Some(_) => return Err(bad_field(&event_id, "type", "must be a string")),
    };

    let source_ref = parse_citations(&event_id, obj.get("source_ref"))?;

    Ok(Event {
        node_id: optional_string(obj, &event_id, "node_id")?,
        skill_id: optional_string(obj, &event_id, "skill_id")?,
        from_node_id: optional_string(obj, &event_id, "from_node_id")?,
        to_node_id: optional_string(obj, &event_id, "to_node_id")?,
        knowledge_delta: parse_deltas(&event_id, obj.get("knowledge_delta"))?,
        tags: parse_tags(&event_id, obj.get("tags"))?,
        epistemic_scene: parse_epistemic(&event_id, obj.get("epistemic_at"))?,
        event_id,
        scene_id,
        order,
        kind,
        source_ref,
    })
}

fn bad_field(event_id: &str, field: &'static str, reason: &str) -> TimelineError {
    TimelineError::BadField {
        event_id: event_id.to_string(),
        field,
        reason: reason.to_string(),
    }
}

fn optional_string(
    obj: &Map<String, Value>,
    event_id: &str,
    field: &'static str,
) -> Result<Option<String>, TimelineError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(bad_field(event_id, field, "must be a string")),
    }
}

fn parse_citations(event_id: &str, raw: Option<&Value>) -> Result<Vec<SourceRef>, TimelineError> {
    let list = match raw {
        Some(Value::Array(list)) if !list.is_empty() => list,
        _ => {
            return Err(TimelineError::MissingSourceRef {
                event_id: event_id.to_string(),
            });
        }
    };
    list.iter()
        .enumerate()
        .map(|(index, r)| {
            parse_citation(r).map_err(|reason| TimelineError::BadCitation {
                event_id: event_id.to_string(),
                index,
                reason,
            })
        })
        .collect()
}

/// Shape-check one citation. Scene citations need a valid scene id and
/// `1 <= line_start <= line_end`.
pub(crate) fn parse_citation(raw: &Value) -> Result<SourceRef, String> {
    let obj = raw.as_object().ok_or("is not an object")?;

    let kind = match obj.get("type") {
        None => SourceKind::Scene,
        Some(Value::String(s)) => s.parse::<SourceKind>().map_err(|e| e.to_string())?,
        Some(other) => return Err(format!("invalid source_ref.type {other}")),
    };

    let mut citation = SourceRef {
        kind,
        scene_id: None,
        line_start: None,
        line_end: None,
        confidence: None,
        inference_note: None,
        inference_type: None,
        extra: BTreeMap::new(),
    };

    for (key, value) in obj {
        match key.as_str() {
            "type" => {}
            "scene_id" => {
                let s = value.as_str().ok_or("scene_id must be a string")?;
                citation.scene_id = Some(s.to_string());
            }
            "line_start" => citation.line_start = Some(line_number(key, value)?),
            "line_end" => citation.line_end = Some(line_number(key, value)?),
            "confidence" => {
                citation.confidence = Some(value.as_f64().ok_or("confidence must be a number")?);
            }
            "inference_note" => {
                citation.inference_note =
                    Some(value.as_str().ok_or("inference_note must be a string")?.to_string());
            }
            "inference_type" => {
                citation.inference_type =
                    Some(value.as_str().ok_or("inference_type must be a string")?.to_string());
            }
            _ => {
                citation.extra.insert(key.clone(), value.clone());
            }
        }
    }

    if kind == SourceKind::Scene {
        let raw_scene = citation.scene_id.as_deref().unwrap_or_default();
        let scene = SceneId::parse(raw_scene).map_err(|e| e.to_string())?;
        citation.scene_id = Some(scene.as_str().to_string());

        let (Some(start), Some(end)) = (citation.line_start, citation.line_end) else {
            return Err("scene citation needs integer line_start and line_end".to_string());
        };
        if start < 1 || end < start {
            return Err(format!("invalid line range {start}..{end}"));
        }
    }

    Ok(citation)
}

fn line_number(key: &str, value: &Value) -> Result<u64, String> {
    value
        .as_u64()
        .ok_or_else(|| format!("{key} must be a non-negative integer, got {value}"))
}

fn parse_deltas(event_id: &str, raw: Option<&Value>) -> Result<Vec<KnowledgeDelta>, TimelineError> {
    let list = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(list)) => list,
        Some(_) => return Err(bad_field(event_id, "knowledge_delta", "must be a list")),
    };
    let err = |index, reason: &str| TimelineError::BadDelta {
        event_id: event_id.to_string(),
        index,
        reason: reason.to_string(),
    };
    list.iter()
        .enumerate()
        .map(|(index, d)| {
            let obj = d.as_object().ok_or_else(|| err(index, "is not an object"))?;
            let field_path = obj
                .get("field_path")
                .and_then(Value::as_str)
                .ok_or_else(|| err(index, "needs a string field_path"))?;
            let confidence = match obj.get("confidence") {
                None | Some(Value::Null) => None,
                Some(v) => Some(
                    v.as_f64()
                        .ok_or_else(|| err(index, "confidence must be a number"))?,
                ),
            };
            Ok(KnowledgeDelta {
                field_path: field_path.to_string(),
                new_value: obj.get("new_value").cloned().unwrap_or(Value::Null),
                confidence,
            })
        })
        .collect()
}

/// Tags are strings, or `{"tag": "..."}` objects as used by tag-aware tooling.
fn parse_tags(event_id: &str, raw: Option<&Value>) -> Result<Vec<String>, TimelineError> {
    let list = match raw {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Array(list)) => list,
        Some(_) => return Err(bad_field(event_id, "tags", "must be a list")),
    };
    list.iter()
        .map(|t| match t {
            Value::String(s) => Ok(s.clone()),
            Value::Object(o) => o
                .get("tag")
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(|| bad_field(event_id, "tags", "entries need a string tag")),
            _ => Err(bad_field(event_id, "tags", "entries must be strings")),
        })
        .collect()
}

fn parse_epistemic(event_id: &str, raw: Option<&Value>) -> Result<Option<SceneId>, TimelineError> {
    let Some(scene) = raw.and_then(|v| v.get("scene_id")) else {
        return Ok(None);
    };
    if scene.is_null() {
        return Ok(None);
    }
    scene
        .as_str()
        .and_then(|s| SceneId::parse(s).ok())
        .map(Some)
        .ok_or_else(|| bad_field(event_id, "epistemic_at.scene_id", "must be BB.CC.SS"))
}
