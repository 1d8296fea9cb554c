use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;
use tracing::warn;

use crate::app::{FeedSyncError, Result};
use crate::domain::{FeedAdapter, FeedItem, FieldMap, ItemId, ReactionState, ReactionUpdate};
use crate::realtime::{RealtimeEvent, TransportEvent};

/// Maps backend JSON onto domain types using a feed's field map.
#[derive(Clone)]
pub struct Normalizer;

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Parse a list response body into items, plus the number of entries the
    /// server sent before any were skipped.
    ///
    /// Accepts `{ "<items_field>": [...] }`, `{ "items": [...] }` or a bare
    /// array. `success: false` is a rejection, anything else without an item
    /// array is malformed.
    pub fn normalize_page(&self, adapter: &FeedAdapter, body: &[u8]) -> Result<(Vec<FeedItem>, usize)> {
        let value: Value = serde_json::from_slice(body)
            .map_err(|e| FeedSyncError::MalformedResponse(e.to_string()))?;

        let entries = match &value {
            Value::Array(entries) => entries,
            Value::Object(obj) => {
                if obj.get("success").and_then(Value::as_bool) == Some(false) {
                    let message = obj
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("success: false");
                    return Err(FeedSyncError::Rejected(message.to_string()));
                }
                obj.get(&adapter.items_field)
                    .or_else(|| obj.get("items"))
                    .and_then(Value::as_array)
                    .ok_or_else(|| {
                        FeedSyncError::MalformedResponse(format!(
                            "missing '{}' array",
                            adapter.items_field
                        ))
                    })?
            }
            _ => {
                return Err(FeedSyncError::MalformedResponse(
                    "expected a JSON object or array".into(),
                ))
            }
        };

        let items = entries
            .iter()
            .filter_map(|entry| {
                let item = self.item_from_value(&adapter.fields, entry);
                if item.is_none() {
                    warn!(
                        "Skipping {} entry without a usable '{}'",
                        adapter.kind, adapter.fields.id
                    );
                }
                item
            })
            .collect();

        Ok((items, entries.len()))
    }

    pub fn item_from_value(&self, fields: &FieldMap, value: &Value) -> Option<FeedItem> {
        let obj = value.as_object()?;
        let id = obj.get(&fields.id).and_then(ItemId::from_json)?;

        let counts = obj
            .get(&fields.reactions)
            .map(reaction_counts)
            .unwrap_or_default();
        let viewer_reaction = obj
            .get(&fields.viewer_reaction)
            .and_then(Value::as_str)
            .map(String::from);

        let reaction_count = obj
            .get(&fields.reaction_count)
            .and_then(as_count)
            .unwrap_or_else(|| counts.values().sum());

        let reaction = if counts.is_empty() && viewer_reaction.is_none() {
            None
        } else {
            Some(ReactionState {
                viewer_reaction,
                counts,
            })
        };

        Some(FeedItem {
            id,
            created_at: obj.get(&fields.created_at).and_then(parse_timestamp),
            payload: obj.clone(),
            reaction,
            reaction_count,
            comment_count: obj
                .get(&fields.comment_count)
                .and_then(as_count)
                .unwrap_or(0),
            version: obj.get(&fields.version).and_then(as_count),
        })
    }

    /// Read a reaction aggregate from a mutation response or broadcast.
    pub fn reaction_update(&self, fields: &FieldMap, value: &Value) -> Option<ReactionUpdate> {
        let obj = value.as_object()?;
        let counts = obj.get(&fields.reactions).map(reaction_counts);
        let total = obj.get(&fields.reaction_count).and_then(as_count);

        if counts.is_none() && total.is_none() {
            return None;
        }

        Some(ReactionUpdate {
            counts: counts.unwrap_or_default(),
            total,
            viewer_reaction: obj
                .get(&fields.viewer_reaction)
                .and_then(Value::as_str)
                .map(String::from),
            version: obj.get(&fields.version).and_then(as_count),
        })
    }

    /// Decode a transport event for one feed, `None` if it is not for this feed.
    pub fn decode_event(&self, adapter: &FeedAdapter, event: &TransportEvent) -> Option<RealtimeEvent> {
        if let Some(ref room) = event.room {
            if *room != adapter.room {
                return None;
            }
        }

        let fields = &adapter.fields;
        let names = &adapter.events;

        if event.name == names.item_created {
            if let Some(ref parent) = adapter.parent {
                let target = event.payload.get(&parent.field).and_then(ItemId::from_json);
                if target.as_ref() != Some(&parent.id) {
                    return None;
                }
            }
            return self
                .item_from_value(fields, &event.payload)
                .map(RealtimeEvent::ItemCreated);
        }

        let item_id = event.payload.get(&fields.id).and_then(ItemId::from_json)?;

        if names.reaction_changed.as_deref() == Some(event.name.as_str()) {
            let update = self.reaction_update(fields, &event.payload)?;
            return Some(RealtimeEvent::ReactionChanged { item_id, update });
        }

        if names.comment_count_changed.as_deref() == Some(event.name.as_str()) {
            let count = event.payload.get(&fields.comment_count).and_then(as_count)?;
            return Some(RealtimeEvent::CommentCountChanged { item_id, count });
        }

        None
    }

    /// Pull the created item out of a comment mutation response, if it has one.
    pub fn created_item(&self, fields: &FieldMap, value: &Value) -> Option<FeedItem> {
        ["comentario", "comment", "data"]
            .iter()
            .filter_map(|key| value.get(*key))
            .chain(std::iter::once(value))
            .find_map(|candidate| self.item_from_value(fields, candidate))
    }
}

fn as_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn reaction_counts(value: &Value) -> BTreeMap<String, i64> {
    value
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter_map(|(name, count)| as_count(count).map(|c| (name.clone(), c)))
                .collect()
        })
        .unwrap_or_default()
}

/// RFC 3339, `YYYY-MM-DD HH:MM:SS` (UTC) or a Unix timestamp in seconds or milliseconds.
fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        Value::Number(n) => {
            let raw = n.as_i64()?;
            if raw.abs() < 100_000_000_000 {
                Utc.timestamp_opt(raw, 0).single()
            } else {
                Utc.timestamp_millis_opt(raw).single()
            }
        }
        _ => None,
    }
}
