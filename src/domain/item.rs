use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Identifier of a feed item.
///
/// REST responses usually carry numeric ids while realtime payloads often
/// stringify them, so numeric strings are folded into [`ItemId::Int`] to keep
/// both paths pointing at the same item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemId {
    Int(i64),
    Text(String),
}

impl ItemId {
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(ItemId::Int),
            Value::String(s) => {
                let s = s.trim();
                if s.is_empty() {
                    None
                } else {
                    Some(Self::from(s))
                }
            }
            _ => None,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            ItemId::Int(n) => Value::from(*n),
            ItemId::Text(s) => Value::from(s.as_str()),
        }
    }
}

impl From<i64> for ItemId {
    fn from(n: i64) -> Self {
        ItemId::Int(n)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        s.parse::<i64>()
            .map(ItemId::Int)
            .unwrap_or_else(|_| ItemId::Text(s.to_string()))
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Int(n) => write!(f, "{}", n),
            ItemId::Text(s) => f.write_str(s),
        }
    }
}

/// Which reaction the viewer applied and the per-reaction counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionState {
    pub viewer_reaction: Option<String>,
    pub counts: BTreeMap<String, i64>,
}

/// New reaction aggregate for one item, from a mutation response or a broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReactionUpdate {
    pub counts: BTreeMap<String, i64>,
    pub total: Option<i64>,
    /// Broadcasts are not viewer-specific and leave this empty.
    pub viewer_reaction: Option<String>,
    pub version: Option<i64>,
}

impl ReactionUpdate {
    pub fn total(&self) -> i64 {
        self.total.unwrap_or_else(|| self.counts.values().sum())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    pub id: ItemId,
    pub created_at: Option<DateTime<Utc>>,
    pub payload: Map<String, Value>,
    pub reaction: Option<ReactionState>,
    pub reaction_count: i64,
    pub comment_count: i64,
    /// Server-side version or modification stamp, when the backend sends one.
    pub version: Option<i64>,
}

impl FeedItem {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            created_at: None,
            payload: Map::new(),
            reaction: None,
            reaction_count: 0,
            comment_count: 0,
            version: None,
        }
    }

    /// Copy the mutable fields of a newer copy of the same item.
    ///
    /// `id` is never touched and `created_at` is only filled in when missing.
    pub fn absorb(&mut self, newer: FeedItem) {
        if self.created_at.is_none() {
            self.created_at = newer.created_at;
        }
        self.payload = newer.payload;
        self.reaction = newer.reaction;
        self.reaction_count = newer.reaction_count;
        self.comment_count = newer.comment_count;
        self.version = newer.version.or(self.version);
    }

    pub fn apply_reaction(&mut self, update: &ReactionUpdate) {
        let viewer_reaction = update
            .viewer_reaction
            .clone()
            .or_else(|| self.reaction.as_ref().and_then(|r| r.viewer_reaction.clone()));
        self.reaction = Some(ReactionState {
            viewer_reaction,
            counts: update.counts.clone(),
        });
        self.reaction_count = update.total();
        if update.version.is_some() {
            self.version = update.version;
        }
    }

    /// Best-effort display text pulled from the opaque payload.
    pub fn display_text(&self) -> &str {
        ["titulo", "title", "comentario", "contenido", "text", "body"]
            .iter()
            .find_map(|key| self.payload.get(*key).and_then(Value::as_str))
            .unwrap_or("(no text)")
    }
}
