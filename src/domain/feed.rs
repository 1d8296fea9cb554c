use std::fmt;
use std::str::FromStr;

use serde_json::{json, Value};

use crate::app::FeedSyncError;
use crate::domain::ItemId;

/// The feeds the backend exposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeedKind {
    News,
    Posts { user_id: i64 },
    PostComments { post_id: ItemId },
    NewsComments { news_id: ItemId },
}

impl fmt::Display for FeedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedKind::News => f.write_str("news"),
            FeedKind::Posts { user_id } => write!(f, "posts:{}", user_id),
            FeedKind::PostComments { post_id } => write!(f, "post-comments:{}", post_id),
            FeedKind::NewsComments { news_id } => write!(f, "news-comments:{}", news_id),
        }
    }
}

impl FromStr for FeedKind {
    type Err = FeedSyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg.trim())),
            None => (s, None),
        };

        let missing = || FeedSyncError::Config(format!("Feed '{}' needs an id, e.g. {}:1", s, name));

        match (name, arg) {
            ("news", None) => Ok(FeedKind::News),
            ("posts", Some(arg)) => arg
                .parse::<i64>()
                .map(|user_id| FeedKind::Posts { user_id })
                .map_err(|_| FeedSyncError::Config(format!("Invalid user id: {}", arg))),
            ("post-comments", Some(arg)) if !arg.is_empty() => Ok(FeedKind::PostComments {
                post_id: ItemId::from(arg),
            }),
            ("news-comments", Some(arg)) if !arg.is_empty() => Ok(FeedKind::NewsComments {
                news_id: ItemId::from(arg),
            }),
            ("posts" | "post-comments" | "news-comments", _) => Err(missing()),
            _ => Err(FeedSyncError::Config(format!(
                "Unknown feed '{}'. Use news, posts:<user>, post-comments:<post> or news-comments:<news>",
                s
            ))),
        }
    }
}

/// JSON field names used to read an item out of a response or broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    pub id: String,
    pub created_at: String,
    pub comment_count: String,
    pub reaction_count: String,
    pub reactions: String,
    pub viewer_reaction: String,
    pub version: String,
}

impl Default for FieldMap {
    fn default() -> Self {
        Self {
            id: "id".into(),
            created_at: "createdAt".into(),
            comment_count: "commentCount".into(),
            reaction_count: "reactionCount".into(),
            reactions: "reactions".into(),
            viewer_reaction: "viewerReaction".into(),
            version: "version".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventNames {
    pub item_created: String,
    pub reaction_changed: Option<String>,
    pub comment_count_changed: Option<String>,
}

/// Only accept created-item events whose `field` equals the parent id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParentFilter {
    pub field: String,
    pub id: ItemId,
}

/// Per-feed wiring: where to fetch, how to read items, which room to join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedAdapter {
    pub kind: FeedKind,
    pub list_path: String,
    pub items_field: String,
    pub fields: FieldMap,
    pub room: String,
    pub events: EventNames,
    pub parent: Option<ParentFilter>,
    pub reaction_path: Option<String>,
}

impl FeedKind {
    pub fn adapter(&self) -> FeedAdapter {
        match self {
            FeedKind::News => FeedAdapter {
                kind: self.clone(),
                list_path: "/noticias".into(),
                items_field: "noticias".into(),
                fields: FieldMap::default(),
                room: "news".into(),
                events: EventNames {
                    item_created: "nuevaNoticia".into(),
                    reaction_changed: Some("reaccionNoticia".into()),
                    comment_count_changed: Some("comentariosNoticia".into()),
                },
                parent: None,
                reaction_path: Some("/noticias/reaccion".into()),
            },
            FeedKind::Posts { user_id } => FeedAdapter {
                kind: self.clone(),
                list_path: format!("/post/{}", user_id),
                items_field: "posts".into(),
                fields: FieldMap {
                    id: "id_contenido".into(),
                    ..FieldMap::default()
                },
                room: "posts".into(),
                events: EventNames {
                    item_created: "nuevoPost".into(),
                    reaction_changed: Some("reaccionPost".into()),
                    comment_count_changed: Some("comentariosPost".into()),
                },
                parent: None,
                reaction_path: Some("/post/reaccion".into()),
            },
            FeedKind::PostComments { post_id } => FeedAdapter {
                kind: self.clone(),
                list_path: format!("/post/comentarios/{}", post_id),
                items_field: "comentarios".into(),
                fields: FieldMap {
                    id: "idcomentario".into(),
                    ..FieldMap::default()
                },
                room: format!("post:{}", post_id),
                events: EventNames {
                    item_created: "nuevoComentario".into(),
                    reaction_changed: None,
                    comment_count_changed: None,
                },
                parent: Some(ParentFilter {
                    field: "idcontenido".into(),
                    id: post_id.clone(),
                }),
                reaction_path: None,
            },
            FeedKind::NewsComments { news_id } => FeedAdapter {
                kind: self.clone(),
                list_path: format!("/noticias/comentarios/{}", news_id),
                items_field: "comentarios".into(),
                fields: FieldMap {
                    id: "ComentarioID".into(),
                    ..FieldMap::default()
                },
                room: format!("news:{}", news_id),
                events: EventNames {
                    item_created: "newsComentarios".into(),
                    reaction_changed: None,
                    comment_count_changed: None,
                },
                parent: Some(ParentFilter {
                    field: "idcontenido".into(),
                    id: news_id.clone(),
                }),
                reaction_path: None,
            },
        }
    }
}

impl FeedAdapter {
    /// Namespaced key for this feed's offline cache entry.
    pub fn cache_key(&self) -> String {
        format!("feed:{}", self.kind)
    }

    /// Path and JSON body for posting a comment, for comment threads only.
    pub fn comment_request(&self, user_id: &str, text: &str) -> Option<(String, Value)> {
        match &self.kind {
            FeedKind::PostComments { post_id } => Some((
                "/post/comentar".into(),
                json!({
                    "id_contenido": post_id.to_json(),
                    "id_usuario": user_id,
                    "comentario": text,
                }),
            )),
            FeedKind::NewsComments { news_id } => Some((
                format!("/noticias/comentario/{}/{}", news_id, user_id),
                json!({ "comentario": text }),
            )),
            FeedKind::News | FeedKind::Posts { .. } => None,
        }
    }

    pub fn reaction_body(&self, item_id: &ItemId, user_id: &str, reaction: &str) -> Value {
        json!({
            "id_contenido": item_id.to_json(),
            "id_usuario": user_id,
            "tipo": reaction,
        })
    }
}
