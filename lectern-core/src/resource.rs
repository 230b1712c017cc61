//! Resource kinds and list services.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Resource kind discriminator.
///
/// Every cached list belongs to exactly one kind. Optimistic updates can be
/// broadcast to all lists of a kind, e.g. an asset edited in the "all assets"
/// list must also change in the watch-history list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Asset,
    Video,
    Playlist,
    Course,
    Lesson,
    Quiz,
    Survey,
    Exam,
    CommentThread,
    Comment,
    Channel,
    Member,
    Notification,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 13] = [
        ResourceKind::Asset,
        ResourceKind::Video,
        ResourceKind::Playlist,
        ResourceKind::Course,
        ResourceKind::Lesson,
        ResourceKind::Quiz,
        ResourceKind::Survey,
        ResourceKind::Exam,
        ResourceKind::CommentThread,
        ResourceKind::Comment,
        ResourceKind::Channel,
        ResourceKind::Member,
        ResourceKind::Notification,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Asset => "asset",
            ResourceKind::Video => "video",
            ResourceKind::Playlist => "playlist",
            ResourceKind::Course => "course",
            ResourceKind::Lesson => "lesson",
            ResourceKind::Quiz => "quiz",
            ResourceKind::Survey => "survey",
            ResourceKind::Exam => "exam",
            ResourceKind::CommentThread => "comment_thread",
            ResourceKind::Comment => "comment",
            ResourceKind::Channel => "channel",
            ResourceKind::Member => "member",
            ResourceKind::Notification => "notification",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One list endpoint of the REST API.
///
/// Several services may share a kind (`/api/assets` and
/// `/api/assets/history` both list assets). The path doubles as the service
/// identity, so two services never collide in the cache even when their
/// query options are identical.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId {
    kind: ResourceKind,
    path: Cow<'static, str>,
}

impl ServiceId {
    pub const fn new(kind: ResourceKind, path: &'static str) -> Self {
        Self {
            kind,
            path: Cow::Borrowed(path),
        }
    }

    /// Service whose path is only known at runtime, e.g. nested under an id.
    pub fn dynamic(kind: ResourceKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: Cow::Owned(path.into()),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.path)
    }
}
