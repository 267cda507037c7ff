//! Community forum types.
//!
//! Posts are structurally independent of reports. Like and comment counts
//! are maintained by clients and may drift from the stored values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::DATE_FORMAT;

/// Topic of a community post.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PostCategory {
    /// Cleanup meetups and gatherings
    Meeting,
    /// Announcements and news
    Info,
    /// Practical advice
    Tip,
    /// Questions for other residents
    Question,
    /// Proposals for the city
    Suggestion,
}

impl PostCategory {
    /// Returns the Korean display label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Meeting => "모임",
            Self::Info => "정보",
            Self::Tip => "팁",
            Self::Question => "질문",
            Self::Suggestion => "제안",
        }
    }
}

/// A reply on a community post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    /// Comment id.
    pub id: String,
    /// Author display name.
    pub author: String,
    /// Date the comment was written.
    pub date: String,
    /// Comment body.
    pub content: String,
}

/// A discussion item in the community forum.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommunityPost {
    /// Post id.
    pub id: String,
    /// Headline.
    pub title: String,
    /// Author display name.
    pub author: String,
    /// Date the post was written.
    pub date: String,
    /// Post body.
    pub content: String,
    /// Like counter.
    #[serde(default)]
    pub likes: u32,
    /// Comment counter.
    #[serde(default)]
    pub comments: u32,
    /// Topic.
    pub category: PostCategory,
    /// Loaded comments, if any.
    #[serde(default)]
    pub comment_list: Vec<Comment>,
}

impl CommunityPost {
    /// Returns a copy with the like counter incremented.
    #[must_use]
    pub fn liked(&self) -> Self {
        Self {
            likes: self.likes.saturating_add(1),
            ..self.clone()
        }
    }

    /// Returns a copy with `comment` appended and the counter incremented.
    #[must_use]
    pub fn with_comment(&self, comment: Comment) -> Self {
        let mut next = self.clone();
        next.comment_list.push(comment);
        next.comments = next.comments.saturating_add(1);
        next
    }
}

/// Payload for creating a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommunityPost {
    /// Headline.
    pub title: String,
    /// Post body.
    pub content: String,
    /// Topic.
    pub category: PostCategory,
    /// Author display name. Filled in from the session.
    #[serde(default)]
    pub author: String,
}

impl NewCommunityPost {
    /// Builds the stored record for this payload.
    #[must_use]
    pub fn into_post(self, id: String, now: DateTime<Utc>) -> CommunityPost {
        CommunityPost {
            id,
            title: self.title,
            author: self.author,
            date: now.format(DATE_FORMAT).to_string(),
            content: self.content,
            likes: 0,
            comments: 0,
            category: self.category,
            comment_list: Vec::new(),
        }
    }
}

/// Payload for adding a comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewComment {
    /// Comment body.
    pub content: String,
    /// Author display name. Filled in from the session.
    #[serde(default)]
    pub author: String,
}

impl NewComment {
    /// Builds the stored comment for this payload.
    #[must_use]
    pub fn into_comment(self, id: String, now: DateTime<Utc>) -> Comment {
        Comment {
            id,
            author: self.author,
            date: now.format(DATE_FORMAT).to_string(),
            content: self.content,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_default_when_missing() {
        let post: CommunityPost = serde_json::from_str(
            r#"{"id":"p1","title":"Cleanup Saturday","author":"Kim","date":"2024-01-10","content":"Meet at 9","category":"meeting"}"#,
        )
        .unwrap();
        assert_eq!(post.likes, 0);
        assert_eq!(post.comments, 0);
        assert!(post.comment_list.is_empty());
    }

    #[test]
    fn liked_and_commented_copies_leave_original_untouched() {
        let post = NewCommunityPost {
            title: "Tip".to_string(),
            content: "Sort your recycling".to_string(),
            category: PostCategory::Tip,
            author: "Lee".to_string(),
        }
        .into_post("p2".to_string(), Utc::now());

        let liked = post.liked();
        assert_eq!(liked.likes, 1);
        assert_eq!(post.likes, 0);

        let comment = NewComment {
            content: "Thanks".to_string(),
            author: "Park".to_string(),
        }
        .into_comment("c1".to_string(), Utc::now());
        let commented = liked.with_comment(comment);
        assert_eq!(commented.comments, 1);
        assert_eq!(commented.comment_list.len(), 1);
        assert_eq!(commented.likes, 1);
    }
}
