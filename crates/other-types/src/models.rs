use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Public profile of a user. The password hash never leaves the DB layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub birthday: NaiveDate,
    pub avatar_ref: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
}

/// A short text update ("other").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub author_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A post joined with the author fields a feed needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedItem {
    pub post_id: i64,
    pub author_id: i64,
    pub author_name: String,
    pub author_avatar: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// A user in a search result or user listing.
///
/// `followed` is only present when the searching viewer is signed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(flatten)]
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub followed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub user: User,
    pub posts: Vec<Post>,
    pub post_count: usize,
    /// Users following this one.
    pub followers: u64,
    /// Users this one follows.
    pub following: u64,
}
