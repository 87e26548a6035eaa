use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{FeedItem, Post, Profile, SearchHit, User};

// -- Token claims --

/// Bearer token claims. `sub` is the numeric user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i64,
    pub username: String,
    pub exp: usize,
}

// -- Views --

/// Template a response should be rendered with. Rendering itself happens
/// outside this server; every response names its view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum View {
    Index,
    LockedApp,
    Subscriptions,
    SearchLoggedIn,
    SearchNoSession,
    Users,
    MyProfile,
    CheckUserProfile,
    Othern,
    Login,
    Registration,
    Event,
}

/// Response envelope: the view name plus the records for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rendered<T> {
    pub view: View,
    #[serde(flatten)]
    pub data: T,
}

impl<T> Rendered<T> {
    pub fn new(view: View, data: T) -> Self {
        Self { view, data }
    }
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub birthday: NaiveDate,
    pub password: String,
    pub password_check: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: i64,
    pub username: String,
    pub token: String,
    /// Global feed for the `index` view.
    pub rows: Vec<FeedItem>,
}

// -- Posts & profile --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreatePostRequest {
    pub text: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBioRequest {
    pub bio: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SearchRequest {
    pub search_field: String,
}

/// A freshly created post together with its author.
#[derive(Debug, Serialize, Deserialize)]
pub struct PostedPage {
    pub user: User,
    pub just_sent: Post,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeedPage {
    pub rows: Vec<FeedItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SearchPage {
    pub search_input: String,
    pub rows: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UsersPage {
    pub rows: Vec<SearchHit>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProfilePage {
    #[serde(flatten)]
    pub profile: Profile,
}

/// Body of the generic `event` view used for notices and errors.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EventPage {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Body of a view re-rendered with a user-facing validation message.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorPage {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessagePage {
    pub message: String,
}
