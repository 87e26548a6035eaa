//! Feed composition: joins posts with authors and annotates results with
//! the viewer's follow state. Every function is a pure function of the
//! viewer and the current store contents.

use std::collections::HashSet;

use axum::{Extension, Json, extract::State, response::IntoResponse};

use other_db::{Database, FeedOrder};
use other_types::api::{FeedPage, ProfilePage, Rendered, SearchPage, UsersPage, View};
use other_types::models::{Profile, SearchHit, User};
use other_types::viewer::Viewer;

use crate::error::ApiError;
use crate::middleware::require_user;
use crate::state::{AppState, with_db};

pub const NO_SUBSCRIBED_POSTS: &str =
    "Either the people you follow have not posted anything yet, or you do not follow anyone yet.";
pub const NO_SEARCH_RESULTS: &str = "No search results";

/// Every post, highest id first. Anonymous viewers get the locked view.
pub fn global_feed(db: &Database, viewer: Viewer) -> Result<Rendered<FeedPage>, ApiError> {
    let rows = db.feed_items(FeedOrder::NewestId)?;
    let view = if viewer.is_signed_in() {
        View::Index
    } else {
        View::LockedApp
    };
    Ok(Rendered::new(view, FeedPage { rows, error: None }))
}

/// Posts by authors the viewer follows, most recently created first.
pub fn subscribed_feed(db: &Database, viewer: Viewer) -> Result<Rendered<FeedPage>, ApiError> {
    let viewer_id = require_user(viewer, "see your subscriptions")?;

    let followed = db.followed_ids(viewer_id)?;
    let rows: Vec<_> = db
        .feed_items(FeedOrder::NewestCreated)?
        .into_iter()
        .filter(|item| followed.contains(&item.author_id))
        .collect();

    let error = rows.is_empty().then(|| NO_SUBSCRIBED_POSTS.to_string());
    Ok(Rendered::new(View::Subscriptions, FeedPage { rows, error }))
}

/// User search. Signed-in viewers never see themselves and get a follow
/// flag on every hit.
pub fn search(
    db: &Database,
    viewer: Viewer,
    pattern: &str,
) -> Result<Rendered<SearchPage>, ApiError> {
    let (view, rows) = match viewer.user_id() {
        Some(viewer_id) => {
            let users = db.search_users(pattern, Some(viewer_id))?;
            let followed = db.followed_ids(viewer_id)?;
            (View::SearchLoggedIn, annotate(users, &followed))
        }
        None => {
            let rows: Vec<SearchHit> = db
                .search_users(pattern, None)?
                .into_iter()
                .map(|user| SearchHit {
                    user,
                    followed: None,
                })
                .collect();
            (View::SearchNoSession, rows)
        }
    };

    let error = rows.is_empty().then(|| NO_SEARCH_RESULTS.to_string());
    Ok(Rendered::new(
        view,
        SearchPage {
            search_input: pattern.to_string(),
            rows,
            error,
        },
    ))
}

/// Everyone except the viewer, with follow flags.
pub fn user_listing(db: &Database, viewer: Viewer) -> Result<Rendered<UsersPage>, ApiError> {
    let viewer_id = require_user(viewer, "see the other users")?;

    let users = db.search_users("", Some(viewer_id))?;
    let followed = db.followed_ids(viewer_id)?;
    Ok(Rendered::new(
        View::Users,
        UsersPage {
            rows: annotate(users, &followed),
        },
    ))
}

/// A user's profile with their posts and follow counts.
pub fn profile(
    db: &Database,
    viewer: Viewer,
    user_id: i64,
) -> Result<Rendered<ProfilePage>, ApiError> {
    let viewer_id = require_user(viewer, "see profiles")?;

    let user = db
        .get_user_by_id(user_id)?
        .ok_or_else(|| ApiError::NotFound(format!("User {} does not exist.", user_id)))?;
    let posts = db.list_posts_by_user(user_id)?;
    let followers = db.follower_count(user_id)?;
    let following = db.followee_count(user_id)?;

    let view = if viewer_id == user_id {
        View::MyProfile
    } else {
        View::CheckUserProfile
    };

    Ok(Rendered::new(
        view,
        ProfilePage {
            profile: Profile {
                user,
                post_count: posts.len(),
                posts,
                followers,
                following,
            },
        },
    ))
}

// Follow state is looked up by user id, never by position in the list.
fn annotate(users: Vec<User>, followed: &HashSet<i64>) -> Vec<SearchHit> {
    users
        .into_iter()
        .map(|user| {
            let is_followed = followed.contains(&user.id);
            SearchHit {
                user,
                followed: Some(is_followed),
            }
        })
        .collect()
}

// -- Handlers --

/// GET /feed
pub async fn get_feed(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, ApiError> {
    let page = with_db(&state, move |db| global_feed(db, viewer)).await?;
    Ok(Json(page))
}

/// GET /feed/subscriptions
pub async fn get_subscriptions(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, ApiError> {
    require_user(viewer, "see your subscriptions")?;
    let page = with_db(&state, move |db| subscribed_feed(db, viewer)).await?;
    Ok(Json(page))
}
