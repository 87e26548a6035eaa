use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{NaiveDate, TimeDelta, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use tracing::info;

use other_crypto::{hash_password, verify_password};
use other_db::Database;
use other_types::api::{
    Claims, EventPage, LoginRequest, LoginResponse, MessagePage, RegisterRequest, Rendered, View,
};
use other_types::models::User;
use other_types::viewer::Viewer;

use crate::error::{ApiError, InView};
use crate::feed;
use crate::state::{AppState, with_db};

const BAD_CREDENTIALS: &str = "Wrong username and/or password.";
const NAME_TAKEN: &str = "That username is already taken, please choose another one.";

/// Create an account. Checks run in order: name given, password given,
/// name free, passwords equal. The password is only hashed once all of
/// them pass; the store assigns the next dense id.
pub fn register_user(
    db: &Database,
    name: &str,
    password: &str,
    password_check: &str,
    birthday: NaiveDate,
) -> Result<User, ApiError> {
    if name.is_empty() {
        return Err(ApiError::validation(View::Registration, "You must choose a username."));
    }
    if password.is_empty() {
        return Err(ApiError::validation(View::Registration, "You must choose a password."));
    }
    if db.get_user_by_name(name)?.is_some() {
        return Err(ApiError::validation(View::Registration, NAME_TAKEN));
    }
    if password != password_check {
        return Err(ApiError::validation(View::Registration, "Your passwords do not match."));
    }

    let password_hash = hash_password(password).map_err(|e| ApiError::Internal(e.to_string()))?;

    // the store re-checks the name inside its write transaction
    db.create_user(name, &password_hash, birthday)
        .in_view(View::Registration)
}

/// Check a name/password pair. Unknown names and wrong passwords fail the
/// same way.
pub fn authenticate(db: &Database, name: &str, password: &str) -> Result<User, ApiError> {
    let row = db
        .get_credentials(name)?
        .ok_or_else(|| ApiError::validation(View::Login, BAD_CREDENTIALS))?;

    if !verify_password(password, &row.password_hash) {
        return Err(ApiError::validation(View::Login, BAD_CREDENTIALS));
    }

    Ok(User::from(row))
}

pub async fn register(
    State(state): State<AppState>,
    body: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.in_view(View::Registration)?;

    let user = with_db(&state, move |db| {
        register_user(db, &req.username, &req.password, &req.password_check, req.birthday)
    })
    .await?;

    info!("New account {} (id {})", user.name, user.id);

    Ok((
        StatusCode::CREATED,
        Json(Rendered::new(
            View::Login,
            MessagePage {
                message: "You have registered successfully!".into(),
            },
        )),
    ))
}

/// POST /auth/login: answers with the token and the global feed the
/// `index` view shows.
pub async fn login(
    State(state): State<AppState>,
    body: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = body.in_view(View::Login)?;
    if req.username.is_empty() {
        return Err(ApiError::validation(View::Login, BAD_CREDENTIALS));
    }

    let (user, feed) = with_db(&state, move |db| {
        let user = authenticate(db, &req.username, &req.password)?;
        let feed = feed::global_feed(db, Viewer::User(user.id))?;
        Ok((user, feed.data))
    })
    .await?;

    let token = create_token(&state.jwt_secret, user.id, &user.name, state.token_ttl_days)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    info!("User {} signed in", user.id);

    Ok(Json(Rendered::new(
        View::Index,
        LoginResponse {
            user_id: user.id,
            username: user.name,
            token,
            rows: feed.rows,
        },
    )))
}

/// Tokens are stateless; signing out tells the client to drop its token.
pub async fn logout(Extension(viewer): Extension<Viewer>) -> impl IntoResponse {
    let page = match viewer {
        Viewer::User(id) => {
            info!("User {} signed out", id);
            EventPage {
                title: "Signed out".into(),
                message: Some("You have been signed out.".into()),
                error: None,
            }
        }
        Viewer::Anonymous => EventPage {
            title: "Signed out".into(),
            message: None,
            error: Some("You were never signed in!".into()),
        },
    };

    Json(Rendered::new(View::Event, page))
}

pub fn create_token(
    secret: &str,
    user_id: i64,
    username: &str,
    ttl_days: i64,
) -> anyhow::Result<String> {
    if ttl_days <= 0 {
        anyhow::bail!("token lifetime must be positive, got {} days", ttl_days);
    }
    let exp = TimeDelta::try_days(ttl_days)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| anyhow::anyhow!("token lifetime of {} days is out of range", ttl_days))?;

    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: exp.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::decode_token;

    fn birthday() -> NaiveDate {
        NaiveDate::from_ymd_opt(1605, 11, 5).unwrap()
    }

    #[test]
    fn register_then_authenticate() {
        let db = Database::open_in_memory().unwrap();
        let user = register_user(&db, "guy", "gunpowder", "gunpowder", birthday()).unwrap();
        assert_eq!(user.id, 1);

        let signed_in = authenticate(&db, "guy", "gunpowder").unwrap();
        assert_eq!(signed_in, user);
    }

    #[test]
    fn wrong_password_and_unknown_user_look_alike() {
        let db = Database::open_in_memory().unwrap();
        register_user(&db, "guy", "gunpowder", "gunpowder", birthday()).unwrap();

        for (name, password) in [("guy", "treason"), ("robert", "gunpowder")] {
            match authenticate(&db, name, password) {
                Err(ApiError::Validation { view, message }) => {
                    assert_eq!(view, View::Login);
                    assert_eq!(message, BAD_CREDENTIALS);
                }
                other => panic!("unexpected: {:?}", other),
            }
        }
    }

    #[test]
    fn duplicate_registration_rejected() {
        let db = Database::open_in_memory().unwrap();
        register_user(&db, "guy", "gunpowder", "gunpowder", birthday()).unwrap();

        let err = register_user(&db, "guy", "other", "other", birthday()).unwrap_err();
        assert!(matches!(err, ApiError::Validation { view: View::Registration, .. }));
        // the first password still works
        assert!(authenticate(&db, "guy", "gunpowder").is_ok());
    }

    #[test]
    fn empty_fields_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(register_user(&db, "", "pw", "pw", birthday()).is_err());
        assert!(register_user(&db, "guy", "", "", birthday()).is_err());
        assert!(db.search_users("", None).unwrap().is_empty());
    }

    fn registration_error(result: Result<User, ApiError>) -> String {
        match result {
            Err(ApiError::Validation { view, message }) => {
                assert_eq!(view, View::Registration);
                message
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn registration_checks_run_in_order() {
        let db = Database::open_in_memory().unwrap();
        register_user(&db, "guy", "gunpowder", "gunpowder", birthday()).unwrap();

        let msg = registration_error(register_user(&db, "", "one", "two", birthday()));
        assert_eq!(msg, "You must choose a username.");
        let msg = registration_error(register_user(&db, "robert", "", "two", birthday()));
        assert_eq!(msg, "You must choose a password.");
        let msg = registration_error(register_user(&db, "guy", "one", "two", birthday()));
        assert_eq!(msg, NAME_TAKEN);
        let msg = registration_error(register_user(&db, "robert", "one", "two", birthday()));
        assert_eq!(msg, "Your passwords do not match.");
    }

    #[test]
    fn token_roundtrip() {
        let token = create_token("secret", 3, "guy", 1).unwrap();
        let claims = decode_token("secret", &token).unwrap();
        assert_eq!(claims.sub, 3);
        assert_eq!(claims.username, "guy");
        assert!(matches!(decode_token("other", &token), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn token_lifetime_out_of_range_is_an_error() {
        assert!(create_token("secret", 1, "guy", 200_000_000).is_err());
        assert!(create_token("secret", 1, "guy", i64::MAX).is_err());
        assert!(create_token("secret", 1, "guy", 0).is_err());
        assert!(create_token("secret", 1, "guy", -3).is_err());
    }
}
