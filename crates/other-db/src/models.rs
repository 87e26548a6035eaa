use chrono::{DateTime, NaiveDate, Utc};
use other_types::models::User;

/// A `users` row including the password hash. Only login reads this;
/// everything else gets the public `User`.
pub struct UserRow {
    pub id: i64,
    pub name: String,
    pub password_hash: String,
    pub birthday: NaiveDate,
    pub avatar_ref: String,
    pub bio: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            name: row.name,
            birthday: row.birthday,
            avatar_ref: row.avatar_ref,
            bio: row.bio,
            created_at: row.created_at,
        }
    }
}
