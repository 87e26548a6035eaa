use std::collections::HashSet;

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::info;

use other_types::models::{FeedItem, Post, User};

use crate::error::{DbError, DbResult};
use crate::models::UserRow;
use crate::Database;

pub const DEFAULT_AVATAR: &str = "default";
pub const DEFAULT_BIO: &str = "Hallo, bin neu hier. Komme jetzt öfters.";

const USER_COLUMNS: &str = "id, name, password_hash, birthday, avatar_ref, bio, created_at";

/// Ordering of the post/author join.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedOrder {
    /// Highest post id first (the global feed).
    NewestId,
    /// Most recently created first (the subscribed feed).
    NewestCreated,
}

impl Database {
    // -- Users --

    /// Insert a user with the next dense id (`row count + 1`).
    ///
    /// The caller hashes the password; this only enforces a non-empty,
    /// unused name.
    pub fn create_user(
        &self,
        name: &str,
        password_hash: &str,
        birthday: NaiveDate,
    ) -> DbResult<User> {
        if name.is_empty() {
            return Err(DbError::Validation("You must choose a username.".into()));
        }

        self.with_tx(|conn| {
            if query_user_by_name(conn, name)?.is_some() {
                return Err(DbError::Validation(
                    "That username is already taken, please choose another one.".into(),
                ));
            }

            let id: i64 = conn.query_row("SELECT COUNT(*) + 1 FROM users", [], |r| r.get(0))?;
            let created_at = Utc::now();

            conn.execute(
                "INSERT INTO users (id, name, password_hash, birthday, avatar_ref, bio, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![id, name, password_hash, birthday, DEFAULT_AVATAR, DEFAULT_BIO, created_at],
            )?;

            info!("Registered user {} as id {}", name, id);
            Ok(User {
                id,
                name: name.to_string(),
                birthday,
                avatar_ref: DEFAULT_AVATAR.to_string(),
                bio: DEFAULT_BIO.to_string(),
                created_at,
            })
        })
    }

    pub fn get_user_by_name(&self, name: &str) -> DbResult<Option<User>> {
        self.with_conn(|conn| Ok(query_user_by_name(conn, name)?.map(User::from)))
    }

    /// Like `get_user_by_name` but keeps the password hash, for login.
    pub fn get_credentials(&self, name: &str) -> DbResult<Option<UserRow>> {
        self.with_conn(|conn| query_user_by_name(conn, name))
    }

    pub fn get_user_by_id(&self, id: i64) -> DbResult<Option<User>> {
        self.with_conn(|conn| Ok(query_user_by_id(conn, id)?.map(User::from)))
    }

    pub fn update_bio(&self, id: i64, bio: &str) -> DbResult<()> {
        self.with_tx(|conn| {
            let changed = conn.execute("UPDATE users SET bio = ?1 WHERE id = ?2", params![bio, id])?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("User {} does not exist.", id)));
            }
            info!("Bio of user {} was updated", id);
            Ok(())
        })
    }

    pub fn update_avatar(&self, id: i64, avatar_ref: &str) -> DbResult<()> {
        self.with_tx(|conn| {
            let changed = conn.execute(
                "UPDATE users SET avatar_ref = ?1 WHERE id = ?2",
                params![avatar_ref, id],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound(format!("User {} does not exist.", id)));
            }
            info!("Avatar of user {} set to {}", id, avatar_ref);
            Ok(())
        })
    }

    /// `name LIKE %pattern%`, ordered by id. LIKE is case-sensitive on this
    /// connection (see `Database::open`), and `%`/`_` in the pattern keep
    /// their wildcard meaning. An empty pattern matches everyone; `exclude`
    /// drops one id.
    pub fn search_users(&self, pattern: &str, exclude: Option<i64>) -> DbResult<Vec<User>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE name LIKE '%' || ?1 || '%'
                   AND (?2 IS NULL OR id != ?2)
                 ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![pattern, exclude], map_user_row)?
                .map(|r| r.map(User::from))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Posts --

    /// Insert a post with the next dense id (`row count + 1`).
    pub fn create_post(&self, author_id: i64, text: &str) -> DbResult<Post> {
        if text.trim().is_empty() {
            return Err(DbError::Validation(
                "You have to write something before you can post.".into(),
            ));
        }

        self.with_tx(|conn| {
            if query_user_by_id(conn, author_id)?.is_none() {
                return Err(DbError::NotFound(format!("User {} does not exist.", author_id)));
            }

            let id: i64 = conn.query_row("SELECT COUNT(*) + 1 FROM posts", [], |r| r.get(0))?;
            let created_at = Utc::now();

            conn.execute(
                "INSERT INTO posts (id, author_id, text, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![id, author_id, text, created_at],
            )?;

            info!("User {} created post {}", author_id, id);
            Ok(Post {
                id,
                author_id,
                text: text.to_string(),
                created_at,
            })
        })
    }

    /// All posts, highest id first.
    pub fn list_posts(&self) -> DbResult<Vec<Post>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, author_id, text, created_at FROM posts ORDER BY id DESC",
            )?;
            let rows = stmt
                .query_map([], map_post_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Posts of one user, most recently created first.
    pub fn list_posts_by_user(&self, author_id: i64) -> DbResult<Vec<Post>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, author_id, text, created_at FROM posts
                 WHERE author_id = ?1
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt
                .query_map([author_id], map_post_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_post(&self, id: i64) -> DbResult<Option<Post>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, author_id, text, created_at FROM posts WHERE id = ?1",
                    [id],
                    map_post_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// Delete a post owned by `requester_id`, then renumber the survivors so
    /// ids stay `1..=N`.
    pub fn delete_post(&self, id: i64, requester_id: i64) -> DbResult<()> {
        self.with_tx(|conn| {
            let author: Option<i64> = conn
                .query_row("SELECT author_id FROM posts WHERE id = ?1", [id], |r| r.get(0))
                .optional()?;

            match author {
                None => return Err(DbError::NotFound(format!("Post {} does not exist.", id))),
                Some(author) if author != requester_id => {
                    return Err(DbError::Forbidden(
                        "You are not allowed to delete posts of other users.".into(),
                    ));
                }
                Some(_) => {}
            }

            conn.execute("DELETE FROM posts WHERE id = ?1", [id])?;
            let moved = compact_post_ids(conn)?;

            info!("Deleted post {} ({} posts renumbered)", id, moved);
            Ok(())
        })
    }

    /// Posts joined with author name and avatar.
    pub fn feed_items(&self, order: FeedOrder) -> DbResult<Vec<FeedItem>> {
        let order_by = match order {
            FeedOrder::NewestId => "p.id DESC",
            FeedOrder::NewestCreated => "p.created_at DESC, p.id DESC",
        };

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT p.id, p.author_id, u.name, u.avatar_ref, p.text, p.created_at
                 FROM posts p
                 JOIN users u ON u.id = p.author_id
                 ORDER BY {order_by}"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(FeedItem {
                        post_id: row.get(0)?,
                        author_id: row.get(1)?,
                        author_name: row.get(2)?,
                        author_avatar: row.get(3)?,
                        text: row.get(4)?,
                        created_at: row.get(5)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Follows --

    pub fn follow_exists(&self, follower: i64, followee: i64) -> DbResult<bool> {
        self.with_conn(|conn| {
            let found: Option<i64> = conn
                .query_row(
                    "SELECT 1 FROM follows WHERE follower = ?1 AND followee = ?2",
                    params![follower, followee],
                    |r| r.get(0),
                )
                .optional()?;
            Ok(found.is_some())
        })
    }

    /// Add a follow edge. Returns false if it already existed.
    pub fn follow(&self, follower: i64, followee: i64) -> DbResult<bool> {
        if follower == followee {
            return Err(DbError::Validation("You cannot follow yourself.".into()));
        }

        self.with_tx(|conn| {
            if query_user_by_id(conn, followee)?.is_none() {
                return Err(DbError::NotFound(format!("User {} does not exist.", followee)));
            }

            let inserted = conn.execute(
                "INSERT OR IGNORE INTO follows (follower, followee) VALUES (?1, ?2)",
                params![follower, followee],
            )?;

            if inserted > 0 {
                info!("User {} followed {}", follower, followee);
            }
            Ok(inserted > 0)
        })
    }

    /// Remove a follow edge. Returns false if there was none.
    pub fn unfollow(&self, follower: i64, followee: i64) -> DbResult<bool> {
        self.with_tx(|conn| {
            let removed = conn.execute(
                "DELETE FROM follows WHERE follower = ?1 AND followee = ?2",
                params![follower, followee],
            )?;

            if removed > 0 {
                info!("User {} unfollowed {}", follower, followee);
            }
            Ok(removed > 0)
        })
    }

    /// Number of users `user_id` follows.
    pub fn followee_count(&self, user_id: i64) -> DbResult<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE follower = ?1",
                [user_id],
                |r| r.get(0),
            )?;
            Ok(n as u64)
        })
    }

    /// Number of users following `user_id`.
    pub fn follower_count(&self, user_id: i64) -> DbResult<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM follows WHERE followee = ?1",
                [user_id],
                |r| r.get(0),
            )?;
            Ok(n as u64)
        })
    }

    pub fn followed_ids(&self, viewer_id: i64) -> DbResult<HashSet<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT followee FROM follows WHERE follower = ?1")?;
            let ids = stmt
                .query_map([viewer_id], |r| r.get(0))?
                .collect::<Result<HashSet<i64>, _>>()?;
            Ok(ids)
        })
    }
}

/// Renumber posts to their 1-based rank by id. Walking ids in ascending
/// order means every target id is already free when it is assigned.
fn compact_post_ids(conn: &Connection) -> DbResult<usize> {
    let mut stmt = conn.prepare("SELECT id FROM posts ORDER BY id")?;
    let ids = stmt
        .query_map([], |r| r.get::<_, i64>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    drop(stmt);

    let mut moved = 0;
    for (rank, id) in (1i64..).zip(ids) {
        if rank != id {
            conn.execute("UPDATE posts SET id = ?1 WHERE id = ?2", params![rank, id])?;
            moved += 1;
        }
    }
    Ok(moved)
}

fn query_user_by_name(conn: &Connection, name: &str) -> DbResult<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE name = ?1");
    let row = conn.query_row(&sql, [name], map_user_row).optional()?;
    Ok(row)
}

fn query_user_by_id(conn: &Connection, id: i64) -> DbResult<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1");
    let row = conn.query_row(&sql, [id], map_user_row).optional()?;
    Ok(row)
}

fn map_user_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        name: row.get(1)?,
        password_hash: row.get(2)?,
        birthday: row.get(3)?,
        avatar_ref: row.get(4)?,
        bio: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn map_post_row(row: &Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        author_id: row.get(1)?,
        text: row.get(2)?,
        created_at: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn register(db: &Database, name: &str) -> User {
        let birthday = NaiveDate::from_ymd_opt(1990, 11, 5).unwrap();
        db.create_user(name, "$argon2id$stub", birthday).unwrap()
    }

    #[test]
    fn user_ids_are_dense_and_defaults_applied() {
        let db = db();
        let alice = register(&db, "alice");
        let bob = register(&db, "bob");

        assert_eq!(alice.id, 1);
        assert_eq!(bob.id, 2);
        assert_eq!(alice.avatar_ref, DEFAULT_AVATAR);
        assert_eq!(alice.bio, DEFAULT_BIO);

        let stored = db.get_user_by_id(2).unwrap().unwrap();
        assert_eq!(stored, bob);
        assert_eq!(db.get_user_by_name("alice").unwrap().unwrap().id, 1);
        assert!(db.get_user_by_name("carol").unwrap().is_none());
    }

    #[test]
    fn duplicate_name_rejected_and_first_untouched() {
        let db = db();
        let alice = register(&db, "alice");

        let err = db
            .create_user("alice", "other-hash", NaiveDate::from_ymd_opt(2001, 1, 1).unwrap())
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));

        let creds = db.get_credentials("alice").unwrap().unwrap();
        assert_eq!(creds.password_hash, "$argon2id$stub");
        assert_eq!(creds.birthday, alice.birthday);
        assert_eq!(db.search_users("", None).unwrap().len(), 1);
    }

    #[test]
    fn empty_name_rejected() {
        let db = db();
        let err = db
            .create_user("", "hash", NaiveDate::from_ymd_opt(2001, 1, 1).unwrap())
            .unwrap_err();
        assert!(matches!(err, DbError::Validation(_)));
    }

    #[test]
    fn bio_and_avatar_updates() {
        let db = db();
        let alice = register(&db, "alice");

        db.update_bio(alice.id, "Rust and tea").unwrap();
        db.update_avatar(alice.id, "c0ffee").unwrap();

        let stored = db.get_user_by_id(alice.id).unwrap().unwrap();
        assert_eq!(stored.bio, "Rust and tea");
        assert_eq!(stored.avatar_ref, "c0ffee");

        assert!(matches!(db.update_bio(99, "x"), Err(DbError::NotFound(_))));
    }

    #[test]
    fn search_is_case_sensitive_substring() {
        let db = db();
        register(&db, "Alice");
        register(&db, "malice");
        register(&db, "bob");

        let names = |users: Vec<User>| users.into_iter().map(|u| u.name).collect::<Vec<_>>();

        assert_eq!(names(db.search_users("lice", None).unwrap()), ["Alice", "malice"]);
        assert_eq!(names(db.search_users("Ali", None).unwrap()), ["Alice"]);
        assert_eq!(names(db.search_users("ALI", None).unwrap()), Vec::<String>::new());
        assert_eq!(names(db.search_users("lice", Some(1)).unwrap()), ["malice"]);
        assert_eq!(names(db.search_users("", Some(2)).unwrap()), ["Alice", "bob"]);
    }

    #[test]
    fn search_pattern_keeps_like_wildcards() {
        let db = db();
        register(&db, "alice");
        register(&db, "bob");

        let names = |users: Vec<User>| users.into_iter().map(|u| u.name).collect::<Vec<_>>();

        assert_eq!(names(db.search_users("a_i", None).unwrap()), ["alice"]);
        assert_eq!(names(db.search_users("a%e", None).unwrap()), ["alice"]);
        assert_eq!(names(db.search_users("%", None).unwrap()), ["alice", "bob"]);
        assert!(db.search_users("A_I", None).unwrap().is_empty());
    }

    #[test]
    fn created_post_is_listed_once() {
        let db = db();
        let alice = register(&db, "alice");

        let post = db.create_post(alice.id, "hello world").unwrap();
        assert_eq!(post.id, 1);

        let all = db.list_posts().unwrap();
        let matching: Vec<_> = all.iter().filter(|p| p.id == post.id).collect();
        assert_eq!(matching.len(), 1);
        assert_eq!(matching[0].author_id, alice.id);
        assert_eq!(matching[0].text, "hello world");
        assert_eq!(db.get_post(1).unwrap().unwrap(), post);
    }

    #[test]
    fn empty_post_rejected() {
        let db = db();
        let alice = register(&db, "alice");
        assert!(matches!(db.create_post(alice.id, ""), Err(DbError::Validation(_))));
        assert!(matches!(db.create_post(alice.id, "   "), Err(DbError::Validation(_))));
        assert!(matches!(db.create_post(42, "orphan"), Err(DbError::NotFound(_))));
        assert!(db.list_posts().unwrap().is_empty());
    }

    #[test]
    fn listings_are_newest_first() {
        let db = db();
        let alice = register(&db, "alice");
        let bob = register(&db, "bob");

        db.create_post(alice.id, "a1").unwrap();
        db.create_post(bob.id, "b1").unwrap();
        db.create_post(alice.id, "a2").unwrap();

        let ids: Vec<i64> = db.list_posts().unwrap().iter().map(|p| p.id).collect();
        assert_eq!(ids, [3, 2, 1]);

        let texts: Vec<String> = db
            .list_posts_by_user(alice.id)
            .unwrap()
            .into_iter()
            .map(|p| p.text)
            .collect();
        assert_eq!(texts, ["a2", "a1"]);
    }

    #[test]
    fn delete_compacts_ids() {
        let db = db();
        let alice = register(&db, "alice");
        for i in 1..=5 {
            db.create_post(alice.id, &format!("post {}", i)).unwrap();
        }

        db.delete_post(2, alice.id).unwrap();

        let mut posts = db.list_posts().unwrap();
        posts.reverse();
        let ids: Vec<i64> = posts.iter().map(|p| p.id).collect();
        let texts: Vec<&str> = posts.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(ids, [1, 2, 3, 4]);
        assert_eq!(texts, ["post 1", "post 3", "post 4", "post 5"]);

        // the next post takes the freed tail id
        assert_eq!(db.create_post(alice.id, "post 6").unwrap().id, 5);
    }

    #[test]
    fn concurrent_writers_keep_post_ids_dense() {
        use std::sync::Arc;
        use std::thread;

        let db = Arc::new(db());
        let authors: Vec<i64> = (0..8).map(|i| register(&db, &format!("writer{}", i)).id).collect();

        let handles: Vec<_> = authors
            .into_iter()
            .map(|author| {
                let db = Arc::clone(&db);
                thread::spawn(move || {
                    let mut deleted = 0;
                    for i in 0..25 {
                        db.create_post(author, &format!("{} says {}", author, i)).unwrap();
                        if i % 5 == 4 {
                            // another writer may renumber between the lookup and the delete
                            let own = db.list_posts_by_user(author).unwrap();
                            match db.delete_post(own[0].id, author) {
                                Ok(()) => deleted += 1,
                                Err(DbError::Forbidden(_) | DbError::NotFound(_)) => {}
                                Err(e) => panic!("unexpected: {:?}", e),
                            }
                        }
                    }
                    deleted
                })
            })
            .collect();

        let deleted: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        let mut ids: Vec<i64> = db.list_posts().unwrap().iter().map(|p| p.id).collect();
        ids.reverse();
        assert_eq!(ids.len(), 8 * 25 - deleted);
        assert_eq!(ids, (1..=ids.len() as i64).collect::<Vec<_>>());
    }

    #[test]
    fn delete_last_and_only_post() {
        let db = db();
        let alice = register(&db, "alice");
        db.create_post(alice.id, "only").unwrap();
        db.delete_post(1, alice.id).unwrap();
        assert!(db.list_posts().unwrap().is_empty());
    }

    #[test]
    fn delete_requires_ownership() {
        let db = db();
        let alice = register(&db, "alice");
        let bob = register(&db, "bob");
        db.create_post(alice.id, "mine").unwrap();

        assert!(matches!(db.delete_post(1, bob.id), Err(DbError::Forbidden(_))));
        assert!(matches!(db.delete_post(7, alice.id), Err(DbError::NotFound(_))));
        assert_eq!(db.list_posts().unwrap().len(), 1);
    }

    #[test]
    fn follow_and_unfollow() {
        let db = db();
        let alice = register(&db, "alice");
        let bob = register(&db, "bob");

        assert!(db.follow(alice.id, bob.id).unwrap());
        assert!(db.follow_exists(alice.id, bob.id).unwrap());
        assert!(!db.follow_exists(bob.id, alice.id).unwrap());

        assert!(db.unfollow(alice.id, bob.id).unwrap());
        assert!(!db.follow_exists(alice.id, bob.id).unwrap());
        assert!(!db.unfollow(alice.id, bob.id).unwrap());
    }

    #[test]
    fn follow_is_idempotent() {
        let db = db();
        let alice = register(&db, "alice");
        let bob = register(&db, "bob");

        assert!(db.follow(alice.id, bob.id).unwrap());
        assert!(!db.follow(alice.id, bob.id).unwrap());
        assert_eq!(db.followee_count(alice.id).unwrap(), 1);
        assert_eq!(db.follower_count(bob.id).unwrap(), 1);

        db.unfollow(alice.id, bob.id).unwrap();
        assert_eq!(db.followee_count(alice.id).unwrap(), 0);
    }

    #[test]
    fn follow_rejects_self_and_unknown() {
        let db = db();
        let alice = register(&db, "alice");
        assert!(matches!(db.follow(alice.id, alice.id), Err(DbError::Validation(_))));
        assert!(matches!(db.follow(alice.id, 9), Err(DbError::NotFound(_))));
    }

    #[test]
    fn counts_and_followed_ids() {
        let db = db();
        let alice = register(&db, "alice");
        let bob = register(&db, "bob");
        let carol = register(&db, "carol");

        db.follow(alice.id, bob.id).unwrap();
        db.follow(alice.id, carol.id).unwrap();
        db.follow(carol.id, bob.id).unwrap();

        assert_eq!(db.followee_count(alice.id).unwrap(), 2);
        assert_eq!(db.follower_count(alice.id).unwrap(), 0);
        assert_eq!(db.follower_count(bob.id).unwrap(), 2);
        assert_eq!(db.followed_ids(alice.id).unwrap(), HashSet::from([bob.id, carol.id]));
        assert!(db.followed_ids(bob.id).unwrap().is_empty());
    }

    #[test]
    fn feed_items_join_author() {
        let db = db();
        let alice = register(&db, "alice");
        db.update_avatar(alice.id, "alice-pic").unwrap();
        db.create_post(alice.id, "first").unwrap();
        db.create_post(alice.id, "second").unwrap();

        let items = db.feed_items(FeedOrder::NewestId).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].post_id, 2);
        assert_eq!(items[0].author_name, "alice");
        assert_eq!(items[0].author_avatar, "alice-pic");
        assert_eq!(items[1].text, "first");
    }
}
