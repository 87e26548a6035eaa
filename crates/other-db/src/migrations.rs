use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: i64 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| r.get(0))?;

    if version < 1 {
        info!("Running migration v1 (users, posts, follows)");
        conn.execute_batch(
            "
            CREATE TABLE users (
                id              INTEGER PRIMARY KEY,
                name            TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                birthday        TEXT NOT NULL,
                avatar_ref      TEXT NOT NULL,
                bio             TEXT NOT NULL,
                created_at      TEXT NOT NULL
            );

            CREATE TABLE posts (
                id          INTEGER PRIMARY KEY,
                author_id   INTEGER NOT NULL REFERENCES users(id),
                text        TEXT NOT NULL,
                created_at  TEXT NOT NULL
            );

            CREATE INDEX idx_posts_author
                ON posts(author_id, created_at);

            CREATE TABLE follows (
                follower    INTEGER NOT NULL REFERENCES users(id),
                followee    INTEGER NOT NULL REFERENCES users(id),
                PRIMARY KEY (follower, followee)
            );

            CREATE INDEX idx_follows_followee
                ON follows(followee);

            INSERT INTO schema_version (version) VALUES (1);
            ",
        )?;
    }

    info!("Database migrations complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_twice_is_a_no_op() {
        let conn = Connection::open_in_memory().unwrap();
        run(&conn).unwrap();
        run(&conn).unwrap();

        let versions: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(versions, 1);
    }
}
