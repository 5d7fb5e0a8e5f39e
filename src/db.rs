use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0} already exists")]
    Duplicate(String),
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl DbError {
    /// Turns a unique-constraint violation into `Duplicate`, anything else into `Sqlx`.
    fn on_conflict(err: sqlx::Error, what: impl FnOnce() -> String) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return DbError::Duplicate(what());
            }
        }
        DbError::Sqlx(err)
    }
}

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_fetched_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, FromRow)]
pub struct FeedWithCreator {
    #[sqlx(flatten)]
    pub feed: Feed,
    pub creator_name: String,
}

#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FeedFollow {
    pub id: i64,
    pub user_id: i64,
    pub feed_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct FeedFollowWithFeed {
    #[sqlx(flatten)]
    pub follow: FeedFollow,
    pub feed_name: String,
    pub feed_url: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct Item {
    pub id: i64,
    pub feed_id: i64,
    pub guid: String,
    pub title: String,
    pub link: String,
    pub description: String,
    /// Publication date exactly as the feed wrote it
    pub published: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ItemWithFeed {
    #[sqlx(flatten)]
    pub item: Item,
    pub feed_name: String,
}

/// Fixed-width RFC 3339 so that text ordering in SQL matches time ordering.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> DbResult<Self> {
        // One connection per invocation; also keeps `sqlite::memory:` a single database.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> DbResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feeds (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                last_fetched_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS feed_follows (
                id INTEGER PRIMARY KEY,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(user_id, feed_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY,
                feed_id INTEGER NOT NULL REFERENCES feeds(id) ON DELETE CASCADE,
                guid TEXT NOT NULL,
                title TEXT NOT NULL,
                link TEXT NOT NULL,
                description TEXT NOT NULL,
                published TEXT,
                created_at TEXT NOT NULL,
                UNIQUE(feed_id, guid)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_feeds_last_fetched
            ON feeds(last_fetched_at, id)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // Users

    pub async fn create_user(&self, name: &str) -> DbResult<User> {
        let now = timestamp(Utc::now());
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, created_at, updated_at)
            VALUES (?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::on_conflict(e, || format!("user `{name}`")))
    }

    pub async fn get_user_by_name(&self, name: &str) -> DbResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    pub async fn get_users(&self) -> DbResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    /// Removes every user; feeds, follows and items go with them.
    pub async fn delete_all_users(&self) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM users")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // Feeds

    pub async fn create_feed(&self, name: &str, url: &str, user_id: i64) -> DbResult<Feed> {
        let now = timestamp(Utc::now());
        sqlx::query_as::<_, Feed>(
            r#"
            INSERT INTO feeds (name, url, user_id, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(name)
        .bind(url)
        .bind(user_id)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::on_conflict(e, || format!("feed with url `{url}`")))
    }

    pub async fn get_feed(&self, feed_id: i64) -> DbResult<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE id = ?")
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }

    pub async fn get_feed_by_url(&self, url: &str) -> DbResult<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>("SELECT * FROM feeds WHERE url = ?")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(feed)
    }

    pub async fn get_feeds(&self) -> DbResult<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>("SELECT * FROM feeds ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(feeds)
    }

    pub async fn count_feeds(&self) -> DbResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    pub async fn get_feeds_with_creators(&self) -> DbResult<Vec<FeedWithCreator>> {
        let feeds = sqlx::query_as::<_, FeedWithCreator>(
            r#"
            SELECT f.*, u.name AS creator_name
            FROM feeds f
            JOIN users u ON u.id = f.user_id
            ORDER BY f.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// The least recently fetched feed. Never-fetched feeds come first, ties go to the lowest id.
    pub async fn get_next_feed_to_fetch(&self) -> DbResult<Option<Feed>> {
        let feed = sqlx::query_as::<_, Feed>(
            r#"
            SELECT * FROM feeds
            ORDER BY last_fetched_at ASC NULLS FIRST, id ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    pub async fn mark_feed_fetched(&self, feed_id: i64) -> DbResult<Feed> {
        self.mark_feed_fetched_at(feed_id, Utc::now()).await
    }

    pub async fn mark_feed_fetched_at(&self, feed_id: i64, at: DateTime<Utc>) -> DbResult<Feed> {
        let at = timestamp(at);
        sqlx::query_as::<_, Feed>(
            r#"
            UPDATE feeds
            SET last_fetched_at = ?, updated_at = ?
            WHERE id = ?
            RETURNING *
            "#,
        )
        .bind(&at)
        .bind(&at)
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DbError::NotFound(format!("feed {feed_id}")))
    }

    // Feed follows

    pub async fn create_feed_follow(&self, user_id: i64, feed_id: i64) -> DbResult<FeedFollow> {
        let now = timestamp(Utc::now());
        sqlx::query_as::<_, FeedFollow>(
            r#"
            INSERT INTO feed_follows (user_id, feed_id, created_at, updated_at)
            VALUES (?, ?, ?, ?)
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(feed_id)
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| DbError::on_conflict(e, || format!("follow of feed {feed_id}")))
    }

    pub async fn get_feed_follow_by_user_and_feed(
        &self,
        user_id: i64,
        feed_id: i64,
    ) -> DbResult<Option<FeedFollow>> {
        let follow = sqlx::query_as::<_, FeedFollow>(
            "SELECT * FROM feed_follows WHERE user_id = ? AND feed_id = ?",
        )
        .bind(user_id)
        .bind(feed_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(follow)
    }

    /// Returns whether a follow was actually removed.
    pub async fn delete_feed_follow(&self, user_id: i64, feed_id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM feed_follows WHERE user_id = ? AND feed_id = ?")
            .bind(user_id)
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn get_feed_follows_for_user(
        &self,
        user_id: i64,
    ) -> DbResult<Vec<FeedFollowWithFeed>> {
        let follows = sqlx::query_as::<_, FeedFollowWithFeed>(
            r#"
            SELECT ff.*, f.name AS feed_name, f.url AS feed_url
            FROM feed_follows ff
            JOIN feeds f ON f.id = ff.feed_id
            WHERE ff.user_id = ?
            ORDER BY ff.created_at, ff.id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(follows)
    }

    // Items

    pub async fn upsert_item(
        &self,
        feed_id: i64,
        guid: &str,
        title: &str,
        link: &str,
        description: &str,
        published: Option<&str>,
    ) -> DbResult<()> {
        let now = timestamp(Utc::now());
        sqlx::query(
            r#"
            INSERT INTO items (feed_id, guid, title, link, description, published, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_id, guid) DO UPDATE SET
                title = excluded.title,
                link = excluded.link,
                description = excluded.description,
                published = excluded.published
            "#,
        )
        .bind(feed_id)
        .bind(guid)
        .bind(title)
        .bind(link)
        .bind(description)
        .bind(published)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_item_count_for_feed(&self, feed_id: i64) -> DbResult<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items WHERE feed_id = ?")
            .bind(feed_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    /// Newest stored items across the feeds a user follows.
    pub async fn get_items_for_user(&self, user_id: i64, limit: i64) -> DbResult<Vec<ItemWithFeed>> {
        let items = sqlx::query_as::<_, ItemWithFeed>(
            r#"
            SELECT i.*, f.name AS feed_name
            FROM items i
            JOIN feed_follows ff ON ff.feed_id = i.feed_id
            JOIN feeds f ON f.id = i.feed_id
            WHERE ff.user_id = ?
            ORDER BY i.created_at DESC, i.id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn create_test_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        db
    }

    // Database initialization tests
    mod initialization_tests {
        use super::*;

        #[tokio::test]
        async fn test_database_creation() {
            let db = Database::new("sqlite::memory:").await;
            assert!(db.is_ok());
        }

        #[tokio::test]
        async fn test_database_initialization() {
            let db = create_test_db().await;
            assert!(db.get_users().await.unwrap().is_empty());
            assert!(db.get_feeds().await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_double_initialization_is_safe() {
            let db = create_test_db().await;
            let result = db.initialize().await;
            assert!(result.is_ok());
        }
    }

    mod user_tests {
        use super::*;

        #[tokio::test]
        async fn test_create_and_get_user() {
            let db = create_test_db().await;

            let user = db.create_user("alice").await.unwrap();
            assert_eq!(user.name, "alice");

            let found = db.get_user_by_name("alice").await.unwrap();
            assert_eq!(found, Some(user));
        }

        #[tokio::test]
        async fn test_get_unknown_user() {
            let db = create_test_db().await;
            assert!(db.get_user_by_name("nobody").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_duplicate_user_name() {
            let db = create_test_db().await;
            db.create_user("alice").await.unwrap();

            let result = db.create_user("alice").await;
            assert!(matches!(result, Err(DbError::Duplicate(_))));
        }

        #[tokio::test]
        async fn test_get_users_sorted_by_name() {
            let db = create_test_db().await;
            db.create_user("carol").await.unwrap();
            db.create_user("alice").await.unwrap();
            db.create_user("bob").await.unwrap();

            let names: Vec<String> = db
                .get_users()
                .await
                .unwrap()
                .into_iter()
                .map(|u| u.name)
                .collect();
            assert_eq!(names, vec!["alice", "bob", "carol"]);
        }

        #[tokio::test]
        async fn test_delete_all_users_cascades() {
            let db = create_test_db().await;
            let alice = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", alice.id)
                .await
                .unwrap();
            db.create_feed_follow(alice.id, feed.id).await.unwrap();
            db.upsert_item(feed.id, "g1", "Post", "https://blog.example.com/1", "", None)
                .await
                .unwrap();

            let deleted = db.delete_all_users().await.unwrap();
            assert_eq!(deleted, 1);

            assert!(db.get_users().await.unwrap().is_empty());
            assert_eq!(db.count_feeds().await.unwrap(), 0);
            assert_eq!(db.get_item_count_for_feed(feed.id).await.unwrap(), 0);
        }
    }

    mod feed_tests {
        use super::*;

        #[tokio::test]
        async fn test_create_feed() {
            let db = create_test_db().await;
            let alice = db.create_user("alice").await.unwrap();

            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", alice.id)
                .await
                .unwrap();

            assert_eq!(feed.name, "Blog");
            assert_eq!(feed.url, "https://blog.example.com/rss");
            assert_eq!(feed.user_id, alice.id);
            assert!(feed.last_fetched_at.is_none());
        }

        #[tokio::test]
        async fn test_duplicate_feed_url() {
            let db = create_test_db().await;
            let alice = db.create_user("alice").await.unwrap();
            let bob = db.create_user("bob").await.unwrap();

            db.create_feed("Blog", "https://blog.example.com/rss", alice.id)
                .await
                .unwrap();
            let result = db
                .create_feed("Other", "https://blog.example.com/rss", bob.id)
                .await;

            assert!(matches!(result, Err(DbError::Duplicate(_))));
        }

        #[tokio::test]
        async fn test_feed_for_unknown_owner_fails() {
            let db = create_test_db().await;
            let result = db.create_feed("Blog", "https://blog.example.com/rss", 42).await;
            assert!(matches!(result, Err(DbError::Sqlx(_))));
        }

        #[tokio::test]
        async fn test_get_feed_by_url() {
            let db = create_test_db().await;
            let alice = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", alice.id)
                .await
                .unwrap();

            let found = db
                .get_feed_by_url("https://blog.example.com/rss")
                .await
                .unwrap();
            assert_eq!(found, Some(feed));

            let missing = db.get_feed_by_url("https://nope.example.com").await.unwrap();
            assert!(missing.is_none());
        }

        #[tokio::test]
        async fn test_feeds_with_creators() {
            let db = create_test_db().await;
            let alice = db.create_user("alice").await.unwrap();
            let bob = db.create_user("bob").await.unwrap();
            db.create_feed("A", "https://a.example.com/rss", alice.id)
                .await
                .unwrap();
            db.create_feed("B", "https://b.example.com/rss", bob.id)
                .await
                .unwrap();

            let feeds = db.get_feeds_with_creators().await.unwrap();
            assert_eq!(feeds.len(), 2);
            assert_eq!(feeds[0].feed.name, "A");
            assert_eq!(feeds[0].creator_name, "alice");
            assert_eq!(feeds[1].feed.name, "B");
            assert_eq!(feeds[1].creator_name, "bob");
        }

        #[tokio::test]
        async fn test_count_feeds() {
            let db = create_test_db().await;
            assert_eq!(db.count_feeds().await.unwrap(), 0);

            let alice = db.create_user("alice").await.unwrap();
            db.create_feed("A", "https://a.example.com/rss", alice.id)
                .await
                .unwrap();
            assert_eq!(db.count_feeds().await.unwrap(), 1);
        }
    }

    mod fetch_order_tests {
        use super::*;

        #[tokio::test]
        async fn test_next_feed_empty_pool() {
            let db = create_test_db().await;
            assert!(db.get_next_feed_to_fetch().await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_never_fetched_feed_comes_first() {
            let db = create_test_db().await;
            let alice = db.create_user("alice").await.unwrap();
            let first = db
                .create_feed("A", "https://a.example.com/rss", alice.id)
                .await
                .unwrap();
            let second = db
                .create_feed("B", "https://b.example.com/rss", alice.id)
                .await
                .unwrap();

            db.mark_feed_fetched(first.id).await.unwrap();

            let next = db.get_next_feed_to_fetch().await.unwrap().unwrap();
            assert_eq!(next.id, second.id);
        }

        #[tokio::test]
        async fn test_ties_break_on_id() {
            let db = create_test_db().await;
            let alice = db.create_user("alice").await.unwrap();
            let first = db
                .create_feed("A", "https://a.example.com/rss", alice.id)
                .await
                .unwrap();
            let second = db
                .create_feed("B", "https://b.example.com/rss", alice.id)
                .await
                .unwrap();

            let at = Utc::now();
            db.mark_feed_fetched_at(second.id, at).await.unwrap();
            db.mark_feed_fetched_at(first.id, at).await.unwrap();

            let next = db.get_next_feed_to_fetch().await.unwrap().unwrap();
            assert_eq!(next.id, first.id);
        }

        #[tokio::test]
        async fn test_oldest_fetch_comes_first() {
            let db = create_test_db().await;
            let alice = db.create_user("alice").await.unwrap();
            let first = db
                .create_feed("A", "https://a.example.com/rss", alice.id)
                .await
                .unwrap();
            let second = db
                .create_feed("B", "https://b.example.com/rss", alice.id)
                .await
                .unwrap();

            let now = Utc::now();
            db.mark_feed_fetched_at(first.id, now).await.unwrap();
            db.mark_feed_fetched_at(second.id, now - Duration::hours(1))
                .await
                .unwrap();

            let next = db.get_next_feed_to_fetch().await.unwrap().unwrap();
            assert_eq!(next.id, second.id);
        }

        #[tokio::test]
        async fn test_mark_feed_fetched_returns_updated_row() {
            let db = create_test_db().await;
            let alice = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("A", "https://a.example.com/rss", alice.id)
                .await
                .unwrap();

            let at = Utc::now();
            let updated = db.mark_feed_fetched_at(feed.id, at).await.unwrap();

            assert_eq!(updated.id, feed.id);
            assert_eq!(updated.last_fetched_at, Some(at));
            assert_eq!(updated.updated_at, at);
        }

        #[tokio::test]
        async fn test_mark_missing_feed_fetched() {
            let db = create_test_db().await;
            let result = db.mark_feed_fetched(999).await;
            assert!(matches!(result, Err(DbError::NotFound(_))));
        }
    }

    mod follow_tests {
        use super::*;

        #[tokio::test]
        async fn test_follow_and_list() {
            let db = create_test_db().await;
            let alice = db.create_user("alice").await.unwrap();
            let bob = db.create_user("bob").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", alice.id)
                .await
                .unwrap();

            let follow = db.create_feed_follow(bob.id, feed.id).await.unwrap();
            assert_eq!(follow.user_id, bob.id);
            assert_eq!(follow.feed_id, feed.id);

            let follows = db.get_feed_follows_for_user(bob.id).await.unwrap();
            assert_eq!(follows.len(), 1);
            assert_eq!(follows[0].feed_name, "Blog");
            assert_eq!(follows[0].feed_url, "https://blog.example.com/rss");

            assert!(db.get_feed_follows_for_user(alice.id).await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_duplicate_follow() {
            let db = create_test_db().await;
            let alice = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", alice.id)
                .await
                .unwrap();

            db.create_feed_follow(alice.id, feed.id).await.unwrap();
            let result = db.create_feed_follow(alice.id, feed.id).await;

            assert!(matches!(result, Err(DbError::Duplicate(_))));
        }

        #[tokio::test]
        async fn test_get_follow_by_user_and_feed() {
            let db = create_test_db().await;
            let alice = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", alice.id)
                .await
                .unwrap();

            assert!(db
                .get_feed_follow_by_user_and_feed(alice.id, feed.id)
                .await
                .unwrap()
                .is_none());

            let follow = db.create_feed_follow(alice.id, feed.id).await.unwrap();
            let found = db
                .get_feed_follow_by_user_and_feed(alice.id, feed.id)
                .await
                .unwrap();
            assert_eq!(found, Some(follow));
        }

        #[tokio::test]
        async fn test_delete_follow() {
            let db = create_test_db().await;
            let alice = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", alice.id)
                .await
                .unwrap();
            db.create_feed_follow(alice.id, feed.id).await.unwrap();

            assert!(db.delete_feed_follow(alice.id, feed.id).await.unwrap());
            assert!(!db.delete_feed_follow(alice.id, feed.id).await.unwrap());
            assert!(db.get_feed_follows_for_user(alice.id).await.unwrap().is_empty());
        }
    }

    mod item_tests {
        use super::*;

        async fn setup() -> (Database, User, Feed) {
            let db = create_test_db().await;
            let alice = db.create_user("alice").await.unwrap();
            let feed = db
                .create_feed("Blog", "https://blog.example.com/rss", alice.id)
                .await
                .unwrap();
            (db, alice, feed)
        }

        #[tokio::test]
        async fn test_upsert_new_item() {
            let (db, _, feed) = setup().await;

            db.upsert_item(
                feed.id,
                "guid-1",
                "Title",
                "https://blog.example.com/1",
                "Body",
                Some("Mon, 09 Dec 2024 12:00:00 GMT"),
            )
            .await
            .unwrap();

            assert_eq!(db.get_item_count_for_feed(feed.id).await.unwrap(), 1);
        }

        #[tokio::test]
        async fn test_upsert_updates_existing_item() {
            let (db, alice, feed) = setup().await;
            db.create_feed_follow(alice.id, feed.id).await.unwrap();

            db.upsert_item(feed.id, "guid-1", "Original", "https://a", "", None)
                .await
                .unwrap();
            db.upsert_item(
                feed.id,
                "guid-1",
                "Updated",
                "https://b",
                "New body",
                Some("Tue, 10 Dec 2024 08:00:00 GMT"),
            )
            .await
            .unwrap();

            let items = db.get_items_for_user(alice.id, 10).await.unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].item.title, "Updated");
            assert_eq!(items[0].item.link, "https://b");
            assert_eq!(items[0].item.description, "New body");
            assert_eq!(
                items[0].item.published.as_deref(),
                Some("Tue, 10 Dec 2024 08:00:00 GMT")
            );
        }

        #[tokio::test]
        async fn test_items_only_from_followed_feeds() {
            let (db, alice, feed) = setup().await;
            let other = db
                .create_feed("Other", "https://other.example.com/rss", alice.id)
                .await
                .unwrap();
            db.create_feed_follow(alice.id, feed.id).await.unwrap();

            db.upsert_item(feed.id, "g1", "Followed", "https://a", "", None)
                .await
                .unwrap();
            db.upsert_item(other.id, "g2", "Not followed", "https://b", "", None)
                .await
                .unwrap();

            let items = db.get_items_for_user(alice.id, 10).await.unwrap();
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].item.title, "Followed");
            assert_eq!(items[0].feed_name, "Blog");
        }

        #[tokio::test]
        async fn test_items_for_user_limit_and_order() {
            let (db, alice, feed) = setup().await;
            db.create_feed_follow(alice.id, feed.id).await.unwrap();

            for i in 1..=5 {
                db.upsert_item(
                    feed.id,
                    &format!("guid-{}", i),
                    &format!("Title {}", i),
                    &format!("https://blog.example.com/{}", i),
                    "",
                    None,
                )
                .await
                .unwrap();
            }

            let items = db.get_items_for_user(alice.id, 2).await.unwrap();
            assert_eq!(items.len(), 2);
            assert_eq!(items[0].item.title, "Title 5");
            assert_eq!(items[1].item.title, "Title 4");
        }
    }
}
