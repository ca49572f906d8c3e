//! SQLite-backed persistence for saved articles.
//!
//! One table, `articles`, holding the submitted URL, the extracted metadata,
//! and a creation timestamp in unix seconds. Rows are only ever written whole:
//! callers insert after fetching and extraction succeeded, so a failed
//! submission leaves no trace. Lists are served newest first.
use chrono::{DateTime, Utc};
use shelf_common::{Article, NewArticle, PageRequest};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, FromRow)]
struct ArticleRow {
    id: i64,
    url: String,
    title: Option<String>,
    description: Option<String>,
    image: Option<String>,
    favicon: Option<String>,
    created_at: i64,
}

impl From<ArticleRow> for Article {
    fn from(row: ArticleRow) -> Self {
        Article {
            id: row.id,
            url: row.url,
            title: row.title,
            description: row.description,
            image: row.image,
            favicon: row.favicon,
            created_at: DateTime::<Utc>::from_timestamp(row.created_at, 0).unwrap_or_default(),
        }
    }
}

const ARTICLE_COLUMNS: &str = "id, url, title, description, image, favicon, created_at";

#[derive(Clone)]
pub struct ArticleStore {
    pool: SqlitePool,
}

impl ArticleStore {
    /// Connect to `database_url` and make sure the schema exists.
    ///
    /// Use `sqlite://shelf.db?mode=rwc` to create the file on first start.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect(database_url)
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        info!(max_connections, "store.connected");
        Ok(store)
    }

    /// Private in-memory database. A single connection that never expires,
    /// since every new SQLite memory connection starts empty.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Idempotent schema bootstrap.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS articles (
                id          INTEGER PRIMARY KEY NOT NULL,
                url         TEXT    NOT NULL,
                title       TEXT,
                description TEXT,
                image       TEXT,
                favicon     TEXT,
                created_at  INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_articles_created_at ON articles(created_at)",
        )
        .execute(&self.pool)
        .await?;

        debug!("store.migrate.done");
        Ok(())
    }

    /// Persist a new article; the store assigns `id` and `created_at`.
    pub async fn insert(&self, new: &NewArticle) -> Result<Article> {
        let created_at = Utc::now().timestamp();
        let sql = format!(
            "INSERT INTO articles (url, title, description, image, favicon, created_at) \
             VALUES (?, ?, ?, ?, ?, ?) RETURNING {ARTICLE_COLUMNS}"
        );
        let row: ArticleRow = sqlx::query_as(&sql)
            .bind(new.url.as_str())
            .bind(new.metadata.title.as_deref())
            .bind(new.metadata.description.as_deref())
            .bind(new.metadata.image.as_deref())
            .bind(new.metadata.favicon.as_deref())
            .bind(created_at)
            .fetch_one(&self.pool)
            .await?;

        info!(id = row.id, url = %row.url, "store.insert.done");
        Ok(row.into())
    }

    /// One page of articles, newest first.
    pub async fn list(&self, window: PageRequest) -> Result<Vec<Article>> {
        let sql = format!(
            "SELECT {ARTICLE_COLUMNS} FROM articles \
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        let rows: Vec<ArticleRow> = sqlx::query_as(&sql)
            .bind(i64::from(window.limit))
            .bind(window.offset())
            .fetch_all(&self.pool)
            .await?;

        debug!(
            page = window.page,
            limit = window.limit,
            returned = rows.len(),
            "store.list.done"
        );
        Ok(rows.into_iter().map(Article::from).collect())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Article>> {
        let sql = format!("SELECT {ARTICLE_COLUMNS} FROM articles WHERE id = ?");
        let row: Option<ArticleRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(Article::from))
    }

    pub async fn count(&self) -> Result<i64> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM articles")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    /// Cheap liveness probe for health checks.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
