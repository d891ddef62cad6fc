use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mysql::{params, prelude::Queryable, Opts, Pool, PooledConn, Row, TxOpts, Value};

use crate::article::{normalize_tags, Article, ArticlePatch, ArticleQuery, Category};
use crate::error::{AppError, AppResult};

/// Persistence seam for articles. Slug is the external key for every lookup.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    /// Matching articles, newest `published_at` first.
    async fn list(&self, query: &ArticleQuery) -> AppResult<Vec<Article>>;

    async fn get(&self, slug: &str) -> AppResult<Option<Article>>;

    /// Fails with `Conflict` when the slug is taken.
    async fn insert(&self, article: Article) -> AppResult<Article>;

    /// Merges `patch` into the stored article; `None` when the slug is unknown.
    async fn update(
        &self,
        slug: &str,
        patch: ArticlePatch,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Article>>;

    /// Removes the article and hands it back; `None` when the slug is unknown.
    async fn delete(&self, slug: &str) -> AppResult<Option<Article>>;

    async fn count(&self) -> AppResult<u64>;

    async fn ping(&self) -> AppResult<()>;
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS articles (
    id CHAR(24) NOT NULL PRIMARY KEY,
    title VARCHAR(100) NOT NULL,
    slug VARCHAR(191) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NOT NULL,
    content LONGTEXT NOT NULL,
    excerpt VARCHAR(200) NOT NULL,
    image TEXT NOT NULL,
    category VARCHAR(32) NOT NULL,
    author VARCHAR(191) NOT NULL,
    tags TEXT NOT NULL,
    featured BOOLEAN NOT NULL DEFAULT FALSE,
    published_at BIGINT NOT NULL,
    updated_at BIGINT NOT NULL,
    UNIQUE KEY uq_articles_slug (slug),
    KEY idx_articles_category (category),
    KEY idx_articles_published_at (published_at)
) DEFAULT CHARSET = utf8mb4";

// tables created before slugs became case-sensitive
const SLUG_COLLATION: &str = "ALTER TABLE articles
    MODIFY slug VARCHAR(191) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NOT NULL";

const COLUMNS: &str =
    "id, title, slug, content, excerpt, image, category, author, tags, featured, published_at, updated_at";

/// MySQL-backed store. The `mysql` driver is synchronous, so every call runs on
/// tokio's blocking pool against a shared connection pool.
#[derive(Clone)]
pub struct MySqlStore {
    pool: Pool,
}

impl MySqlStore {
    pub async fn connect(db_url: &str) -> AppResult<Self> {
        let opts = Opts::from_url(db_url)
            .map_err(|e| AppError::Database(format!("invalid DB_URL: {}", e)))?;

        let pool = tokio::task::spawn_blocking(move || -> AppResult<Pool> {
            let pool = Pool::new(opts)?;
            let mut conn = pool.get_conn()?;
            conn.query_drop(SCHEMA)?;
            conn.query_drop(SLUG_COLLATION)?;
            Ok(pool)
        })
        .await??;

        tracing::info!("connected to MySQL, articles table ready");
        Ok(Self { pool })
    }

    async fn with_conn<T, F>(&self, f: F) -> AppResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PooledConn) -> AppResult<T> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get_conn()?;
            f(&mut conn)
        })
        .await?
    }
}

/// Slugs compare byte-wise through the column's `utf8mb4_bin` collation.
fn find_by_slug<Q: Queryable>(
    conn: &mut Q,
    slug: &str,
    for_update: bool,
) -> AppResult<Option<Article>> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    let row: Option<Row> = conn.exec_first(
        format!("SELECT {} FROM articles WHERE slug = :slug{}", COLUMNS, lock),
        params! { "slug" => slug },
    )?;
    row.map(article_from_row).transpose()
}

fn tags_to_column(tags: &[String]) -> AppResult<String> {
    serde_json::to_string(tags).map_err(|e| AppError::internal(format!("encode tags: {}", e)))
}

fn tags_from_column(raw: &str) -> Vec<String> {
    // rows written before tags became a list hold a comma-separated string
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(tags) => tags,
        Err(_) => normalize_tags(raw.split(',')),
    }
}

fn millis_to_datetime(column: &str, millis: i64) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| AppError::Database(format!("{} out of range: {}", column, millis)))
}

fn take<T: mysql::prelude::FromValue>(row: &mut Row, column: &str) -> AppResult<T> {
    match row.take_opt::<T, _>(column) {
        Some(Ok(value)) => Ok(value),
        Some(Err(e)) => Err(AppError::Database(format!("column {}: {:?}", column, e))),
        None => Err(AppError::Database(format!("column {} missing", column))),
    }
}

fn article_from_row(mut row: Row) -> AppResult<Article> {
    let category: String = take(&mut row, "category")?;
    let category = Category::parse(&category)
        .ok_or_else(|| AppError::Database(format!("unknown category {:?}", category)))?;
    let tags: String = take(&mut row, "tags")?;
    let published_at: i64 = take(&mut row, "published_at")?;
    let updated_at: i64 = take(&mut row, "updated_at")?;

    Ok(Article {
        id: take(&mut row, "id")?,
        title: take(&mut row, "title")?,
        slug: take(&mut row, "slug")?,
        content: take(&mut row, "content")?,
        excerpt: take(&mut row, "excerpt")?,
        image: take(&mut row, "image")?,
        category,
        author: take(&mut row, "author")?,
        tags: tags_from_column(&tags),
        featured: take(&mut row, "featured")?,
        published_at: millis_to_datetime("published_at", published_at)?,
        updated_at: millis_to_datetime("updated_at", updated_at)?,
    })
}

/// `%` and `_` in user search text must match literally.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for c in search.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn list_statement(query: &ArticleQuery) -> (String, Vec<Value>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if query.featured_only {
        clauses.push("featured = TRUE");
    }
    if let Some(category) = &query.category {
        clauses.push("LOWER(category) = LOWER(?)");
        values.push(Value::from(category.clone()));
    }
    if let Some(search) = &query.search {
        clauses.push("(LOWER(title) LIKE ? OR LOWER(content) LIKE ? OR LOWER(excerpt) LIKE ?)");
        let pattern = like_pattern(search);
        for _ in 0..3 {
            values.push(Value::from(pattern.clone()));
        }
    }

    let mut sql = format!("SELECT {} FROM articles", COLUMNS);
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY published_at DESC");
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    (sql, values)
}

#[async_trait]
impl ArticleStore for MySqlStore {
    async fn list(&self, query: &ArticleQuery) -> AppResult<Vec<Article>> {
        let (sql, values) = list_statement(query);
        self.with_conn(move |conn| {
            let rows: Vec<Row> = conn.exec(sql, values)?;
            rows.into_iter().map(article_from_row).collect()
        })
        .await
    }

    async fn get(&self, slug: &str) -> AppResult<Option<Article>> {
        let slug = slug.to_string();
        self.with_conn(move |conn| find_by_slug(conn, &slug, false)).await
    }

    async fn insert(&self, article: Article) -> AppResult<Article> {
        self.with_conn(move |conn| {
            conn.exec_drop(
                format!(
                    "INSERT INTO articles ({}) VALUES (:id, :title, :slug, :content, :excerpt, :image, :category, :author, :tags, :featured, :published_at, :updated_at)",
                    COLUMNS
                ),
                params! {
                    "id" => &article.id,
                    "title" => &article.title,
                    "slug" => &article.slug,
                    "content" => &article.content,
                    "excerpt" => &article.excerpt,
                    "image" => &article.image,
                    "category" => article.category.as_str(),
                    "author" => &article.author,
                    "tags" => tags_to_column(&article.tags)?,
                    "featured" => article.featured,
                    "published_at" => article.published_at.timestamp_millis(),
                    "updated_at" => article.updated_at.timestamp_millis(),
                },
            )?;
            Ok(article)
        })
        .await
    }

    async fn update(
        &self,
        slug: &str,
        patch: ArticlePatch,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Article>> {
        let slug = slug.to_string();
        self.with_conn(move |conn| {
            let mut tx = conn.start_transaction(TxOpts::default())?;
            let Some(mut article) = find_by_slug(&mut tx, &slug, true)? else {
                return Ok(None);
            };
            patch.apply(&mut article, now);

            // published_at is immutable after insert
            tx.exec_drop(
                "UPDATE articles SET title = :title, slug = :new_slug, content = :content, excerpt = :excerpt,
                    image = :image, category = :category, author = :author, tags = :tags,
                    featured = :featured, updated_at = :updated_at
                 WHERE slug = :slug",
                params! {
                    "title" => &article.title,
                    "new_slug" => &article.slug,
                    "content" => &article.content,
                    "excerpt" => &article.excerpt,
                    "image" => &article.image,
                    "category" => article.category.as_str(),
                    "author" => &article.author,
                    "tags" => tags_to_column(&article.tags)?,
                    "featured" => article.featured,
                    "updated_at" => article.updated_at.timestamp_millis(),
                    "slug" => &slug,
                },
            )?;
            tx.commit()?;
            Ok(Some(article))
        })
        .await
    }

    async fn delete(&self, slug: &str) -> AppResult<Option<Article>> {
        let slug = slug.to_string();
        self.with_conn(move |conn| {
            let mut tx = conn.start_transaction(TxOpts::default())?;
            let Some(article) = find_by_slug(&mut tx, &slug, true)? else {
                return Ok(None);
            };
            tx.exec_drop(
                "DELETE FROM articles WHERE slug = :slug",
                params! { "slug" => &slug },
            )?;
            tx.commit()?;
            Ok(Some(article))
        })
        .await
    }

    async fn count(&self) -> AppResult<u64> {
        self.with_conn(|conn| {
            let count: Option<u64> = conn.query_first("SELECT COUNT(*) FROM articles")?;
            Ok(count.unwrap_or(0))
        })
        .await
    }

    async fn ping(&self) -> AppResult<()> {
        self.with_conn(|conn| match conn.query_first::<u8, _>("SELECT 1")? {
            Some(1) => Ok(()),
            _ => Err(AppError::Database(
                "health query returned an unexpected result".to_string(),
            )),
        })
        .await
    }
}
