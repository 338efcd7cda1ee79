use crate::models::{
    Comment, Genre, NewComment, NewReview, NewTaxonomyEntry, NewTitle, NewUser, Review,
    ReviewChanges, TaxonomyEntry, Taxonomy, Title, TitleChanges, TitleFilter, TitleRow, User,
    UserChanges,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, query_builder::QueryBuilder};
use std::collections::HashMap;
use std::sync::Arc;

pub type RepoResult<T> = Result<T, sqlx::Error>;

/// Repository Trait
///
/// Abstract contract for all persistence operations, so handlers can run
/// against Postgres in production and an in-memory store in tests.
///
/// Lookups return `Ok(None)` for missing rows; mutations of missing rows
/// return `Ok(None)` / `Ok(false)`. Constraint violations surface as
/// `sqlx::Error::Database`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Users ---
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>>;
    // Case-insensitive substring match on username when `search` is set.
    async fn list_users(&self, search: Option<String>) -> RepoResult<Vec<User>>;
    async fn create_user(&self, user: NewUser) -> RepoResult<User>;
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>>;
    async fn delete_user(&self, id: i64) -> RepoResult<bool>;
    // Stamps `last_login`, which invalidates outstanding confirmation codes.
    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> RepoResult<()>;

    // --- Categories & Genres ---
    async fn list_taxonomy(
        &self,
        kind: Taxonomy,
        search: Option<String>,
    ) -> RepoResult<Vec<TaxonomyEntry>>;
    async fn get_taxonomy_entry(
        &self,
        kind: Taxonomy,
        slug: &str,
    ) -> RepoResult<Option<TaxonomyEntry>>;
    async fn create_taxonomy_entry(
        &self,
        kind: Taxonomy,
        entry: NewTaxonomyEntry,
    ) -> RepoResult<TaxonomyEntry>;
    async fn delete_taxonomy_entry(&self, kind: Taxonomy, slug: &str) -> RepoResult<bool>;

    // --- Titles ---
    // Titles carry nested genres, category and the mean review score.
    async fn list_titles(&self, filter: TitleFilter) -> RepoResult<Vec<Title>>;
    async fn get_title(&self, id: i64) -> RepoResult<Option<Title>>;
    async fn create_title(&self, title: NewTitle) -> RepoResult<Title>;
    async fn update_title(&self, id: i64, changes: TitleChanges) -> RepoResult<Option<Title>>;
    async fn delete_title(&self, id: i64) -> RepoResult<bool>;

    // --- Reviews ---
    async fn list_reviews(&self, title_id: i64) -> RepoResult<Vec<Review>>;
    // Only returns the review when it belongs to `title_id`.
    async fn get_review(&self, title_id: i64, review_id: i64) -> RepoResult<Option<Review>>;
    async fn has_review(&self, title_id: i64, author_id: i64) -> RepoResult<bool>;
    async fn create_review(&self, review: NewReview) -> RepoResult<Review>;
    async fn update_review(&self, id: i64, changes: ReviewChanges) -> RepoResult<Option<Review>>;
    async fn delete_review(&self, id: i64) -> RepoResult<bool>;

    // --- Comments ---
    async fn list_comments(&self, review_id: i64) -> RepoResult<Vec<Comment>>;
    async fn get_comment(&self, review_id: i64, comment_id: i64) -> RepoResult<Option<Comment>>;
    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment>;
    async fn update_comment(&self, id: i64, text: String) -> RepoResult<Option<Comment>>;
    async fn delete_comment(&self, id: i64) -> RepoResult<bool>;
}

/// RepositoryState
///
/// The concrete type used to share the persistence layer across the application state.
pub type RepositoryState = Arc<dyn Repository>;

const USER_COLUMNS: &str =
    "id, username, email, role, bio, first_name, last_name, is_superuser, last_login, date_joined";

const TITLE_SELECT: &str = r#"
    SELECT
        t.id, t.name, t.year, t.description, t.category_id,
        c.name AS category_name, c.slug AS category_slug,
        (SELECT AVG(r.score)::float8 FROM reviews r WHERE r.title_id = t.id) AS rating
    FROM titles t
    LEFT JOIN categories c ON c.id = t.category_id
    WHERE 1 = 1
"#;

/// Review columns joined with author username and title name, read from `source`.
fn review_select(source: &str) -> String {
    format!(
        r#"SELECT r.id, r.text, u.username AS author, r.author_id, r.score, r.pub_date,
                  t.name AS title, r.title_id
           FROM {source} r
           JOIN users u ON u.id = r.author_id
           JOIN titles t ON t.id = r.title_id"#
    )
}

/// Comment columns joined with author username, read from `source`.
fn comment_select(source: &str) -> String {
    format!(
        r#"SELECT c.id, c.review_id AS review, c.text, u.username AS author, c.author_id, c.pub_date
           FROM {source} c
           JOIN users u ON u.id = c.author_id"#
    )
}

/// `ILIKE` pattern matching `term` as a literal substring. Escapes the
/// pattern metacharacters with Postgres' default escape character `\`.
fn contains_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Genre row tagged with the title it is linked to.
#[derive(FromRow)]
struct GenreLink {
    title_id: i64,
    id: i64,
    name: String,
    slug: String,
}

/// PostgresRepository
///
/// The concrete implementation of the `Repository` trait, backed by PostgreSQL.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    /// Creates a new repository instance using the initialized connection pool.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Attaches genres to title rows with a single `ANY($1)` lookup.
    async fn attach_genres(&self, rows: Vec<TitleRow>) -> RepoResult<Vec<Title>> {
        if rows.is_empty() {
            return Ok(vec![]);
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let links = sqlx::query_as::<_, GenreLink>(
            r#"SELECT gt.title_id, g.id, g.name, g.slug
               FROM genre_title gt
               JOIN genres g ON g.id = gt.genre_id
               WHERE gt.title_id = ANY($1)
               ORDER BY g.id"#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut genres: HashMap<i64, Vec<Genre>> = HashMap::new();
        for link in links {
            genres.entry(link.title_id).or_default().push(Genre {
                id: link.id,
                name: link.name,
                slug: link.slug,
            });
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let genre = genres.remove(&row.id).unwrap_or_default();
                Title::from_row(row, genre)
            })
            .collect())
    }

    async fn link_genres(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        title_id: i64,
        genre_ids: &[i64],
    ) -> RepoResult<()> {
        if genre_ids.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"INSERT INTO genre_title (genre_id, title_id)
               SELECT DISTINCT UNNEST($1::bigint[]), $2
               ON CONFLICT DO NOTHING"#,
        )
        .bind(genre_ids)
        .bind(title_id)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    // --- USERS ---

    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
    }

    /// list_users
    ///
    /// Uses QueryBuilder so the optional search term is always bound, never interpolated.
    async fn list_users(&self, search: Option<String>) -> RepoResult<Vec<User>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT {USER_COLUMNS} FROM users"));
        if let Some(s) = search {
            builder.push(" WHERE username ILIKE ");
            builder.push_bind(contains_pattern(&s));
        }
        builder.push(" ORDER BY id");
        builder.build_query_as::<User>().fetch_all(&self.pool).await
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"INSERT INTO users (username, email, role, bio, first_name, last_name, is_superuser)
               VALUES ($1, $2, $3, $4, $5, $6, $7)
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(user.username)
        .bind(user.email)
        .bind(user.role)
        .bind(user.bio)
        .bind(user.first_name)
        .bind(user.last_name)
        .bind(user.is_superuser)
        .fetch_one(&self.pool)
        .await
    }

    /// update_user
    ///
    /// `COALESCE` keeps the current value for every field left as `None`.
    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"UPDATE users
               SET username = COALESCE($2, username),
                   email = COALESCE($3, email),
                   role = COALESCE($4, role),
                   bio = COALESCE($5, bio),
                   first_name = COALESCE($6, first_name),
                   last_name = COALESCE($7, last_name)
               WHERE id = $1
               RETURNING {USER_COLUMNS}"#
        ))
        .bind(id)
        .bind(changes.username)
        .bind(changes.email)
        .bind(changes.role)
        .bind(changes.bio)
        .bind(changes.first_name)
        .bind(changes.last_name)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> RepoResult<()> {
        sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- CATEGORIES & GENRES ---
    // Table names come from the `Taxonomy` enum, never from the request.

    async fn list_taxonomy(
        &self,
        kind: Taxonomy,
        search: Option<String>,
    ) -> RepoResult<Vec<TaxonomyEntry>> {
        let mut builder: QueryBuilder<sqlx::Postgres> =
            QueryBuilder::new(format!("SELECT id, name, slug FROM {}", kind.table()));
        if let Some(s) = search {
            builder.push(" WHERE name ILIKE ");
            builder.push_bind(contains_pattern(&s));
        }
        builder.push(" ORDER BY id");
        builder
            .build_query_as::<TaxonomyEntry>()
            .fetch_all(&self.pool)
            .await
    }

    async fn get_taxonomy_entry(
        &self,
        kind: Taxonomy,
        slug: &str,
    ) -> RepoResult<Option<TaxonomyEntry>> {
        sqlx::query_as::<_, TaxonomyEntry>(&format!(
            "SELECT id, name, slug FROM {} WHERE slug = $1",
            kind.table()
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_taxonomy_entry(
        &self,
        kind: Taxonomy,
        entry: NewTaxonomyEntry,
    ) -> RepoResult<TaxonomyEntry> {
        sqlx::query_as::<_, TaxonomyEntry>(&format!(
            "INSERT INTO {} (name, slug) VALUES ($1, $2) RETURNING id, name, slug",
            kind.table()
        ))
        .bind(entry.name)
        .bind(entry.slug)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_taxonomy_entry(&self, kind: Taxonomy, slug: &str) -> RepoResult<bool> {
        let res = sqlx::query(&format!("DELETE FROM {} WHERE slug = $1", kind.table()))
            .bind(slug)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- TITLES ---

    /// list_titles
    ///
    /// Filters are appended to the base query with QueryBuilder; the rating is a
    /// correlated `AVG` so titles without reviews keep a `NULL` rating.
    async fn list_titles(&self, filter: TitleFilter) -> RepoResult<Vec<Title>> {
        let mut builder: QueryBuilder<sqlx::Postgres> = QueryBuilder::new(TITLE_SELECT);

        if let Some(genre) = filter.genre {
            builder.push(
                " AND EXISTS (SELECT 1 FROM genre_title gt JOIN genres g ON g.id = gt.genre_id \
                 WHERE gt.title_id = t.id AND g.slug = ",
            );
            builder.push_bind(genre);
            builder.push(")");
        }
        if let Some(category) = filter.category {
            builder.push(" AND c.slug = ");
            builder.push_bind(category);
        }
        if let Some(year) = filter.year {
            builder.push(" AND t.year = ");
            builder.push_bind(year);
        }
        if let Some(name) = filter.name {
            builder.push(" AND t.name ILIKE ");
            builder.push_bind(contains_pattern(&name));
        }
        builder.push(" ORDER BY t.id");

        let rows = builder
            .build_query_as::<TitleRow>()
            .fetch_all(&self.pool)
            .await?;
        self.attach_genres(rows).await
    }

    async fn get_title(&self, id: i64) -> RepoResult<Option<Title>> {
        let row = sqlx::query_as::<_, TitleRow>(&format!("{TITLE_SELECT} AND t.id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(self.attach_genres(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// create_title
    ///
    /// Inserts the title and its genre links in one transaction.
    async fn create_title(&self, title: NewTitle) -> RepoResult<Title> {
        let mut tx = self.pool.begin().await?;
        let id: i64 = sqlx::query_scalar(
            r#"INSERT INTO titles (name, year, description, category_id)
               VALUES ($1, $2, $3, $4)
               RETURNING id"#,
        )
        .bind(title.name)
        .bind(title.year)
        .bind(title.description)
        .bind(title.category_id)
        .fetch_one(&mut *tx)
        .await?;
        Self::link_genres(&mut tx, id, &title.genre_ids).await?;
        tx.commit().await?;

        self.get_title(id).await?.ok_or(sqlx::Error::RowNotFound)
    }

    /// update_title
    ///
    /// Partial update; a supplied genre list replaces the existing links.
    async fn update_title(&self, id: i64, changes: TitleChanges) -> RepoResult<Option<Title>> {
        let mut tx = self.pool.begin().await?;
        let updated: Option<i64> = sqlx::query_scalar(
            r#"UPDATE titles
               SET name = COALESCE($2, name),
                   year = COALESCE($3, year),
                   description = CASE WHEN $4 THEN $5 ELSE description END,
                   category_id = COALESCE($6, category_id)
               WHERE id = $1
               RETURNING id"#,
        )
        .bind(id)
        .bind(changes.name)
        .bind(changes.year)
        .bind(changes.description.is_some())
        .bind(changes.description.flatten())
        .bind(changes.category_id)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            return Ok(None);
        }

        if let Some(genre_ids) = changes.genre_ids {
            sqlx::query("DELETE FROM genre_title WHERE title_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            Self::link_genres(&mut tx, id, &genre_ids).await?;
        }
        tx.commit().await?;

        self.get_title(id).await
    }

    async fn delete_title(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM titles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- REVIEWS ---

    async fn list_reviews(&self, title_id: i64) -> RepoResult<Vec<Review>> {
        sqlx::query_as::<_, Review>(&format!(
            "{} WHERE r.title_id = $1 ORDER BY r.pub_date, r.id",
            review_select("reviews")
        ))
        .bind(title_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_review(&self, title_id: i64, review_id: i64) -> RepoResult<Option<Review>> {
        sqlx::query_as::<_, Review>(&format!(
            "{} WHERE r.id = $1 AND r.title_id = $2",
            review_select("reviews")
        ))
        .bind(review_id)
        .bind(title_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn has_review(&self, title_id: i64, author_id: i64) -> RepoResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM reviews WHERE title_id = $1 AND author_id = $2)",
        )
        .bind(title_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await
    }

    /// create_review
    ///
    /// Insert and join in one statement via a CTE. The `(title_id, author_id)`
    /// unique constraint backs the handler's duplicate check.
    async fn create_review(&self, review: NewReview) -> RepoResult<Review> {
        sqlx::query_as::<_, Review>(&format!(
            r#"WITH inserted AS (
                   INSERT INTO reviews (title_id, author_id, text, score)
                   VALUES ($1, $2, $3, $4)
                   RETURNING *
               )
               {}"#,
            review_select("inserted")
        ))
        .bind(review.title_id)
        .bind(review.author_id)
        .bind(review.text)
        .bind(review.score)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_review(&self, id: i64, changes: ReviewChanges) -> RepoResult<Option<Review>> {
        sqlx::query_as::<_, Review>(&format!(
            r#"WITH updated AS (
                   UPDATE reviews
                   SET text = COALESCE($2, text),
                       score = COALESCE($3, score)
                   WHERE id = $1
                   RETURNING *
               )
               {}"#,
            review_select("updated")
        ))
        .bind(id)
        .bind(changes.text)
        .bind(changes.score)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_review(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM reviews WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }

    // --- COMMENTS ---

    async fn list_comments(&self, review_id: i64) -> RepoResult<Vec<Comment>> {
        sqlx::query_as::<_, Comment>(&format!(
            "{} WHERE c.review_id = $1 ORDER BY c.pub_date, c.id",
            comment_select("comments")
        ))
        .bind(review_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn get_comment(&self, review_id: i64, comment_id: i64) -> RepoResult<Option<Comment>> {
        sqlx::query_as::<_, Comment>(&format!(
            "{} WHERE c.id = $1 AND c.review_id = $2",
            comment_select("comments")
        ))
        .bind(comment_id)
        .bind(review_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"WITH inserted AS (
                   INSERT INTO comments (review_id, author_id, text)
                   VALUES ($1, $2, $3)
                   RETURNING *
               )
               {}"#,
            comment_select("inserted")
        ))
        .bind(comment.review_id)
        .bind(comment.author_id)
        .bind(comment.text)
        .fetch_one(&self.pool)
        .await
    }

    async fn update_comment(&self, id: i64, text: String) -> RepoResult<Option<Comment>> {
        sqlx::query_as::<_, Comment>(&format!(
            r#"WITH updated AS (
                   UPDATE comments SET text = $2 WHERE id = $1 RETURNING *
               )
               {}"#,
            comment_select("updated")
        ))
        .bind(id)
        .bind(text)
        .fetch_optional(&self.pool)
        .await
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        let res = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(res.rows_affected() > 0)
    }
}
