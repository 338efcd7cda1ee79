use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use utoipa::ToSchema;

// --- Core Application Schemas (Mapped to Database) ---

/// Role
///
/// The RBAC attribute of an account, stored as the `user_role` Postgres enum.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema, sqlx::Type,
)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Moderator,
    Admin,
}

impl Role {
    pub const ALL: [Role; 3] = [Role::User, Role::Moderator, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Moderator => "moderator",
            Role::Admin => "admin",
        }
    }

    /// Parses the wire spelling of a role. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Role> {
        Role::ALL.into_iter().find(|role| role.as_str() == value)
    }
}

/// User
///
/// The account record from the `users` table. Never serialized directly; the
/// wire shape is [`UserProfile`].
#[derive(Debug, Clone, FromRow, Default)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub bio: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    // Superusers pass every admin check regardless of role.
    pub is_superuser: bool,
    // Feeds the confirmation-code hash; bumped when a token is issued.
    pub last_login: Option<DateTime<Utc>>,
    pub date_joined: DateTime<Utc>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin || self.is_superuser
    }
}

/// TaxonomyEntry
///
/// A named, slugged row of either the `categories` or the `genres` table.
/// Both tables share this shape.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct TaxonomyEntry {
    #[serde(skip)]
    pub id: i64,
    pub name: String,
    pub slug: String,
}

pub type Category = TaxonomyEntry;
pub type Genre = TaxonomyEntry;

/// Taxonomy
///
/// Selects which slugged table a taxonomy operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Taxonomy {
    Category,
    Genre,
}

impl Taxonomy {
    pub fn table(&self) -> &'static str {
        match self {
            Taxonomy::Category => "categories",
            Taxonomy::Genre => "genres",
        }
    }
}

/// TitleRow
///
/// Internal row of the title listing query: the title joined with its category
/// and annotated with the average review score. Genres are attached afterwards.
#[derive(Debug, Clone, FromRow, Default)]
pub struct TitleRow {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub category_slug: Option<String>,
    pub rating: Option<f64>,
}

/// Title
///
/// Read representation of a catalog title with nested genres and category.
/// `rating` is the mean of all review scores and `null` when unreviewed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct Title {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub genre: Vec<TaxonomyEntry>,
    pub category: Option<TaxonomyEntry>,
    pub rating: Option<f64>,
}

impl Title {
    /// Assembles the read representation from a listing row and its genres.
    pub fn from_row(row: TitleRow, genre: Vec<Genre>) -> Self {
        let category = match (row.category_id, row.category_name, row.category_slug) {
            (Some(id), Some(name), Some(slug)) => Some(Category { id, name, slug }),
            _ => None,
        };
        Self {
            id: row.id,
            name: row.name,
            year: row.year,
            description: row.description,
            genre,
            category,
            rating: row.rating,
        }
    }
}

/// TitleWritten
///
/// Response of title create/update: relations are echoed back as slugs, the
/// same shape the client submitted.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct TitleWritten {
    pub id: i64,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub genre: Vec<String>,
    pub category: Option<String>,
}

impl From<Title> for TitleWritten {
    fn from(title: Title) -> Self {
        Self {
            id: title.id,
            name: title.name,
            year: title.year,
            description: title.description,
            genre: title.genre.into_iter().map(|g| g.slug).collect(),
            category: title.category.map(|c| c.slug),
        }
    }
}

/// Review
///
/// A scored review joined with its author's username and the title's name.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Review {
    pub id: i64,
    pub text: String,
    // Author username, loaded via JOIN.
    pub author: String,
    #[serde(skip)]
    pub author_id: i64,
    pub score: i16,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
    // Title name, loaded via JOIN.
    pub title: String,
    #[serde(skip)]
    pub title_id: i64,
}

/// Comment
///
/// A comment on a review, joined with its author's username.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default, PartialEq)]
#[ts(export)]
pub struct Comment {
    pub id: i64,
    // Parent review id.
    pub review: i64,
    pub text: String,
    pub author: String,
    #[serde(skip)]
    pub author_id: i64,
    #[ts(type = "string")]
    pub pub_date: DateTime<Utc>,
}

/// UserProfile
///
/// Wire shape of an account for the users and "me" endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct UserProfile {
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Role,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            bio: user.bio,
            role: user.role,
        }
    }
}

// --- Request Payloads (Input Schemas) ---
//
// Every field is optional on the wire so that missing values surface as
// per-field validation messages instead of a body rejection.

/// SignupRequest
///
/// Input payload for `POST /auth/signup/`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct SignupRequest {
    pub username: Option<String>,
    pub email: Option<String>,
}

/// SignupResponse
///
/// Echo of the registered identity.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default, PartialEq)]
#[ts(export)]
pub struct SignupResponse {
    pub email: String,
    pub username: String,
}

/// TokenRequest
///
/// Input payload for `POST /auth/token/`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TokenRequest {
    pub username: Option<String>,
    pub confirmation_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct TokenResponse {
    pub token: String,
}

/// TaxonomyPayload
///
/// Input payload for creating a category or genre.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TaxonomyPayload {
    pub name: Option<String>,
    pub slug: Option<String>,
}

/// TitlePayload
///
/// Create (`POST`) and partial update (`PATCH`) payload for titles. Relations
/// are referenced by slug.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct TitlePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Absent leaves the description alone; `null` clears it.
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    #[schema(value_type = Option<String>)]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub genre: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

/// Reads a present field, `null` included, as `Some`. Paired with
/// `#[serde(default)]` so an absent field stays `None`.
fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// ReviewPayload
///
/// The score is read as a wide integer so out-of-range values reach
/// validation instead of failing deserialization.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct ReviewPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct CommentPayload {
    pub text: Option<String>,
}

/// UserPayload
///
/// Admin create/update and self-update payload for accounts.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Default)]
pub struct UserPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

// --- Repository Inputs (validated) ---

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub role: Role,
    pub bio: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_superuser: bool,
}

/// Partial account update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserChanges {
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Option<Role>,
    pub bio: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTaxonomyEntry {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewTitle {
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub category_id: Option<i64>,
    pub genre_ids: Vec<i64>,
}

/// Partial title update. `genre_ids: Some(..)` replaces the whole genre set;
/// `description: Some(None)` clears the description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TitleChanges {
    pub name: Option<String>,
    pub year: Option<i32>,
    pub description: Option<Option<String>>,
    pub category_id: Option<i64>,
    pub genre_ids: Option<Vec<i64>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewReview {
    pub title_id: i64,
    pub author_id: i64,
    pub text: String,
    pub score: i16,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReviewChanges {
    pub text: Option<String>,
    pub score: Option<i16>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewComment {
    pub review_id: i64,
    pub author_id: i64,
    pub text: String,
}

/// TitleFilter
///
/// Query parameters accepted by the title listing (`GET /titles/`).
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct TitleFilter {
    /// Genre slug.
    pub genre: Option<String>,
    /// Category slug.
    pub category: Option<String>,
    pub year: Option<i32>,
    /// Case-insensitive substring of the title name.
    pub name: Option<String>,
}

/// SearchParams
///
/// `?search=` parameter of the taxonomy and user listings.
#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct SearchParams {
    pub search: Option<String>,
}
