#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use yamdb_api::{
    AppConfig, AppState, MockMailer, create_router,
    auth::issue_access_token,
    config::Env,
    models::{
        Comment, NewComment, NewReview, NewTaxonomyEntry, NewTitle, NewUser, Review,
        ReviewChanges, Role, Taxonomy, TaxonomyEntry, Title, TitleChanges, TitleFilter, User,
        UserChanges,
    },
    repository::{RepoResult, Repository},
};

// --- In-Memory Repository ---

struct StoredTitle {
    id: i64,
    name: String,
    year: i32,
    description: Option<String>,
    category_id: Option<i64>,
    genre_ids: Vec<i64>,
}

struct StoredReview {
    id: i64,
    title_id: i64,
    author_id: i64,
    text: String,
    score: i16,
    pub_date: DateTime<Utc>,
}

struct StoredComment {
    id: i64,
    review_id: i64,
    author_id: i64,
    text: String,
    pub_date: DateTime<Utc>,
}

#[derive(Default)]
struct Store {
    last_id: i64,
    users: Vec<User>,
    categories: Vec<TaxonomyEntry>,
    genres: Vec<TaxonomyEntry>,
    titles: Vec<StoredTitle>,
    reviews: Vec<StoredReview>,
    comments: Vec<StoredComment>,
}

impl Store {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn taxonomy(&self, kind: Taxonomy) -> &Vec<TaxonomyEntry> {
        match kind {
            Taxonomy::Category => &self.categories,
            Taxonomy::Genre => &self.genres,
        }
    }

    fn taxonomy_mut(&mut self, kind: Taxonomy) -> &mut Vec<TaxonomyEntry> {
        match kind {
            Taxonomy::Category => &mut self.categories,
            Taxonomy::Genre => &mut self.genres,
        }
    }

    fn username(&self, id: i64) -> String {
        self.users
            .iter()
            .find(|u| u.id == id)
            .map(|u| u.username.clone())
            .unwrap_or_default()
    }

    fn title(&self, stored: &StoredTitle) -> Title {
        let scores: Vec<f64> = self
            .reviews
            .iter()
            .filter(|r| r.title_id == stored.id)
            .map(|r| f64::from(r.score))
            .collect();
        let rating = if scores.is_empty() {
            None
        } else {
            Some(scores.iter().sum::<f64>() / scores.len() as f64)
        };
        let mut genre: Vec<TaxonomyEntry> = self
            .genres
            .iter()
            .filter(|g| stored.genre_ids.contains(&g.id))
            .cloned()
            .collect();
        genre.sort_by_key(|g| g.id);
        Title {
            id: stored.id,
            name: stored.name.clone(),
            year: stored.year,
            description: stored.description.clone(),
            genre,
            category: stored
                .category_id
                .and_then(|id| self.categories.iter().find(|c| c.id == id).cloned()),
            rating,
        }
    }

    fn review(&self, stored: &StoredReview) -> Review {
        Review {
            id: stored.id,
            text: stored.text.clone(),
            author: self.username(stored.author_id),
            author_id: stored.author_id,
            score: stored.score,
            pub_date: stored.pub_date,
            title: self
                .titles
                .iter()
                .find(|t| t.id == stored.title_id)
                .map(|t| t.name.clone())
                .unwrap_or_default(),
            title_id: stored.title_id,
        }
    }

    fn comment(&self, stored: &StoredComment) -> Comment {
        Comment {
            id: stored.id,
            review: stored.review_id,
            text: stored.text.clone(),
            author: self.username(stored.author_id),
            author_id: stored.author_id,
            pub_date: stored.pub_date,
        }
    }

    fn drop_reviews(&mut self, keep: impl Fn(&StoredReview) -> bool) {
        let removed: Vec<i64> = self
            .reviews
            .iter()
            .filter(|r| !keep(r))
            .map(|r| r.id)
            .collect();
        self.reviews.retain(|r| keep(r));
        self.comments.retain(|c| !removed.contains(&c.review_id));
    }
}

/// MemoryRepository
///
/// `Repository` backed by vectors behind a mutex. Mirrors the cascade and
/// aggregation rules of the Postgres schema closely enough for handler tests.
#[derive(Default)]
pub struct MemoryRepository {
    store: Mutex<Store>,
}

impl MemoryRepository {
    fn store(&self) -> std::sync::MutexGuard<'_, Store> {
        self.store.lock().expect("memory store poisoned")
    }

    pub fn user_count(&self) -> usize {
        self.store().users.len()
    }
}

fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn get_user(&self, id: i64) -> RepoResult<Option<User>> {
        Ok(self.store().users.iter().find(|u| u.id == id).cloned())
    }

    async fn get_user_by_username(&self, username: &str) -> RepoResult<Option<User>> {
        Ok(self
            .store()
            .users
            .iter()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self.store().users.iter().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self, search: Option<String>) -> RepoResult<Vec<User>> {
        Ok(self
            .store()
            .users
            .iter()
            .filter(|u| search.as_deref().is_none_or(|s| contains_ci(&u.username, s)))
            .cloned()
            .collect())
    }

    async fn create_user(&self, user: NewUser) -> RepoResult<User> {
        let mut store = self.store();
        let created = User {
            id: store.next_id(),
            username: user.username,
            email: user.email,
            role: user.role,
            bio: user.bio,
            first_name: user.first_name,
            last_name: user.last_name,
            is_superuser: user.is_superuser,
            last_login: None,
            date_joined: Utc::now(),
        };
        store.users.push(created.clone());
        Ok(created)
    }

    async fn update_user(&self, id: i64, changes: UserChanges) -> RepoResult<Option<User>> {
        let mut store = self.store();
        let Some(user) = store.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        if let Some(v) = changes.username {
            user.username = v;
        }
        if let Some(v) = changes.email {
            user.email = v;
        }
        if let Some(v) = changes.role {
            user.role = v;
        }
        if changes.bio.is_some() {
            user.bio = changes.bio;
        }
        if changes.first_name.is_some() {
            user.first_name = changes.first_name;
        }
        if changes.last_name.is_some() {
            user.last_name = changes.last_name;
        }
        Ok(Some(user.clone()))
    }

    async fn delete_user(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store();
        let before = store.users.len();
        store.users.retain(|u| u.id != id);
        store.drop_reviews(|r| r.author_id != id);
        store.comments.retain(|c| c.author_id != id);
        Ok(store.users.len() < before)
    }

    async fn record_login(&self, id: i64, at: DateTime<Utc>) -> RepoResult<()> {
        if let Some(user) = self.store().users.iter_mut().find(|u| u.id == id) {
            user.last_login = Some(at);
        }
        Ok(())
    }

    async fn list_taxonomy(
        &self,
        kind: Taxonomy,
        search: Option<String>,
    ) -> RepoResult<Vec<TaxonomyEntry>> {
        Ok(self
            .store()
            .taxonomy(kind)
            .iter()
            .filter(|e| search.as_deref().is_none_or(|s| contains_ci(&e.name, s)))
            .cloned()
            .collect())
    }

    async fn get_taxonomy_entry(
        &self,
        kind: Taxonomy,
        slug: &str,
    ) -> RepoResult<Option<TaxonomyEntry>> {
        Ok(self
            .store()
            .taxonomy(kind)
            .iter()
            .find(|e| e.slug == slug)
            .cloned())
    }

    async fn create_taxonomy_entry(
        &self,
        kind: Taxonomy,
        entry: NewTaxonomyEntry,
    ) -> RepoResult<TaxonomyEntry> {
        let mut store = self.store();
        let created = TaxonomyEntry {
            id: store.next_id(),
            name: entry.name,
            slug: entry.slug,
        };
        store.taxonomy_mut(kind).push(created.clone());
        Ok(created)
    }

    async fn delete_taxonomy_entry(&self, kind: Taxonomy, slug: &str) -> RepoResult<bool> {
        let mut store = self.store();
        let Some(id) = store
            .taxonomy(kind)
            .iter()
            .find(|e| e.slug == slug)
            .map(|e| e.id)
        else {
            return Ok(false);
        };
        store.taxonomy_mut(kind).retain(|e| e.id != id);
        for title in store.titles.iter_mut() {
            match kind {
                Taxonomy::Category if title.category_id == Some(id) => title.category_id = None,
                Taxonomy::Genre => title.genre_ids.retain(|g| *g != id),
                _ => {}
            }
        }
        Ok(true)
    }

    async fn list_titles(&self, filter: TitleFilter) -> RepoResult<Vec<Title>> {
        let store = self.store();
        Ok(store
            .titles
            .iter()
            .map(|t| store.title(t))
            .filter(|t| {
                filter
                    .genre
                    .as_deref()
                    .is_none_or(|slug| t.genre.iter().any(|g| g.slug == slug))
            })
            .filter(|t| {
                filter
                    .category
                    .as_deref()
                    .is_none_or(|slug| t.category.as_ref().is_some_and(|c| c.slug == slug))
            })
            .filter(|t| filter.year.is_none_or(|year| t.year == year))
            .filter(|t| {
                filter
                    .name
                    .as_deref()
                    .is_none_or(|name| contains_ci(&t.name, name))
            })
            .collect())
    }

    async fn get_title(&self, id: i64) -> RepoResult<Option<Title>> {
        let store = self.store();
        Ok(store
            .titles
            .iter()
            .find(|t| t.id == id)
            .map(|t| store.title(t)))
    }

    async fn create_title(&self, title: NewTitle) -> RepoResult<Title> {
        let mut store = self.store();
        let stored = StoredTitle {
            id: store.next_id(),
            name: title.name,
            year: title.year,
            description: title.description,
            category_id: title.category_id,
            genre_ids: title.genre_ids,
        };
        let created = store.title(&stored);
        store.titles.push(stored);
        Ok(created)
    }

    async fn update_title(&self, id: i64, changes: TitleChanges) -> RepoResult<Option<Title>> {
        let mut store = self.store();
        let Some(index) = store.titles.iter().position(|t| t.id == id) else {
            return Ok(None);
        };
        let stored = &mut store.titles[index];
        if let Some(v) = changes.name {
            stored.name = v;
        }
        if let Some(v) = changes.year {
            stored.year = v;
        }
        if let Some(v) = changes.description {
            stored.description = v;
        }
        if changes.category_id.is_some() {
            stored.category_id = changes.category_id;
        }
        if let Some(v) = changes.genre_ids {
            stored.genre_ids = v;
        }
        Ok(Some(store.title(&store.titles[index])))
    }

    async fn delete_title(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store();
        let before = store.titles.len();
        store.titles.retain(|t| t.id != id);
        store.drop_reviews(|r| r.title_id != id);
        Ok(store.titles.len() < before)
    }

    async fn list_reviews(&self, title_id: i64) -> RepoResult<Vec<Review>> {
        let store = self.store();
        Ok(store
            .reviews
            .iter()
            .filter(|r| r.title_id == title_id)
            .map(|r| store.review(r))
            .collect())
    }

    async fn get_review(&self, title_id: i64, review_id: i64) -> RepoResult<Option<Review>> {
        let store = self.store();
        Ok(store
            .reviews
            .iter()
            .find(|r| r.id == review_id && r.title_id == title_id)
            .map(|r| store.review(r)))
    }

    async fn has_review(&self, title_id: i64, author_id: i64) -> RepoResult<bool> {
        Ok(self
            .store()
            .reviews
            .iter()
            .any(|r| r.title_id == title_id && r.author_id == author_id))
    }

    async fn create_review(&self, review: NewReview) -> RepoResult<Review> {
        let mut store = self.store();
        let stored = StoredReview {
            id: store.next_id(),
            title_id: review.title_id,
            author_id: review.author_id,
            text: review.text,
            score: review.score,
            pub_date: Utc::now(),
        };
        let created = store.review(&stored);
        store.reviews.push(stored);
        Ok(created)
    }

    async fn update_review(&self, id: i64, changes: ReviewChanges) -> RepoResult<Option<Review>> {
        let mut store = self.store();
        let Some(index) = store.reviews.iter().position(|r| r.id == id) else {
            return Ok(None);
        };
        let stored = &mut store.reviews[index];
        if let Some(v) = changes.text {
            stored.text = v;
        }
        if let Some(v) = changes.score {
            stored.score = v;
        }
        Ok(Some(store.review(&store.reviews[index])))
    }

    async fn delete_review(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store();
        let before = store.reviews.len();
        store.drop_reviews(|r| r.id != id);
        Ok(store.reviews.len() < before)
    }

    async fn list_comments(&self, review_id: i64) -> RepoResult<Vec<Comment>> {
        let store = self.store();
        Ok(store
            .comments
            .iter()
            .filter(|c| c.review_id == review_id)
            .map(|c| store.comment(c))
            .collect())
    }

    async fn get_comment(&self, review_id: i64, comment_id: i64) -> RepoResult<Option<Comment>> {
        let store = self.store();
        Ok(store
            .comments
            .iter()
            .find(|c| c.id == comment_id && c.review_id == review_id)
            .map(|c| store.comment(c)))
    }

    async fn create_comment(&self, comment: NewComment) -> RepoResult<Comment> {
        let mut store = self.store();
        let stored = StoredComment {
            id: store.next_id(),
            review_id: comment.review_id,
            author_id: comment.author_id,
            text: comment.text,
            pub_date: Utc::now(),
        };
        let created = store.comment(&stored);
        store.comments.push(stored);
        Ok(created)
    }

    async fn update_comment(&self, id: i64, text: String) -> RepoResult<Option<Comment>> {
        let mut store = self.store();
        let Some(index) = store.comments.iter().position(|c| c.id == id) else {
            return Ok(None);
        };
        store.comments[index].text = text;
        Ok(Some(store.comment(&store.comments[index])))
    }

    async fn delete_comment(&self, id: i64) -> RepoResult<bool> {
        let mut store = self.store();
        let before = store.comments.len();
        store.comments.retain(|c| c.id != id);
        Ok(store.comments.len() < before)
    }
}

// --- Test Application ---

/// TestApp
///
/// The full router over an in-memory repository and a recording mailer.
/// Runs in `Env::Production` so only real bearer tokens authenticate.
pub struct TestApp {
    pub router: Router,
    pub repo: Arc<MemoryRepository>,
    pub mailer: Arc<MockMailer>,
    pub config: AppConfig,
}

pub fn test_config() -> AppConfig {
    AppConfig {
        env: Env::Production,
        ..AppConfig::default()
    }
}

pub fn test_app() -> TestApp {
    let repo = Arc::new(MemoryRepository::default());
    let mailer = Arc::new(MockMailer::new());
    let config = test_config();
    let state = AppState {
        repo: repo.clone(),
        mailer: mailer.clone(),
        config: config.clone(),
    };
    TestApp {
        router: create_router(state),
        repo,
        mailer,
        config,
    }
}

impl TestApp {
    /// Inserts an account directly, bypassing signup.
    pub async fn seed_user(&self, username: &str, role: Role) -> User {
        self.repo
            .create_user(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                role,
                ..NewUser::default()
            })
            .await
            .unwrap()
    }

    /// Seeds an account and returns it with a valid bearer token.
    pub async fn login(&self, username: &str, role: Role) -> (User, String) {
        let user = self.seed_user(username, role).await;
        let token = issue_access_token(&user, &self.config).unwrap();
        (user, token)
    }

    /// Sends one request through the router. The body is decoded as JSON when
    /// possible, as a JSON string otherwise, and `Null` when empty.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Extracts the confirmation code from the last mail sent to `email`.
    pub fn last_code(&self, email: &str) -> String {
        let mail = self.mailer.last_to(email).expect("no mail sent");
        mail.body
            .strip_prefix("Confirmation code: ")
            .expect("unexpected mail body")
            .to_string()
    }

    /// Creates a category and a genre, then a title in both. Returns the title id.
    pub async fn seed_title(&self, admin_token: &str, name: &str) -> i64 {
        self.post(
            "/api/v1/categories/",
            Some(admin_token),
            serde_json::json!({ "name": "Films", "slug": "films" }),
        )
        .await;
        self.post(
            "/api/v1/genres/",
            Some(admin_token),
            serde_json::json!({ "name": "Drama", "slug": "drama" }),
        )
        .await;
        let (status, body) = self
            .post(
                "/api/v1/titles/",
                Some(admin_token),
                serde_json::json!({
                    "name": name,
                    "year": 1972,
                    "genre": ["drama"],
                    "category": "films"
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }
}
