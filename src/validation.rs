//! Field-level validation of request payloads.
//!
//! Each `validate_*` function turns a raw wire payload into a repository input
//! or a [`ValidationErrors`] map keyed by field name. Checks that need the
//! database (uniqueness, slug resolution) are done by the handlers.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::models::{
    NewTaxonomyEntry, NewUser, ReviewChanges, ReviewPayload, Role, TaxonomyPayload, TitlePayload,
    UserChanges, UserPayload,
};

pub const MAX_NAME_LENGTH: usize = 256;
pub const MAX_SLUG_LENGTH: usize = 50;
pub const MAX_USERNAME_LENGTH: usize = 150;
pub const MAX_EMAIL_LENGTH: usize = 254;
pub const MAX_PERSON_NAME_LENGTH: usize = 150;
pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 10;

/// Username reserved for the self-profile route (`/users/me/`).
pub const RESERVED_USERNAME: &str = "me";

/// Key used for errors that do not belong to a single field.
pub const NON_FIELD_ERRORS: &str = "non_field_errors";

pub const REQUIRED: &str = "This field is required.";

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid regex"));
static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("valid regex"));

/// ValidationErrors
///
/// Messages grouped per field, serialized as `{"field": ["message", ...]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// A map holding a single message for `field`.
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// `Ok(value)` when no error was recorded.
    pub fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let fields: Vec<&str> = self.0.keys().map(String::as_str).collect();
        write!(f, "invalid fields: {}", fields.join(", "))
    }
}

// --- Field Rules ---

fn required<'a>(errors: &mut ValidationErrors, field: &str, value: &'a Option<String>) -> Option<&'a str> {
    match value.as_deref() {
        None => {
            errors.add(field, REQUIRED);
            None
        }
        Some(v) if v.trim().is_empty() => {
            errors.add(field, "This field may not be blank.");
            None
        }
        Some(v) => Some(v),
    }
}

fn check_max_length(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(
            field,
            format!("Ensure this field has no more than {max} characters."),
        );
    }
}

pub fn check_username(errors: &mut ValidationErrors, value: &str) {
    if value.to_lowercase() == RESERVED_USERNAME {
        errors.add("username", format!("Username \"{value}\" is reserved."));
    }
    if !USERNAME_RE.is_match(value) {
        errors.add(
            "username",
            "Username may contain only letters, digits and @/./+/-/_ characters.",
        );
    }
    check_max_length(errors, "username", value, MAX_USERNAME_LENGTH);
}

pub fn check_email(errors: &mut ValidationErrors, value: &str) {
    check_max_length(errors, "email", value, MAX_EMAIL_LENGTH);
    if value.parse::<lettre::Address>().is_err() {
        errors.add("email", "Enter a valid email address.");
    }
}

pub fn check_slug(errors: &mut ValidationErrors, value: &str) {
    check_max_length(errors, "slug", value, MAX_SLUG_LENGTH);
    if !SLUG_RE.is_match(value) {
        errors.add(
            "slug",
            "Slug may contain only latin letters, digits, hyphens and underscores.",
        );
    }
}

pub fn check_name(errors: &mut ValidationErrors, value: &str) {
    check_max_length(errors, "name", value, MAX_NAME_LENGTH);
}

/// Validates a review score and narrows it to the stored width.
pub fn check_score(errors: &mut ValidationErrors, value: i64) -> Option<i16> {
    if !(MIN_SCORE..=MAX_SCORE).contains(&value) {
        errors.add(
            "score",
            format!("Score must be between {MIN_SCORE} and {MAX_SCORE}."),
        );
        return None;
    }
    i16::try_from(value).ok()
}

fn check_role(errors: &mut ValidationErrors, value: &str) -> Option<Role> {
    let role = Role::parse(value);
    if role.is_none() {
        errors.add("role", format!("\"{value}\" is not a valid choice."));
    }
    role
}

// --- Payload Validation ---

/// Validates a signup payload into `(username, email)`.
pub fn validate_signup(
    username: &Option<String>,
    email: &Option<String>,
) -> Result<(String, String), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let username = required(&mut errors, "username", username).map(str::to_string);
    let email = required(&mut errors, "email", email).map(str::to_string);
    if let Some(u) = &username {
        check_username(&mut errors, u);
    }
    if let Some(e) = &email {
        check_email(&mut errors, e);
    }
    match (username, email) {
        (Some(u), Some(e)) => errors.finish((u, e)),
        _ => Err(errors),
    }
}

/// Validates a token exchange payload into `(username, confirmation_code)`.
pub fn validate_token_request(
    username: &Option<String>,
    code: &Option<String>,
) -> Result<(String, String), ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let username = required(&mut errors, "username", username).map(str::to_string);
    let code = required(&mut errors, "confirmation_code", code).map(str::to_string);
    match (username, code) {
        (Some(u), Some(c)) => Ok((u, c)),
        _ => Err(errors),
    }
}

pub fn validate_taxonomy(payload: &TaxonomyPayload) -> Result<NewTaxonomyEntry, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let name = required(&mut errors, "name", &payload.name).map(str::to_string);
    let slug = required(&mut errors, "slug", &payload.slug).map(str::to_string);
    if let Some(n) = &name {
        check_name(&mut errors, n);
    }
    if let Some(s) = &slug {
        check_slug(&mut errors, s);
    }
    match (name, slug) {
        (Some(name), Some(slug)) => errors.finish(NewTaxonomyEntry { name, slug }),
        _ => Err(errors),
    }
}

/// Checks the scalar fields of a title payload. On create every field except
/// `description` is required. Genre and category slugs are resolved by the
/// handler, which appends to the same map.
pub fn check_title(errors: &mut ValidationErrors, payload: &TitlePayload, partial: bool) {
    match &payload.name {
        Some(name) if name.trim().is_empty() => errors.add("name", "This field may not be blank."),
        Some(name) => check_name(errors, name),
        None if !partial => errors.add("name", REQUIRED),
        None => {}
    }
    if !partial {
        if payload.year.is_none() {
            errors.add("year", REQUIRED);
        }
        if payload.genre.is_none() {
            errors.add("genre", REQUIRED);
        }
        if payload.category.is_none() {
            errors.add("category", REQUIRED);
        }
    }
}

/// Validates a review payload. On create both fields are required; on a
/// partial update only the supplied fields are checked.
pub fn validate_review(payload: &ReviewPayload, partial: bool) -> Result<ReviewChanges, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    let text = if partial {
        payload.text.clone()
    } else {
        required(&mut errors, "text", &payload.text).map(str::to_string)
    };
    let score = match payload.score {
        Some(raw) => check_score(&mut errors, raw),
        None => {
            if !partial {
                errors.add("score", REQUIRED);
            }
            None
        }
    };
    errors.finish(ReviewChanges { text, score })
}

pub fn validate_comment_text(text: &Option<String>) -> Result<String, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    match required(&mut errors, "text", text) {
        Some(t) => Ok(t.to_string()),
        None => Err(errors),
    }
}

fn check_person_names(errors: &mut ValidationErrors, payload: &UserPayload) {
    if let Some(first) = &payload.first_name {
        check_max_length(errors, "first_name", first, MAX_PERSON_NAME_LENGTH);
    }
    if let Some(last) = &payload.last_name {
        check_max_length(errors, "last_name", last, MAX_PERSON_NAME_LENGTH);
    }
}

/// Validates an admin-created account. Role defaults to `user`.
pub fn validate_new_user(payload: &UserPayload) -> Result<NewUser, ValidationErrors> {
    let (mut errors, username, email) = match validate_signup(&payload.username, &payload.email) {
        Ok((u, e)) => (ValidationErrors::new(), Some(u), Some(e)),
        Err(errors) => (errors, None, None),
    };
    check_person_names(&mut errors, payload);
    let role = match &payload.role {
        Some(raw) => check_role(&mut errors, raw),
        None => Some(Role::User),
    };
    match (username, email, role) {
        (Some(username), Some(email), Some(role)) => errors.finish(NewUser {
            username,
            email,
            role,
            bio: payload.bio.clone(),
            first_name: payload.first_name.clone(),
            last_name: payload.last_name.clone(),
            is_superuser: false,
        }),
        _ => Err(errors),
    }
}

/// Validates a partial account update. Only supplied fields are checked.
pub fn validate_user_changes(payload: &UserPayload) -> Result<UserChanges, ValidationErrors> {
    let mut errors = ValidationErrors::new();
    if let Some(username) = &payload.username {
        check_username(&mut errors, username);
    }
    if let Some(email) = &payload.email {
        check_email(&mut errors, email);
    }
    check_person_names(&mut errors, payload);
    let role = payload
        .role
        .as_deref()
        .and_then(|raw| check_role(&mut errors, raw));
    errors.finish(UserChanges {
        username: payload.username.clone(),
        email: payload.email.clone(),
        role,
        bio: payload.bio.clone(),
        first_name: payload.first_name.clone(),
        last_name: payload.last_name.clone(),
    })
}
