mod common;

use axum::http::StatusCode;
use common::test_app;
use serde_json::json;
use yamdb_api::models::Role;

const USERS: &str = "/api/v1/users/";
const ME: &str = "/api/v1/users/me/";

#[tokio::test]
async fn user_endpoints_reject_anonymous_callers() {
    let app = test_app();
    for uri in [USERS, ME, "/api/v1/users/someone/"] {
        let (status, body) = app.get(uri, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert!(body.get("detail").is_some());
    }
}

#[tokio::test]
async fn non_admins_cannot_manage_users() {
    let app = test_app();
    let (_, user) = app.login("plain", Role::User).await;
    let (_, moderator) = app.login("mod", Role::Moderator).await;

    for token in [&user, &moderator] {
        let (status, _) = app.get(USERS, Some(token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = app.delete("/api/v1/users/plain/", Some(token)).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn admin_lists_and_searches_users() {
    let app = test_app();
    let (_, admin) = app.login("boss", Role::Admin).await;
    app.seed_user("reader", Role::User).await;
    app.seed_user("proofreader", Role::Moderator).await;

    let (status, body) = app.get(USERS, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (_, body) = app.get("/api/v1/users/?search=READER", Some(&admin)).await;
    let mut names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    names.sort();
    assert_eq!(names, ["proofreader", "reader"]);
}

#[tokio::test]
async fn admin_creates_user_with_role() {
    let app = test_app();
    let (_, admin) = app.login("boss", Role::Admin).await;

    let (status, body) = app
        .post(
            USERS,
            Some(&admin),
            json!({
                "username": "newmod",
                "email": "newmod@example.com",
                "role": "moderator",
                "bio": "Keeps things civil."
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        body,
        json!({
            "username": "newmod",
            "email": "newmod@example.com",
            "first_name": null,
            "last_name": null,
            "bio": "Keeps things civil.",
            "role": "moderator"
        })
    );

    let (status, body) = app
        .post(USERS, Some(&admin), json!({ "username": "plain", "email": "p@example.com" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn admin_create_rejects_duplicates_and_bad_roles() {
    let app = test_app();
    let (_, admin) = app.login("boss", Role::Admin).await;
    app.seed_user("taken", Role::User).await;

    let (status, body) = app
        .post(USERS, Some(&admin), json!({ "username": "taken", "email": "fresh@example.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("username").is_some());

    let (status, body) = app
        .post(USERS, Some(&admin), json!({ "username": "fresh", "email": "taken@example.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("email").is_some());

    let (status, body) = app
        .post(
            USERS,
            Some(&admin),
            json!({ "username": "fresh", "email": "fresh@example.com", "role": "overlord" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("role").is_some());
}

#[tokio::test]
async fn admin_reads_updates_and_deletes_by_username() {
    let app = test_app();
    let (_, admin) = app.login("boss", Role::Admin).await;
    app.seed_user("reader", Role::User).await;

    let (status, body) = app.get("/api/v1/users/reader/", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "reader@example.com");

    let (status, body) = app
        .patch(
            "/api/v1/users/reader/",
            Some(&admin),
            json!({ "role": "moderator", "first_name": "Rea" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "moderator");
    assert_eq!(body["first_name"], "Rea");
    assert_eq!(body["username"], "reader");

    let (status, _) = app.delete("/api/v1/users/reader/", Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get("/api/v1/users/reader/", Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.repo.user_count(), 1);
}

#[tokio::test]
async fn admin_update_checks_uniqueness_against_others() {
    let app = test_app();
    let (_, admin) = app.login("boss", Role::Admin).await;
    app.seed_user("reader", Role::User).await;

    let (status, body) = app
        .patch("/api/v1/users/reader/", Some(&admin), json!({ "username": "boss" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("username").is_some());

    // Re-submitting one's own values is not a conflict.
    let (status, _) = app
        .patch(
            "/api/v1/users/reader/",
            Some(&admin),
            json!({ "username": "reader", "email": "reader@example.com" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn me_returns_own_profile_for_any_role() {
    let app = test_app();
    let (_, token) = app.login("reader", Role::User).await;

    let (status, body) = app.get(ME, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "reader");
    assert_eq!(body["role"], "user");
}

#[tokio::test]
async fn me_patch_cannot_change_role() {
    let app = test_app();
    let (_, token) = app.login("reader", Role::User).await;

    let (status, body) = app
        .patch(ME, Some(&token), json!({ "role": "admin", "bio": "Reads a lot." }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], "user");
    assert_eq!(body["bio"], "Reads a lot.");

    let (_, body) = app.get(USERS, Some(&token)).await;
    assert!(body.get("detail").is_some(), "still not an admin");
}

#[tokio::test]
async fn me_patch_validates_input() {
    let app = test_app();
    let (_, token) = app.login("reader", Role::User).await;
    app.seed_user("other", Role::User).await;

    let (status, body) = app.patch(ME, Some(&token), json!({ "role": "overlord" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("role").is_some());

    let (status, body) = app.patch(ME, Some(&token), json!({ "username": "other" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("username").is_some());

    let (status, body) = app.patch(ME, Some(&token), json!({ "email": "nope" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.get("email").is_some());
}

#[tokio::test]
async fn me_route_is_not_a_username_lookup() {
    let app = test_app();
    let (_, admin) = app.login("boss", Role::Admin).await;

    let (status, body) = app.get(ME, Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "boss");

    let (status, _) = app.delete(ME, Some(&admin)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}
