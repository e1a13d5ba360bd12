//! User Tests
//!
//! Covers the current-user endpoint, profiles and a user's post listing.

mod common;

use axum::http::StatusCode;
use common::app;

#[tokio::test]
async fn current_user_returns_session_owner() {
    let app = app().await;
    let user = app.create_user("me").await;

    let resp = app.get("/api/auth/user", Some(&user)).await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["id"], user.id.as_str());
    assert_eq!(body["username"], user.username.as_str());
    assert_eq!(body["firstName"], "Test");
    assert!(body["createdAt"].is_string());
}

#[tokio::test]
async fn current_user_requires_session() {
    let app = app().await;

    let resp = app.get("/api/auth/user", None).await;

    assert_eq!(resp.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn current_user_row_gone_is_not_found() {
    let app = app().await;
    let user = app.create_user("me_gone").await;

    sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(&user.id)
        .execute(app.pool())
        .await
        .unwrap();

    let resp = app.get("/api/auth/user", Some(&user)).await;
    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn profile_counts() {
    let app = app().await;
    let target = app.create_user("profile_target").await;
    let fan = app.create_user("profile_fan").await;
    let idol = app.create_user("profile_idol").await;

    app.create_post_for_user(&target.id, "one").await;
    app.create_post_for_user(&target.id, "two").await;
    app.create_follow_aged(&fan.id, &target.id, 5).await;
    app.create_follow_aged(&target.id, &idol.id, 5).await;

    let resp = app
        .get(&format!("/api/users/{}", target.username), Some(&fan))
        .await;

    assert_eq!(resp.status, StatusCode::OK);
    let body = resp.json();
    assert_eq!(body["id"], target.id.as_str());
    assert_eq!(body["postsCount"], 2);
    assert_eq!(body["followersCount"], 1);
    assert_eq!(body["followingCount"], 1);
    assert_eq!(body["isFollowing"], true);
}

#[tokio::test]
async fn profile_unknown_username() {
    let app = app().await;
    let user = app.create_user("profile_unknown").await;

    let resp = app.get("/api/users/definitely_not_a_user", Some(&user)).await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
    assert_eq!(resp.error_message(), "user not found");
}

#[tokio::test]
async fn user_posts_are_enriched_for_viewer() {
    let app = app().await;
    let author = app.create_user("posts_author").await;
    let viewer = app.create_user("posts_viewer").await;
    let older = app.create_post_aged(&author.id, "older", 20).await;
    let newer = app.create_post_aged(&author.id, "newer", 10).await;

    app.post(&format!("/api/posts/{}/like", older), Some(&viewer)).await;

    let resp = app
        .get(&format!("/api/users/{}/posts", author.username), Some(&viewer))
        .await;
    assert_eq!(resp.status, StatusCode::OK);

    let body = resp.json();
    let posts = body.as_array().unwrap();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0]["id"], newer);
    assert_eq!(posts[0]["isLiked"], false);
    assert_eq!(posts[1]["id"], older);
    assert_eq!(posts[1]["isLiked"], true);
    assert_eq!(posts[1]["likesCount"], 1);
}

#[tokio::test]
async fn user_posts_unknown_username() {
    let app = app().await;
    let user = app.create_user("posts_unknown").await;

    let resp = app.get("/api/users/missing_person/posts", Some(&user)).await;

    assert_eq!(resp.status, StatusCode::NOT_FOUND);
}
