use axum::extract::DefaultBodyLimit;
use axum::handler::Handler;
use axum::{routing::get, routing::post, Router};

use crate::http::handlers;
use crate::AppState;

/// Room for the multipart framing and text fields around the image itself.
const MULTIPART_OVERHEAD_BYTES: usize = 1024 * 1024;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn auth() -> Router<AppState> {
    Router::new()
        .route("/login", get(handlers::login))
        .route("/callback", get(handlers::callback))
        .route("/logout", get(handlers::logout))
        .route("/auth/user", get(handlers::get_current_user))
}

pub fn users() -> Router<AppState> {
    Router::new()
        .route("/users/:id", get(handlers::get_user_profile))
        .route(
            "/users/:id/follow",
            post(handlers::follow_user).delete(handlers::unfollow_user),
        )
        .route("/users/:id/posts", get(handlers::list_user_posts))
        .route("/users/:id/saved", get(handlers::list_saved_posts))
}

pub fn posts(upload_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/posts",
            get(handlers::home_feed).post(handlers::create_post.layer(DefaultBodyLimit::max(
                upload_max_bytes + MULTIPART_OVERHEAD_BYTES,
            ))),
        )
        .route("/posts/:id", get(handlers::get_post))
        .route(
            "/posts/:id/like",
            post(handlers::like_post).delete(handlers::unlike_post),
        )
        .route(
            "/posts/:id/save",
            post(handlers::save_post).delete(handlers::unsave_post),
        )
        .route("/posts/:id/comments", post(handlers::comment_post))
}

pub fn activity() -> Router<AppState> {
    Router::new()
        .route("/notifications", get(handlers::list_notifications))
        .route("/stories", get(handlers::list_stories))
}

pub fn explore() -> Router<AppState> {
    Router::new()
        .route("/explore/trending", get(handlers::trending_posts))
        .route("/explore/hashtags", get(handlers::trending_hashtags))
        .route("/explore/users", get(handlers::suggested_users))
}

pub fn search() -> Router<AppState> {
    Router::new().route("/search", get(handlers::search))
}
