use axum::Router;

use crate::AppState;

pub mod auth;
mod error;
mod extract;
mod handlers;
mod routes;
pub mod validation;

pub use auth::AuthUser;
pub use error::AppError;
pub use extract::{AppJson, PostId, Upload};

pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::auth())
        .merge(routes::users())
        .merge(routes::posts(state.upload_max_bytes))
        .merge(routes::activity())
        .merge(routes::explore())
        .merge(routes::search());

    Router::new()
        .merge(routes::health())
        .nest("/api", api)
        .with_state(state)
}
