use axum::{
    extract::{multipart::MultipartError, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect},
    Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::app::auth::SessionService;
use crate::app::engagement::EngagementService;
use crate::app::explore::ExploreService;
use crate::app::feed::FeedService;
use crate::app::notifications::NotificationService;
use crate::app::posts::PostService;
use crate::app::search::{SearchResults, SearchService};
use crate::app::social::SocialService;
use crate::app::stories::StoryService;
use crate::app::users::UserService;
use crate::domain::engagement::{CommentView, Like, Save};
use crate::domain::hashtag::HashtagTrending;
use crate::domain::notification::Notification;
use crate::domain::post::{NewPost, PostView};
use crate::domain::social_graph::Follow;
use crate::domain::story::Story;
use crate::domain::user::{User, UserProfile, UserSummary};
use crate::http::auth::{session_clear_cookie, session_cookie, session_set_cookie};
use crate::http::validation::{CAPTION, COMMENT_CONTENT, LOCATION};
use crate::http::{AppError, AppJson, AuthUser, PostId, Upload};
use crate::infra::db::is_foreign_key_violation;
use crate::AppState;

const DEFAULT_IMAGE_MIME: &str = "application/octet-stream";

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.db.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

pub async fn login(State(state): State<AppState>) -> Result<Redirect, AppError> {
    let url = state
        .identity_login_url
        .as_deref()
        .ok_or_else(|| AppError::not_implemented("login provider not configured"))?;

    Ok(Redirect::to(url))
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    pub token: Option<String>,
}

pub async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<impl IntoResponse, AppError> {
    let token = query.token.ok_or_else(AppError::unauthorized)?;

    let service = SessionService::new(
        state.db.clone(),
        state.identity_key,
        state.session_ttl_hours,
    );
    let (user, session) = service
        .login_with_identity_token(&token)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, "failed to complete login");
            AppError::internal("failed to complete login")
        })?
        .ok_or_else(AppError::unauthorized)?;

    tracing::info!(user_id = %user.id, "user logged in");

    let cookie = session_set_cookie(
        &session.sid,
        state.session_ttl_hours * 60 * 60,
        state.session_cookie_secure,
    );
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    if let Some(sid) = session_cookie(&headers) {
        let service = SessionService::new(
            state.db.clone(),
            state.identity_key,
            state.session_ttl_hours,
        );
        service.destroy(&sid).await.map_err(|err| {
            tracing::error!(error = ?err, "failed to destroy session");
            AppError::internal("failed to logout")
        })?;
    }

    let cookie = session_clear_cookie(state.session_cookie_secure);
    Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/")))
}

pub async fn get_current_user(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<User>, AppError> {
    let service = UserService::new(state.db.clone());
    let user = service
        .get_user(&auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch current user");
            AppError::internal("failed to fetch user")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    Ok(Json(user))
}

pub async fn get_user_profile(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<UserProfile>, AppError> {
    let service = UserService::new(state.db.clone());
    let profile = service
        .get_profile(&username, &auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username = %username, "failed to fetch profile");
            AppError::internal("failed to fetch user")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))?;

    Ok(Json(profile))
}

pub async fn follow_user(
    Path(id): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Follow>, AppError> {
    let service = SocialService::new(state.db.clone());
    let follow = service.follow(&auth.user_id, &id).await.map_err(|err| {
        if is_foreign_key_violation(&err) {
            return AppError::not_found("user not found");
        }
        tracing::error!(error = ?err, follower_id = %auth.user_id, following_id = %id, "failed to follow user");
        AppError::internal("failed to follow user")
    })?;

    Ok(Json(follow))
}

pub async fn unfollow_user(
    Path(id): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse>, AppError> {
    let service = SocialService::new(state.db.clone());
    service.unfollow(&auth.user_id, &id).await.map_err(|err| {
        tracing::error!(error = ?err, follower_id = %auth.user_id, following_id = %id, "failed to unfollow user");
        AppError::internal("failed to unfollow user")
    })?;

    Ok(SuccessResponse::ok())
}

pub async fn list_user_posts(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let owner = find_user_by_username(&state, &username).await?;

    let service = PostService::new(state.db.clone());
    let posts = service
        .list_by_user(&owner.id, &auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, owner_id = %owner.id, "failed to list user posts");
            AppError::internal("failed to list posts")
        })?;

    Ok(Json(posts))
}

pub async fn list_saved_posts(
    Path(username): Path<String>,
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let owner = find_user_by_username(&state, &username).await?;
    if owner.id != auth.user_id {
        return Err(AppError::forbidden("You can only view your own saved posts"));
    }

    let service = PostService::new(state.db.clone());
    let posts = service.list_saved(&owner.id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %owner.id, "failed to list saved posts");
        AppError::internal("failed to list saved posts")
    })?;

    Ok(Json(posts))
}

async fn find_user_by_username(state: &AppState, username: &str) -> Result<User, AppError> {
    UserService::new(state.db.clone())
        .get_by_username(username)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, username = %username, "failed to fetch user");
            AppError::internal("failed to fetch user")
        })?
        .ok_or_else(|| AppError::not_found("user not found"))
}

pub async fn home_feed(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let service = FeedService::new(state.db.clone());
    let posts = service.home_feed(&auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to fetch home feed");
        AppError::internal("failed to fetch feed")
    })?;

    Ok(Json(posts))
}

pub async fn create_post(
    auth: AuthUser,
    State(state): State<AppState>,
    Upload(mut multipart): Upload,
) -> Result<(StatusCode, Json<PostView>), AppError> {
    let too_large = || {
        AppError::bad_request(format!(
            "image must be at most {}MB",
            state.upload_max_bytes / (1024 * 1024)
        ))
    };
    let multipart_error = |err: MultipartError| {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            too_large()
        } else {
            AppError::bad_request(format!("invalid upload: {}", err.body_text()))
        }
    };

    let mut image: Option<(String, Vec<u8>)> = None;
    let mut caption: Option<String> = None;
    let mut location: Option<String> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("image") => {
                let mime = field
                    .content_type()
                    .unwrap_or(DEFAULT_IMAGE_MIME)
                    .to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                image = Some((mime, bytes.to_vec()));
            }
            Some("caption") => caption = Some(field.text().await.map_err(multipart_error)?),
            Some("location") => location = Some(field.text().await.map_err(multipart_error)?),
            _ => {}
        }
    }

    let (mime, bytes) = image
        .filter(|(_, bytes)| !bytes.is_empty())
        .ok_or_else(|| AppError::bad_request("image is required"))?;
    if bytes.len() > state.upload_max_bytes {
        return Err(too_large());
    }

    let caption = caption.unwrap_or_default();
    CAPTION.check(&caption)?;
    let location = LOCATION.check_optional(location)?;

    let service = PostService::new(state.db.clone());
    let post = service
        .create_post(NewPost {
            user_id: auth.user_id.clone(),
            caption,
            image_url: image_data_uri(&mime, &bytes),
            location,
        })
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, user_id = %auth.user_id, "failed to create post");
            AppError::internal("failed to create post")
        })?;

    Ok((StatusCode::CREATED, Json(post)))
}

fn image_data_uri(mime: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(bytes)
    )
}

pub async fn get_post(
    auth: AuthUser,
    PostId(id): PostId,
    State(state): State<AppState>,
) -> Result<Json<PostView>, AppError> {
    let service = PostService::new(state.db.clone());
    let post = service
        .get_post(id, &auth.user_id)
        .await
        .map_err(|err| {
            tracing::error!(error = ?err, post_id = %id, "failed to fetch post");
            AppError::internal("failed to fetch post")
        })?
        .ok_or_else(|| AppError::not_found("post not found"))?;

    Ok(Json(post))
}

pub async fn like_post(
    auth: AuthUser,
    PostId(id): PostId,
    State(state): State<AppState>,
) -> Result<Json<Like>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let like = service.like_post(&auth.user_id, id).await.map_err(|err| {
        if is_foreign_key_violation(&err) {
            return AppError::not_found("post not found");
        }
        tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to like post");
        AppError::internal("failed to like post")
    })?;

    Ok(Json(like))
}

pub async fn unlike_post(
    auth: AuthUser,
    PostId(id): PostId,
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    service.unlike_post(&auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to unlike post");
        AppError::internal("failed to unlike post")
    })?;

    Ok(SuccessResponse::ok())
}

pub async fn save_post(
    auth: AuthUser,
    PostId(id): PostId,
    State(state): State<AppState>,
) -> Result<Json<Save>, AppError> {
    let service = EngagementService::new(state.db.clone());
    let save = service.save_post(&auth.user_id, id).await.map_err(|err| {
        if is_foreign_key_violation(&err) {
            return AppError::not_found("post not found");
        }
        tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to save post");
        AppError::internal("failed to save post")
    })?;

    Ok(Json(save))
}

pub async fn unsave_post(
    auth: AuthUser,
    PostId(id): PostId,
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse>, AppError> {
    let service = EngagementService::new(state.db.clone());
    service.unsave_post(&auth.user_id, id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to unsave post");
        AppError::internal("failed to unsave post")
    })?;

    Ok(SuccessResponse::ok())
}

#[derive(Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: String,
}

pub async fn comment_post(
    auth: AuthUser,
    PostId(id): PostId,
    State(state): State<AppState>,
    AppJson(payload): AppJson<CommentRequest>,
) -> Result<(StatusCode, Json<CommentView>), AppError> {
    COMMENT_CONTENT.check(&payload.content)?;

    let service = EngagementService::new(state.db.clone());
    let comment = service
        .comment_post(&auth.user_id, id, &payload.content)
        .await
        .map_err(|err| {
            if is_foreign_key_violation(&err) {
                return AppError::not_found("post not found");
            }
            tracing::error!(error = ?err, user_id = %auth.user_id, post_id = %id, "failed to comment on post");
            AppError::internal("failed to create comment")
        })?;

    Ok((StatusCode::CREATED, Json(comment)))
}

pub async fn list_notifications(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Notification>>, AppError> {
    let service = NotificationService::new(state.db.clone());
    let notifications = service.list(&auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list notifications");
        AppError::internal("failed to list notifications")
    })?;

    Ok(Json(notifications))
}

pub async fn list_stories(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Story>>, AppError> {
    let service = StoryService::new(state.db.clone());
    let stories = service.list(&auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list stories");
        AppError::internal("failed to list stories")
    })?;

    Ok(Json(stories))
}

pub async fn trending_posts(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<PostView>>, AppError> {
    let service = PostService::new(state.db.clone());
    let posts = service.list_trending(&auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list trending posts");
        AppError::internal("failed to list trending posts")
    })?;

    Ok(Json(posts))
}

pub async fn trending_hashtags(
    _auth: AuthUser,
    State(state): State<AppState>,
) -> Json<Vec<HashtagTrending>> {
    Json(ExploreService::new(state.db.clone()).trending_hashtags())
}

pub async fn suggested_users(
    auth: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<UserSummary>>, AppError> {
    let service = ExploreService::new(state.db.clone());
    let users = service.suggested_users(&auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to list suggested users");
        AppError::internal("failed to list suggested users")
    })?;

    Ok(Json(users))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

pub async fn search(
    auth: AuthUser,
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<SearchResults>, AppError> {
    let service = SearchService::new(state.db.clone());
    let results = service.search(&query.q, &auth.user_id).await.map_err(|err| {
        tracing::error!(error = ?err, user_id = %auth.user_id, "failed to search");
        AppError::internal("failed to search")
    })?;

    Ok(Json(results))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_embeds_mime_and_payload() {
        assert_eq!(image_data_uri("image/png", b"abc"), "data:image/png;base64,YWJj");
        assert_eq!(
            image_data_uri(DEFAULT_IMAGE_MIME, &[]),
            "data:application/octet-stream;base64,"
        );
    }
}
