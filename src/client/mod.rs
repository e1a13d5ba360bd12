//! Typed HTTP client for the `/api` surface with a path-keyed response cache.
//!
//! Reads are served from the cache while younger than their staleness
//! window; mutations drop the keys their result can affect so the next read
//! goes to the server.

use anyhow::{Context, Result};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::domain::engagement::{CommentView, Like, Save};
use crate::domain::notification::Notification;
use crate::domain::post::PostView;
use crate::domain::social_graph::Follow;
use crate::domain::story::Story;
use crate::domain::user::{User, UserProfile, UserSummary};

pub mod cache;

pub use cache::{QueryCache, QueryKey};

const FEED_STALE: Duration = Duration::from_secs(30);
const POST_STALE: Duration = Duration::from_secs(30);
const STORIES_STALE: Duration = Duration::from_secs(60);
const PROFILE_STALE: Duration = Duration::from_secs(60);
const USER_POSTS_STALE: Duration = Duration::from_secs(30);
const EXPLORE_STALE: Duration = Duration::from_secs(60);
const SEARCH_STALE: Duration = Duration::from_secs(30);
/// Always refetched.
const NO_STALE: Duration = Duration::ZERO;

const POSTS: &str = "/api/posts";
const USERS: &str = "/api/users";
const NOTIFICATIONS: &str = "/api/notifications";
const STORIES: &str = "/api/stories";
const CURRENT_USER: &str = "/api/auth/user";
const EXPLORE_TRENDING: &str = "/api/explore/trending";
const EXPLORE_HASHTAGS: &str = "/api/explore/hashtags";
const EXPLORE_USERS: &str = "/api/explore/users";
const SEARCH: &str = "/api/search";

/// A non-2xx response from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hashtag {
    pub id: String,
    pub name: String,
    pub posts_count: u32,
    pub preview_images: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    pub users: Vec<UserSummary>,
    pub posts: Vec<PostView>,
    pub hashtags: Vec<Hashtag>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Success {
    pub success: bool,
}

/// Image attached to a new post.
#[derive(Debug, Clone)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

#[derive(Serialize)]
struct CommentBody<'a> {
    content: &'a str,
}

#[derive(Clone)]
pub struct ApiClient {
    base_url: Url,
    http: reqwest::Client,
    cache: QueryCache,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).context("invalid API base URL")?;
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            base_url,
            http,
            cache: QueryCache::new(),
        })
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub async fn current_user(&self) -> Result<User> {
        self.query(QueryKey::new([CURRENT_USER]), CURRENT_USER, &[], NO_STALE)
            .await
    }

    pub async fn feed(&self) -> Result<Vec<PostView>> {
        self.query(QueryKey::new([POSTS]), POSTS, &[], FEED_STALE).await
    }

    pub async fn post(&self, post_id: i32) -> Result<PostView> {
        let id = post_id.to_string();
        let path = format!("{}/{}", POSTS, id);
        self.query(QueryKey::new([POSTS, id.as_str()]), &path, &[], POST_STALE)
            .await
    }

    pub async fn stories(&self) -> Result<Vec<Story>> {
        self.query(QueryKey::new([STORIES]), STORIES, &[], STORIES_STALE)
            .await
    }

    pub async fn notifications(&self) -> Result<Vec<Notification>> {
        self.query(QueryKey::new([NOTIFICATIONS]), NOTIFICATIONS, &[], NO_STALE)
            .await
    }

    pub async fn profile(&self, username: &str) -> Result<UserProfile> {
        let path = format!("{}/{}", USERS, username);
        self.query(QueryKey::new([USERS, username]), &path, &[], PROFILE_STALE)
            .await
    }

    pub async fn user_posts(&self, username: &str) -> Result<Vec<PostView>> {
        let path = format!("{}/{}/posts", USERS, username);
        let key = QueryKey::new([USERS, username, "posts"]);
        self.query(key, &path, &[], USER_POSTS_STALE).await
    }

    pub async fn saved_posts(&self, username: &str) -> Result<Vec<PostView>> {
        let path = format!("{}/{}/saved", USERS, username);
        let key = QueryKey::new([USERS, username, "saved"]);
        self.query(key, &path, &[], USER_POSTS_STALE).await
    }

    pub async fn trending_posts(&self) -> Result<Vec<PostView>> {
        let key = QueryKey::new([EXPLORE_TRENDING]);
        self.query(key, EXPLORE_TRENDING, &[], EXPLORE_STALE).await
    }

    pub async fn trending_hashtags(&self) -> Result<Vec<Hashtag>> {
        let key = QueryKey::new([EXPLORE_HASHTAGS]);
        self.query(key, EXPLORE_HASHTAGS, &[], EXPLORE_STALE).await
    }

    pub async fn suggested_users(&self) -> Result<Vec<UserSummary>> {
        let key = QueryKey::new([EXPLORE_USERS]);
        self.query(key, EXPLORE_USERS, &[], EXPLORE_STALE).await
    }

    pub async fn search(&self, query: &str) -> Result<SearchResponse> {
        let key = QueryKey::new([SEARCH, query]);
        self.query(key, SEARCH, &[("q", query)], SEARCH_STALE).await
    }

    pub async fn create_post(
        &self,
        image: ImageUpload,
        caption: &str,
        location: Option<&str>,
    ) -> Result<PostView> {
        let part = reqwest::multipart::Part::bytes(image.bytes)
            .file_name(image.file_name)
            .mime_str(&image.mime)
            .context("invalid image mime type")?;
        let mut form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("caption", caption.to_string());
        if let Some(location) = location {
            form = form.text("location", location.to_string());
        }

        let request = self.request(Method::POST, POSTS, &[])?.multipart(form);
        let post = send(request).await?;
        self.invalidate_posts();
        Ok(post)
    }

    pub async fn like_post(&self, post_id: i32) -> Result<Like> {
        let path = format!("{}/{}/like", POSTS, post_id);
        let like = send(self.request(Method::POST, &path, &[])?).await?;
        self.invalidate_posts();
        Ok(like)
    }

    pub async fn unlike_post(&self, post_id: i32) -> Result<Success> {
        let path = format!("{}/{}/like", POSTS, post_id);
        let result = send(self.request(Method::DELETE, &path, &[])?).await?;
        self.invalidate_posts();
        Ok(result)
    }

    pub async fn save_post(&self, post_id: i32) -> Result<Save> {
        let path = format!("{}/{}/save", POSTS, post_id);
        let save = send(self.request(Method::POST, &path, &[])?).await?;
        self.invalidate_posts();
        Ok(save)
    }

    pub async fn unsave_post(&self, post_id: i32) -> Result<Success> {
        let path = format!("{}/{}/save", POSTS, post_id);
        let result = send(self.request(Method::DELETE, &path, &[])?).await?;
        self.invalidate_posts();
        Ok(result)
    }

    pub async fn comment_post(&self, post_id: i32, content: &str) -> Result<CommentView> {
        let path = format!("{}/{}/comments", POSTS, post_id);
        let request = self
            .request(Method::POST, &path, &[])?
            .json(&CommentBody { content });
        let comment = send(request).await?;
        self.invalidate_posts();
        Ok(comment)
    }

    pub async fn follow(&self, user_id: &str) -> Result<Follow> {
        let path = format!("{}/{}/follow", USERS, user_id);
        let follow = send(self.request(Method::POST, &path, &[])?).await?;
        self.invalidate_social();
        Ok(follow)
    }

    pub async fn unfollow(&self, user_id: &str) -> Result<Success> {
        let path = format!("{}/{}/follow", USERS, user_id);
        let result = send(self.request(Method::DELETE, &path, &[])?).await?;
        self.invalidate_social();
        Ok(result)
    }

    fn invalidate_posts(&self) {
        self.cache.invalidate(&QueryKey::new([POSTS]));
    }

    fn invalidate_social(&self) {
        for prefix in [USERS, NOTIFICATIONS, EXPLORE_USERS, SEARCH] {
            self.cache.invalidate(&QueryKey::new([prefix]));
        }
    }

    async fn query<T: DeserializeOwned>(
        &self,
        key: QueryKey,
        path: &str,
        params: &[(&str, &str)],
        stale_time: Duration,
    ) -> Result<T> {
        if let Some(value) = self.cache.get_fresh(&key, stale_time) {
            return serde_json::from_value(value).context("failed to decode cached response");
        }

        let value: Value = send(self.request(Method::GET, path, params)?).await?;
        let decoded = serde_json::from_value(value.clone())
            .with_context(|| format!("failed to decode response from {}", path))?;
        self.cache.insert(key, value);
        Ok(decoded)
    }

    fn request(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<RequestBuilder> {
        let mut url = self
            .base_url
            .join(path)
            .with_context(|| format!("invalid request path {}", path))?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params.iter().copied());
        }
        Ok(self.http.request(method, url))
    }
}

async fn send<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    let response = request.send().await.context("request failed")?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(api_error(status.as_u16(), &body).into());
    }

    response.json().await.context("failed to decode response")
}

/// Uses the server's `{message}` body when present, else the raw body text.
fn api_error(status: u16, body: &str) -> ApiError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or_else(|| body.to_string());
    ApiError { status, message }
}
