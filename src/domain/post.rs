use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::domain::engagement::CommentView;
use crate::domain::user::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i32,
    pub user_id: String,
    pub caption: String,
    pub image_url: String,
    pub location: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// A post enriched at read time with its author, counts, the viewer's
/// like/save flags and a short preview of the newest comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostView {
    #[serde(flatten)]
    pub post: Post,
    pub user: User,
    pub likes_count: i64,
    pub comments_count: i64,
    pub is_liked: bool,
    pub is_saved: bool,
    pub comments: Vec<CommentView>,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub user_id: String,
    pub caption: String,
    pub image_url: String,
    pub location: Option<String>,
}
