use anyhow::Result;
use sqlx::Row;

use crate::app::posts::comment_view_from_row;
use crate::domain::engagement::{CommentView, Like, Save};
use crate::infra::db::Db;

#[derive(Clone)]
pub struct EngagementService {
    db: Db,
}

impl EngagementService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Idempotent: a repeated like returns the row created the first time.
    pub async fn like_post(&self, user_id: &str, post_id: i32) -> Result<Like> {
        let inserted = sqlx::query(
            "INSERT INTO likes (user_id, post_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, post_id) DO NOTHING \
             RETURNING user_id, post_id, created_at",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match inserted {
            Some(row) => row,
            None => {
                sqlx::query(
                    "SELECT user_id, post_id, created_at FROM likes \
                     WHERE user_id = $1 AND post_id = $2",
                )
                .bind(user_id)
                .bind(post_id)
                .fetch_one(self.db.pool())
                .await?
            }
        };

        Ok(Like {
            user_id: row.try_get("user_id")?,
            post_id: row.try_get("post_id")?,
            created_at: row.try_get("created_at")?,
        })
    }

    pub async fn unlike_post(&self, user_id: &str, post_id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Idempotent: a repeated save returns the row created the first time.
    pub async fn save_post(&self, user_id: &str, post_id: i32) -> Result<Save> {
        let inserted = sqlx::query(
            "INSERT INTO saves (user_id, post_id) VALUES ($1, $2) \
             ON CONFLICT (user_id, post_id) DO NOTHING \
             RETURNING user_id, post_id, created_at",
        )
        .bind(user_id)
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match inserted {
            Some(row) => row,
            None => {
                sqlx::query(
                    "SELECT user_id, post_id, created_at FROM saves \
                     WHERE user_id = $1 AND post_id = $2",
                )
                .bind(user_id)
                .bind(post_id)
                .fetch_one(self.db.pool())
                .await?
            }
        };

        Ok(Save {
            user_id: row.try_get("user_id")?,
            post_id: row.try_get("post_id")?,
            created_at: row.try_get("created_at")?,
        })
    }

    pub async fn unsave_post(&self, user_id: &str, post_id: i32) -> Result<bool> {
        let result = sqlx::query("DELETE FROM saves WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn comment_post(
        &self,
        user_id: &str,
        post_id: i32,
        content: &str,
    ) -> Result<CommentView> {
        let row = sqlx::query(
            "WITH inserted_comment AS ( \
                INSERT INTO comments (user_id, post_id, content) VALUES ($1, $2, $3) \
                RETURNING id, user_id, post_id, content, created_at, updated_at \
             ) \
             SELECT c.*, \
                    u.id AS author_id, u.username AS author_username, u.email AS author_email, \
                    u.first_name AS author_first_name, u.last_name AS author_last_name, \
                    u.profile_image_url AS author_profile_image_url, u.bio AS author_bio, \
                    u.website AS author_website, u.created_at AS author_created_at, \
                    u.updated_at AS author_updated_at \
             FROM inserted_comment c \
             JOIN users u ON u.id = c.user_id",
        )
        .bind(user_id)
        .bind(post_id)
        .bind(content)
        .fetch_one(self.db.pool())
        .await?;

        Ok(comment_view_from_row(&row)?)
    }
}
