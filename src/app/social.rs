use anyhow::Result;
use sqlx::Row;

use crate::domain::social_graph::Follow;
use crate::infra::db::Db;

#[derive(Clone)]
pub struct SocialService {
    db: Db,
}

impl SocialService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Idempotent follow keyed by the (follower, following) pair. Self-follows
    /// are accepted.
    pub async fn follow(&self, follower_id: &str, following_id: &str) -> Result<Follow> {
        let inserted = sqlx::query(
            "INSERT INTO follows (follower_id, following_id) VALUES ($1, $2) \
             ON CONFLICT (follower_id, following_id) DO NOTHING \
             RETURNING follower_id, following_id, created_at",
        )
        .bind(follower_id)
        .bind(following_id)
        .fetch_optional(self.db.pool())
        .await?;

        let row = match inserted {
            Some(row) => row,
            None => {
                sqlx::query(
                    "SELECT follower_id, following_id, created_at FROM follows \
                     WHERE follower_id = $1 AND following_id = $2",
                )
                .bind(follower_id)
                .bind(following_id)
                .fetch_one(self.db.pool())
                .await?
            }
        };

        Ok(Follow {
            follower_id: row.try_get("follower_id")?,
            following_id: row.try_get("following_id")?,
            created_at: row.try_get("created_at")?,
        })
    }

    pub async fn unfollow(&self, follower_id: &str, following_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "DELETE FROM follows WHERE follower_id = $1 AND following_id = $2",
        )
        .bind(follower_id)
        .bind(following_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
