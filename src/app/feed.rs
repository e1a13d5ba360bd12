use anyhow::Result;

use crate::app::posts::{assemble_post_views, post_view_query};
use crate::domain::post::PostView;
use crate::infra::db::Db;

pub const FEED_LIMIT: i64 = 20;

#[derive(Clone)]
pub struct FeedService {
    db: Db,
}

impl FeedService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Newest posts written by the user or anyone they follow.
    pub async fn home_feed(&self, user_id: &str) -> Result<Vec<PostView>> {
        let mut tx = self.db.snapshot().await?;

        let rows = sqlx::query(post_view_query!(
            "WHERE p.user_id = $1 \
                OR p.user_id IN (SELECT following_id FROM follows WHERE follower_id = $1) \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT $2"
        ))
        .bind(user_id)
        .bind(FEED_LIMIT)
        .fetch_all(&mut *tx)
        .await?;

        let posts = assemble_post_views(&mut tx, rows).await?;
        tx.commit().await?;
        Ok(posts)
    }
}
