use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};
use std::collections::HashMap;

use crate::domain::engagement::{Comment, CommentView};
use crate::domain::post::{NewPost, Post, PostView};
use crate::domain::user::User;
use crate::infra::db::Db;

pub const COMMENT_PREVIEW_LIMIT: i64 = 5;
pub const TRENDING_LIMIT: i64 = 12;

/// Builds the enriched-post SELECT with `$1` bound to the viewer id.
/// The tail supplies joins, the WHERE clause, ordering and limits.
macro_rules! post_view_query {
    ($tail:literal) => {
        concat!(
            "SELECT p.id, p.user_id, p.caption, p.image_url, p.location, p.created_at, p.updated_at, \
                    u.id AS author_id, u.username AS author_username, u.email AS author_email, \
                    u.first_name AS author_first_name, u.last_name AS author_last_name, \
                    u.profile_image_url AS author_profile_image_url, u.bio AS author_bio, \
                    u.website AS author_website, u.created_at AS author_created_at, \
                    u.updated_at AS author_updated_at, \
                    (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count, \
                    (SELECT COUNT(*) FROM comments c WHERE c.post_id = p.id) AS comments_count, \
                    EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $1) AS is_liked, \
                    EXISTS (SELECT 1 FROM saves s WHERE s.post_id = p.id AND s.user_id = $1) AS is_saved \
             FROM posts p \
             JOIN users u ON u.id = p.user_id ",
            $tail
        )
    };
}

pub(crate) use post_view_query;

#[derive(Clone)]
pub struct PostService {
    db: Db,
}

impl PostService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub async fn create_post(&self, new_post: NewPost) -> Result<PostView> {
        let row = sqlx::query(
            "WITH inserted_post AS ( \
                INSERT INTO posts (user_id, caption, image_url, location) \
                VALUES ($1, $2, $3, $4) \
                RETURNING id, user_id, caption, image_url, location, created_at, updated_at \
             ) \
             SELECT p.*, \
                    u.id AS author_id, u.username AS author_username, u.email AS author_email, \
                    u.first_name AS author_first_name, u.last_name AS author_last_name, \
                    u.profile_image_url AS author_profile_image_url, u.bio AS author_bio, \
                    u.website AS author_website, u.created_at AS author_created_at, \
                    u.updated_at AS author_updated_at \
             FROM inserted_post p \
             JOIN users u ON u.id = p.user_id",
        )
        .bind(&new_post.user_id)
        .bind(&new_post.caption)
        .bind(&new_post.image_url)
        .bind(&new_post.location)
        .fetch_one(self.db.pool())
        .await?;

        Ok(PostView {
            post: post_from_row(&row)?,
            user: User::from_prefixed_row(&row, "author_")?,
            likes_count: 0,
            comments_count: 0,
            is_liked: false,
            is_saved: false,
            comments: Vec::new(),
        })
    }

    pub async fn get_post(&self, post_id: i32, viewer_id: &str) -> Result<Option<PostView>> {
        let mut tx = self.db.snapshot().await?;

        let row = sqlx::query(post_view_query!("WHERE p.id = $2"))
            .bind(viewer_id)
            .bind(post_id)
            .fetch_optional(&mut *tx)
            .await?;

        let post = match row {
            Some(row) => assemble_post_views(&mut tx, vec![row]).await?.pop(),
            None => None,
        };

        tx.commit().await?;
        Ok(post)
    }

    pub async fn list_by_user(&self, owner_id: &str, viewer_id: &str) -> Result<Vec<PostView>> {
        let mut tx = self.db.snapshot().await?;

        let rows = sqlx::query(post_view_query!(
            "WHERE p.user_id = $2 \
             ORDER BY p.created_at DESC, p.id DESC"
        ))
        .bind(viewer_id)
        .bind(owner_id)
        .fetch_all(&mut *tx)
        .await?;

        let posts = assemble_post_views(&mut tx, rows).await?;
        tx.commit().await?;
        Ok(posts)
    }

    /// Posts saved by `user_id`, most recently saved first.
    pub async fn list_saved(&self, user_id: &str) -> Result<Vec<PostView>> {
        let mut tx = self.db.snapshot().await?;

        let rows = sqlx::query(post_view_query!(
            "JOIN saves sv ON sv.post_id = p.id AND sv.user_id = $1 \
             ORDER BY sv.created_at DESC, p.id DESC"
        ))
        .bind(user_id)
        .fetch_all(&mut *tx)
        .await?;

        let posts = assemble_post_views(&mut tx, rows).await?;
        tx.commit().await?;
        Ok(posts)
    }

    /// Most-liked posts across the whole site.
    pub async fn list_trending(&self, viewer_id: &str) -> Result<Vec<PostView>> {
        let mut tx = self.db.snapshot().await?;

        let rows = sqlx::query(post_view_query!(
            "JOIN ( \
                 SELECT post_id, COUNT(*) AS like_total \
                 FROM likes \
                 GROUP BY post_id \
                 ORDER BY like_total DESC, post_id DESC \
                 LIMIT $2 \
             ) t ON t.post_id = p.id \
             ORDER BY t.like_total DESC, p.id DESC"
        ))
        .bind(viewer_id)
        .bind(TRENDING_LIMIT)
        .fetch_all(&mut *tx)
        .await?;

        let posts = assemble_post_views(&mut tx, rows).await?;
        tx.commit().await?;
        Ok(posts)
    }
}

/// Turns rows produced by `post_view_query!` into views and attaches the
/// comment previews for all of them with a single windowed query.
pub(crate) async fn assemble_post_views(
    conn: &mut PgConnection,
    rows: Vec<PgRow>,
) -> Result<Vec<PostView>> {
    let mut views = Vec::with_capacity(rows.len());
    for row in &rows {
        views.push(post_view_from_row(row)?);
    }

    if views.is_empty() {
        return Ok(views);
    }

    let post_ids: Vec<i32> = views.iter().map(|view| view.post.id).collect();
    let mut previews = load_comment_previews(conn, &post_ids).await?;
    for view in &mut views {
        if let Some(comments) = previews.remove(&view.post.id) {
            view.comments = comments;
        }
    }

    Ok(views)
}

async fn load_comment_previews(
    conn: &mut PgConnection,
    post_ids: &[i32],
) -> Result<HashMap<i32, Vec<CommentView>>> {
    let rows = sqlx::query(
        "SELECT c.id, c.user_id, c.post_id, c.content, c.created_at, c.updated_at, \
                u.id AS author_id, u.username AS author_username, u.email AS author_email, \
                u.first_name AS author_first_name, u.last_name AS author_last_name, \
                u.profile_image_url AS author_profile_image_url, u.bio AS author_bio, \
                u.website AS author_website, u.created_at AS author_created_at, \
                u.updated_at AS author_updated_at \
         FROM ( \
             SELECT c.*, ROW_NUMBER() OVER ( \
                 PARTITION BY c.post_id ORDER BY c.created_at DESC, c.id DESC \
             ) AS preview_rank \
             FROM comments c \
             WHERE c.post_id = ANY($1) \
         ) c \
         JOIN users u ON u.id = c.user_id \
         WHERE c.preview_rank <= $2 \
         ORDER BY c.post_id, c.created_at DESC, c.id DESC",
    )
    .bind(post_ids)
    .bind(COMMENT_PREVIEW_LIMIT)
    .fetch_all(&mut *conn)
    .await?;

    let mut previews: HashMap<i32, Vec<CommentView>> = HashMap::new();
    for row in rows {
        let view = comment_view_from_row(&row)?;
        previews.entry(view.comment.post_id).or_default().push(view);
    }

    Ok(previews)
}

pub(crate) fn post_from_row(row: &PgRow) -> Result<Post, sqlx::Error> {
    Ok(Post {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        caption: row.try_get("caption")?,
        image_url: row.try_get("image_url")?,
        location: row.try_get("location")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn post_view_from_row(row: &PgRow) -> Result<PostView, sqlx::Error> {
    Ok(PostView {
        post: post_from_row(row)?,
        user: User::from_prefixed_row(row, "author_")?,
        likes_count: row.try_get("likes_count")?,
        comments_count: row.try_get("comments_count")?,
        is_liked: row.try_get("is_liked")?,
        is_saved: row.try_get("is_saved")?,
        comments: Vec::new(),
    })
}

pub(crate) fn comment_view_from_row(row: &PgRow) -> Result<CommentView, sqlx::Error> {
    Ok(CommentView {
        comment: Comment {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            post_id: row.try_get("post_id")?,
            content: row.try_get("content")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        },
        user: User::from_prefixed_row(row, "author_")?,
    })
}
