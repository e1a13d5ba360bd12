use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::Row;

use crate::domain::notification::{Notification, NotificationActor, NotificationKind};
use crate::domain::user::User;
use crate::infra::db::Db;

const LIKED_POSTS_SCANNED: i64 = 3;
const LIKES_PER_POST: i64 = 2;
const RECENT_FOLLOWERS: i64 = 3;
const COMMENTED_POSTS_SCANNED: i64 = 2;
const COMMENTS_PER_POST: i64 = 2;
const COMMENT_EXCERPT_CHARS: usize = 20;

#[derive(Clone)]
pub struct NotificationService {
    db: Db,
}

impl NotificationService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Activity on the user's account, newest first, rebuilt from likes,
    /// follows and comments on every call.
    pub async fn list(&self, user_id: &str) -> Result<Vec<Notification>> {
        let mut tx = self.db.snapshot().await?;

        let like_rows = sqlx::query(
            "SELECT p.id AS post_id, p.image_url AS post_image_url, l.created_at AS event_at, \
                    u.id AS actor_id, u.username AS actor_username, u.email AS actor_email, \
                    u.first_name AS actor_first_name, u.last_name AS actor_last_name, \
                    u.profile_image_url AS actor_profile_image_url, u.bio AS actor_bio, \
                    u.website AS actor_website, u.created_at AS actor_created_at, \
                    u.updated_at AS actor_updated_at, \
                    EXISTS ( \
                        SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = u.id \
                    ) AS is_following \
             FROM ( \
                 SELECT id, image_url, created_at FROM posts \
                 WHERE user_id = $1 \
                 ORDER BY created_at DESC, id DESC \
                 LIMIT $2 \
             ) p \
             CROSS JOIN LATERAL ( \
                 SELECT user_id, created_at FROM likes \
                 WHERE post_id = p.id \
                 ORDER BY created_at DESC \
                 LIMIT $3 \
             ) l \
             JOIN users u ON u.id = l.user_id \
             WHERE l.user_id <> $1 \
             ORDER BY p.created_at DESC, p.id DESC, l.created_at DESC",
        )
        .bind(user_id)
        .bind(LIKED_POSTS_SCANNED)
        .bind(LIKES_PER_POST)
        .fetch_all(&mut *tx)
        .await?;

        let follow_rows = sqlx::query(
            "SELECT f.created_at AS event_at, \
                    u.id AS actor_id, u.username AS actor_username, u.email AS actor_email, \
                    u.first_name AS actor_first_name, u.last_name AS actor_last_name, \
                    u.profile_image_url AS actor_profile_image_url, u.bio AS actor_bio, \
                    u.website AS actor_website, u.created_at AS actor_created_at, \
                    u.updated_at AS actor_updated_at, \
                    EXISTS ( \
                        SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = u.id \
                    ) AS is_following \
             FROM ( \
                 SELECT follower_id, created_at FROM follows \
                 WHERE following_id = $1 \
                 ORDER BY created_at DESC \
                 LIMIT $2 \
             ) f \
             JOIN users u ON u.id = f.follower_id \
             WHERE f.follower_id <> $1 \
             ORDER BY f.created_at DESC",
        )
        .bind(user_id)
        .bind(RECENT_FOLLOWERS)
        .fetch_all(&mut *tx)
        .await?;

        let comment_rows = sqlx::query(
            "SELECT p.id AS post_id, p.image_url AS post_image_url, \
                    c.id AS comment_id, c.content, c.created_at AS event_at, \
                    u.id AS actor_id, u.username AS actor_username, u.email AS actor_email, \
                    u.first_name AS actor_first_name, u.last_name AS actor_last_name, \
                    u.profile_image_url AS actor_profile_image_url, u.bio AS actor_bio, \
                    u.website AS actor_website, u.created_at AS actor_created_at, \
                    u.updated_at AS actor_updated_at, \
                    EXISTS ( \
                        SELECT 1 FROM follows WHERE follower_id = $1 AND following_id = u.id \
                    ) AS is_following \
             FROM ( \
                 SELECT id, image_url, created_at FROM posts \
                 WHERE user_id = $1 \
                 ORDER BY created_at DESC, id DESC \
                 LIMIT $2 \
             ) p \
             CROSS JOIN LATERAL ( \
                 SELECT id, user_id, content, created_at FROM comments \
                 WHERE post_id = p.id \
                 ORDER BY created_at DESC, id DESC \
                 LIMIT $3 \
             ) c \
             JOIN users u ON u.id = c.user_id \
             WHERE c.user_id <> $1 \
             ORDER BY p.created_at DESC, p.id DESC, c.created_at DESC",
        )
        .bind(user_id)
        .bind(COMMENTED_POSTS_SCANNED)
        .bind(COMMENTS_PER_POST)
        .fetch_all(&mut *tx)
        .await?;

        tx.commit().await?;

        let mut likes = Vec::with_capacity(like_rows.len());
        for row in &like_rows {
            let post_id: i32 = row.try_get("post_id")?;
            let actor = actor_from_row(row)?;
            likes.push(Notification {
                id: format!("like-{}-{}", post_id, actor.user.id),
                kind: NotificationKind::Like,
                message: "liked your photo.".to_string(),
                actor,
                post_id: Some(post_id),
                post_image_url: row.try_get("post_image_url")?,
                is_read: false,
                created_at: row.try_get("event_at")?,
            });
        }

        let mut follows = Vec::with_capacity(follow_rows.len());
        for row in &follow_rows {
            let actor = actor_from_row(row)?;
            follows.push(Notification {
                id: format!("follow-{}", actor.user.id),
                kind: NotificationKind::Follow,
                message: "started following you.".to_string(),
                actor,
                post_id: None,
                post_image_url: None,
                is_read: false,
                created_at: row.try_get("event_at")?,
            });
        }

        let mut comments = Vec::with_capacity(comment_rows.len());
        for row in &comment_rows {
            let comment_id: i32 = row.try_get("comment_id")?;
            let content: String = row.try_get("content")?;
            comments.push(Notification {
                id: format!("comment-{}", comment_id),
                kind: NotificationKind::Comment,
                message: comment_message(&content),
                actor: actor_from_row(row)?,
                post_id: Some(row.try_get("post_id")?),
                post_image_url: row.try_get("post_image_url")?,
                is_read: false,
                created_at: row.try_get("event_at")?,
            });
        }

        Ok(merge_newest_first(vec![likes, follows, comments]))
    }
}

fn actor_from_row(row: &PgRow) -> Result<NotificationActor, sqlx::Error> {
    Ok(NotificationActor {
        user: User::from_prefixed_row(row, "actor_")?,
        is_following: row.try_get("is_following")?,
    })
}

/// `commented on your post: "..."` with the comment cut to its first 20 chars.
pub(crate) fn comment_message(content: &str) -> String {
    let mut chars = content.chars();
    let excerpt: String = chars.by_ref().take(COMMENT_EXCERPT_CHARS).collect();
    let ellipsis = if chars.next().is_some() { "..." } else { "" };
    format!("commented on your post: \"{}{}\"", excerpt, ellipsis)
}

/// Concatenates the sources in order and sorts newest first. The sort is
/// stable, so equal timestamps keep source order.
pub(crate) fn merge_newest_first(sources: Vec<Vec<Notification>>) -> Vec<Notification> {
    let mut merged: Vec<Notification> = sources.into_iter().flatten().collect();
    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::{Duration, OffsetDateTime};

    fn actor(id: &str) -> NotificationActor {
        NotificationActor {
            user: User {
                id: id.to_string(),
                username: None,
                email: None,
                first_name: None,
                last_name: None,
                profile_image_url: None,
                bio: None,
                website: None,
                created_at: OffsetDateTime::UNIX_EPOCH,
                updated_at: OffsetDateTime::UNIX_EPOCH,
            },
            is_following: false,
        }
    }

    fn notification(id: &str, kind: NotificationKind, minutes_ago: i64) -> Notification {
        Notification {
            id: id.to_string(),
            kind,
            message: String::new(),
            actor: actor("someone"),
            post_id: None,
            post_image_url: None,
            is_read: false,
            created_at: OffsetDateTime::UNIX_EPOCH + Duration::days(1) - Duration::minutes(minutes_ago),
        }
    }

    #[test]
    fn short_comment_is_quoted_whole() {
        assert_eq!(comment_message("nice!"), "commented on your post: \"nice!\"");
    }

    #[test]
    fn twenty_char_comment_has_no_ellipsis() {
        let content = "a".repeat(20);
        assert_eq!(
            comment_message(&content),
            format!("commented on your post: \"{}\"", content)
        );
    }

    #[test]
    fn long_comment_is_truncated_on_char_boundary() {
        let content = "é".repeat(25);
        assert_eq!(
            comment_message(&content),
            format!("commented on your post: \"{}...\"", "é".repeat(20))
        );
    }

    #[test]
    fn merge_sorts_across_sources() {
        let likes = vec![notification("like-1", NotificationKind::Like, 30)];
        let follows = vec![notification("follow-a", NotificationKind::Follow, 5)];
        let comments = vec![
            notification("comment-9", NotificationKind::Comment, 1),
            notification("comment-8", NotificationKind::Comment, 60),
        ];

        let ids: Vec<_> = merge_newest_first(vec![likes, follows, comments])
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["comment-9", "follow-a", "like-1", "comment-8"]);
    }

    #[test]
    fn merge_keeps_source_order_on_ties() {
        let likes = vec![notification("like-1", NotificationKind::Like, 10)];
        let follows = vec![notification("follow-a", NotificationKind::Follow, 10)];

        let ids: Vec<_> = merge_newest_first(vec![likes, follows])
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(ids, vec!["like-1", "follow-a"]);
    }

    #[test]
    fn serializes_kind_as_type() {
        let value = serde_json::to_value(notification("follow-a", NotificationKind::Follow, 0)).unwrap();
        assert_eq!(value["type"], "follow");
        assert_eq!(value["isRead"], false);
        assert!(value.get("postId").is_none());
        assert_eq!(value["actor"]["isFollowing"], false);
    }
}
