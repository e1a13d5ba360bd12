use anyhow::Result;
use time::{Duration, OffsetDateTime};

use crate::domain::story::Story;
use crate::domain::user::{User, USER_COLUMNS};
use crate::infra::db::Db;

const STORY_USERS: i64 = 5;
const STORY_TTL_HOURS: i64 = 24;
/// Stories at an index above this are reported as already viewed.
const LAST_UNVIEWED_INDEX: usize = 2;

#[derive(Clone)]
pub struct StoryService {
    db: Db,
}

impl StoryService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// One story per followed account, most recently followed first. Nothing
    /// is stored; the story image is the account's profile picture.
    pub async fn list(&self, user_id: &str) -> Result<Vec<Story>> {
        let sql = format!(
            "SELECT {} \
             FROM follows f \
             JOIN users u ON u.id = f.following_id \
             WHERE f.follower_id = $1 \
             ORDER BY f.created_at DESC, f.following_id \
             LIMIT $2",
            USER_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(STORY_USERS)
            .fetch_all(self.db.pool())
            .await?;

        let mut users = Vec::with_capacity(rows.len());
        for row in &rows {
            users.push(User::from_row(row)?);
        }

        Ok(stories_for(users, OffsetDateTime::now_utc()))
    }
}

pub(crate) fn stories_for(users: Vec<User>, now: OffsetDateTime) -> Vec<Story> {
    users
        .into_iter()
        .take(STORY_USERS as usize)
        .enumerate()
        .map(|(index, user)| Story {
            id: format!("story-{}", user.id),
            image_url: user.profile_image_url.clone().unwrap_or_default(),
            user,
            created_at: now,
            expires_at: now + Duration::hours(STORY_TTL_HOURS),
            has_viewed: index > LAST_UNVIEWED_INDEX,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(id: &str, image: Option<&str>) -> User {
        User {
            id: id.to_string(),
            username: None,
            email: None,
            first_name: None,
            last_name: None,
            profile_image_url: image.map(str::to_string),
            bio: None,
            website: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn caps_at_five_and_marks_tail_viewed() {
        let users = (0..7).map(|i| user(&format!("u{}", i), None)).collect();
        let stories = stories_for(users, OffsetDateTime::UNIX_EPOCH);

        assert_eq!(stories.len(), 5);
        let viewed: Vec<_> = stories.iter().map(|s| s.has_viewed).collect();
        assert_eq!(viewed, vec![false, false, false, true, true]);
        assert_eq!(stories[0].id, "story-u0");
    }

    #[test]
    fn uses_profile_image_and_one_day_expiry() {
        let now = OffsetDateTime::UNIX_EPOCH;
        let stories = stories_for(
            vec![user("a", Some("https://img/a.png")), user("b", None)],
            now,
        );

        assert_eq!(stories[0].image_url, "https://img/a.png");
        assert_eq!(stories[1].image_url, "");
        assert_eq!(stories[0].expires_at - stories[0].created_at, Duration::hours(24));
    }
}
