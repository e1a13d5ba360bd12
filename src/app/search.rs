use anyhow::Result;
use serde::Serialize;
use sqlx::Row;

use crate::app::posts::{assemble_post_views, post_view_query};
use crate::domain::hashtag::{matching_hashtags, HashtagTrending};
use crate::domain::post::PostView;
use crate::domain::user::{User, UserSummary};
use crate::infra::db::Db;

/// Minimum query length in UTF-16 code units, so one emoji counts as two.
pub const MIN_QUERY_LEN: usize = 2;
const USER_RESULTS: i64 = 5;
const POST_RESULTS: i64 = 9;

#[derive(Debug, Default, Serialize)]
pub struct SearchResults {
    pub users: Vec<UserSummary>,
    pub posts: Vec<PostView>,
    pub hashtags: Vec<HashtagTrending>,
}

#[derive(Clone)]
pub struct SearchService {
    db: Db,
}

impl SearchService {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Case-insensitive substring search over people, posts and hashtags.
    /// Queries shorter than `MIN_QUERY_LEN` match nothing.
    pub async fn search(&self, query: &str, viewer_id: &str) -> Result<SearchResults> {
        if !is_searchable(query) {
            return Ok(SearchResults::default());
        }

        let pattern = format!("%{}%", escape_like_pattern(query));
        let mut tx = self.db.snapshot().await?;

        let user_rows = sqlx::query(
            "SELECT u.id, u.username, u.email, u.first_name, u.last_name, u.profile_image_url, \
                    u.bio, u.website, u.created_at, u.updated_at, \
                    EXISTS ( \
                        SELECT 1 FROM follows WHERE follower_id = $2 AND following_id = u.id \
                    ) AS is_following, \
                    (SELECT COUNT(*) FROM follows WHERE following_id = u.id) AS followers_count \
             FROM users u \
             WHERE u.username ILIKE $1 ESCAPE '\\' \
                OR u.first_name ILIKE $1 ESCAPE '\\' \
                OR u.last_name ILIKE $1 ESCAPE '\\' \
             ORDER BY u.username NULLS LAST, u.id \
             LIMIT $3",
        )
        .bind(&pattern)
        .bind(viewer_id)
        .bind(USER_RESULTS)
        .fetch_all(&mut *tx)
        .await?;

        let post_rows = sqlx::query(post_view_query!(
            "WHERE p.caption ILIKE $2 ESCAPE '\\' \
                OR p.location ILIKE $2 ESCAPE '\\' \
             ORDER BY p.created_at DESC, p.id DESC \
             LIMIT $3"
        ))
        .bind(viewer_id)
        .bind(&pattern)
        .bind(POST_RESULTS)
        .fetch_all(&mut *tx)
        .await?;

        let posts = assemble_post_views(&mut tx, post_rows).await?;
        tx.commit().await?;

        let mut users = Vec::with_capacity(user_rows.len());
        for row in &user_rows {
            users.push(UserSummary {
                user: User::from_row(row)?,
                followers_count: row.try_get("followers_count")?,
                is_following: row.try_get("is_following")?,
            });
        }

        Ok(SearchResults {
            users,
            posts,
            hashtags: matching_hashtags(query),
        })
    }
}

fn escape_like_pattern(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '%' | '_' | '\\' => {
                escaped.push('\\');
                escaped.push(ch);
            }
            _ => escaped.push(ch),
        }
    }
    escaped
}

fn is_searchable(query: &str) -> bool {
    query.encode_utf16().count() >= MIN_QUERY_LEN
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_length_counts_utf16_units() {
        assert!(!is_searchable(""));
        assert!(!is_searchable("a"));
        assert!(!is_searchable("é"));
        assert!(is_searchable("ab"));
        assert!(is_searchable("😀"));
    }

    #[test]
    fn escapes_like_metacharacters() {
        assert_eq!(escape_like_pattern("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like_pattern("sunset"), "sunset");
    }

    #[test]
    fn empty_results_serialize_as_empty_arrays() {
        let value = serde_json::to_value(SearchResults::default()).unwrap();
        assert_eq!(value, serde_json::json!({"users": [], "posts": [], "hashtags": []}));
    }
}
