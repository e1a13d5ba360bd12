use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HashtagTrending {
    pub id: &'static str,
    pub name: &'static str,
    pub posts_count: u32,
    pub preview_images: &'static [&'static str],
}

const SUNSET_STAGE: &str = "https://images.unsplash.com/photo-1459749411175-04bf5292ceea?ixlib=rb-4.0.3&auto=format&fit=crop&w=100&h=100";
const BEACH_CROWD: &str = "https://images.unsplash.com/photo-1516542076529-1ea3854896f2?ixlib=rb-4.0.3&auto=format&fit=crop&w=100&h=100";
const VALLEY: &str = "https://images.unsplash.com/photo-1506748686214-e9df14d4d9d0?ixlib=rb-4.0.3&auto=format&fit=crop&w=100&h=100";
const CONCERT: &str = "https://images.unsplash.com/photo-1501612780327-45045538702b?ixlib=rb-4.0.3&auto=format&fit=crop&w=100&h=100";
const DESK: &str = "https://images.unsplash.com/photo-1510915228340-29c85a43dcfe?ixlib=rb-4.0.3&auto=format&fit=crop&w=100&h=100";
const GRADIENT: &str = "https://images.unsplash.com/photo-1555421689-3f034debb7a6?ixlib=rb-4.0.3&auto=format&fit=crop&w=100&h=100";
const PORTRAIT: &str = "https://images.unsplash.com/photo-1515886657613-9f3515b0c78f?ixlib=rb-4.0.3&auto=format&fit=crop&w=100&h=100";
const NEON: &str = "https://images.unsplash.com/photo-1527251672045-a80241b3f574?ixlib=rb-4.0.3&auto=format&fit=crop&w=100&h=100";

/// Fixed trending list served by explore and matched by search.
pub const TRENDING_HASHTAGS: [HashtagTrending; 6] = [
    HashtagTrending {
        id: "hashtag-1",
        name: "summervibes",
        posts_count: 24569,
        preview_images: &[SUNSET_STAGE, BEACH_CROWD, VALLEY],
    },
    HashtagTrending {
        id: "hashtag-2",
        name: "musicfestival",
        posts_count: 18924,
        preview_images: &[CONCERT, SUNSET_STAGE, VALLEY],
    },
    HashtagTrending {
        id: "hashtag-3",
        name: "digitalart",
        posts_count: 15738,
        preview_images: &[BEACH_CROWD, DESK, GRADIENT],
    },
    HashtagTrending {
        id: "hashtag-4",
        name: "minimalist",
        posts_count: 10246,
        preview_images: &[DESK, GRADIENT, PORTRAIT],
    },
    HashtagTrending {
        id: "hashtag-5",
        name: "neonlights",
        posts_count: 8452,
        preview_images: &[SUNSET_STAGE, CONCERT, NEON],
    },
    HashtagTrending {
        id: "hashtag-6",
        name: "workspace",
        posts_count: 6385,
        preview_images: &[BEACH_CROWD, PORTRAIT, DESK],
    },
];

/// Case-insensitive substring match against hashtag names.
pub fn matching_hashtags(query: &str) -> Vec<HashtagTrending> {
    let needle = query.to_lowercase();
    TRENDING_HASHTAGS
        .iter()
        .filter(|tag| tag.name.contains(&needle))
        .copied()
        .collect()
}
