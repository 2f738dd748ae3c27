//! Pure search and feed logic. Repositories hand over full record sets;
//! everything here is deterministic filtering and ordering.

use crate::models::{Meme, User};

/// Every fifth meme a user creates is featured.
pub const FEATURED_INTERVAL: i64 = 5;

/// Whether the meme at this position of an owner's creation sequence is
/// featured. Positions count from 1.
pub fn is_featured_position(seq: i64) -> bool {
    seq > 0 && seq % FEATURED_INTERVAL == 0
}

/// Sorts memes newest-first, breaking timestamp ties by id so the order
/// stays stable across calls.
pub fn newest_first(memes: &mut [Meme]) {
    memes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

/// A tag and a query are compared after dropping one leading `#` and
/// lowercasing, as whole elements. "#cat" and "cat" are the same tag;
/// "category" is not.
fn normalize_tag(tag: &str) -> String {
    tag.strip_prefix('#').unwrap_or(tag).to_lowercase()
}

/// Union of two match semantics: case-insensitive substring on the
/// description, exact-element match on the normalized tag list.
fn meme_matches(meme: &Meme, query: &str) -> bool {
    let needle = query.to_lowercase();
    let description_hit = meme
        .description
        .as_deref()
        .is_some_and(|description| description.to_lowercase().contains(&needle));

    let tag_needle = normalize_tag(query);
    let tag_hit = meme.tags.iter().any(|tag| normalize_tag(tag) == tag_needle);

    description_hit || tag_hit
}

/// Memes matching the query, newest-first. A blank query matches nothing.
pub fn search_memes(query: &str, mut memes: Vec<Meme>) -> Vec<Meme> {
    let query = query.trim();
    if query.is_empty() {
        return Vec::new();
    }
    memes.retain(|meme| meme_matches(meme, query));
    newest_first(&mut memes);
    memes
}

/// Users whose username contains the query case-insensitively, ordered by
/// id. A blank query matches nothing.
pub fn search_users(query: &str, mut users: Vec<User>) -> Vec<User> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Vec::new();
    }
    users.retain(|user| user.username.to_lowercase().contains(&query));
    users.sort_by_key(|user| user.id);
    users
}

/// All featured memes, newest-first. The flag was fixed at creation and
/// is never recomputed here.
pub fn featured_memes(mut memes: Vec<Meme>) -> Vec<Meme> {
    memes.retain(|meme| meme.is_featured);
    newest_first(&mut memes);
    memes
}
