use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fallback meme dimensions when the client sends none or garbage.
pub const DEFAULT_MEME_WIDTH: u32 = 360;
pub const DEFAULT_MEME_HEIGHT: u32 = 300;

/// A registered account. Email is stored lowercased; username uniqueness
/// is case-sensitive. The credential hash and the verification flag are
/// persisted but never serialized into API responses.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub avatar_url: Option<String>,
    pub interests: Vec<String>,
    pub is_registered: bool,
    /// Cleared whenever the email changes; nothing re-verifies it yet.
    #[serde(skip_serializing, default)]
    pub is_verified: bool,
    pub settings: Option<UserSettings>,
    // Reserved counters; no write path increments these yet.
    pub followers_count: i64,
    pub following_count: i64,
    pub likes_count: i64,
}

/// Field set needed to create a user; the repository assigns the id and
/// fills in the defaults.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub interests: Vec<String>,
}

impl NewUser {
    /// Materializes the stored record for a freshly allocated id.
    pub fn into_user(self, id: i64) -> User {
        User {
            id,
            email: self.email,
            username: self.username,
            password_hash: self.password_hash,
            avatar_url: None,
            interests: self.interests,
            is_registered: true,
            is_verified: false,
            settings: None,
            followers_count: 0,
            following_count: 0,
            likes_count: 0,
        }
    }
}

/// Per-user preference document, replaced wholesale on update.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserSettings {
    pub notifications: NotificationSettings,
    pub privacy: PrivacySettings,
    pub theme: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct NotificationSettings {
    pub likes: bool,
    pub messages: bool,
    pub memes: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PrivacySettings {
    pub messages: String,
    pub memes: String,
}

/// An uploaded meme. Append-only: no operation edits or deletes one, and
/// the featured flag is fixed at creation.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Meme {
    pub id: i64,
    pub image_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub width: u32,
    pub height: u32,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub likes: i64,
    pub tags: Vec<String>,
    pub is_featured: bool,
}

#[derive(Debug, Clone)]
pub struct NewMeme {
    pub owner_id: i64,
    pub image_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub width: u32,
    pub height: u32,
    pub tags: Vec<String>,
    pub is_featured: bool,
}

impl NewMeme {
    pub fn into_meme(self, id: i64, created_at: DateTime<Utc>) -> Meme {
        Meme {
            id,
            image_url: self.image_url,
            title: self.title,
            description: self.description,
            width: self.width,
            height: self.height,
            owner_id: self.owner_id,
            created_at,
            likes: 0,
            tags: self.tags,
            is_featured: self.is_featured,
        }
    }
}

// Messaging is not exposed yet; these records exist so the tables carry
// a stable shape when the feature lands.

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Chat {
    pub id: i64,
    pub name: String,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub chat_id: i64,
    pub sender_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}
