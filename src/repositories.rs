use crate::{
    domain::{MemeRepository, UserRepository},
    errors::RepoError,
    models::{Meme, NewMeme, NewUser, User, UserSettings},
};
use anyhow::Context;
use async_trait::async_trait;
use aws_sdk_dynamodb::{
    Client as DynamoDbClient,
    types::{AttributeValue, ReturnValue},
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::info;

const USERS_COUNTER: &str = "users";
const MEMES_COUNTER: &str = "memes";

/// Counter row holding one owner's meme creation sequence.
fn owner_memes_counter(owner_id: i64) -> String {
    format!("user_{owner_id}_memes")
}

/// Increments the named counter by one and returns the new value, in a
/// single DynamoDB round-trip. Concurrent callers each observe a distinct
/// value; the first call on a fresh name returns 1.
async fn next_counter_value(
    client: &DynamoDbClient,
    table_name: &str,
    counter_name: &str,
) -> Result<i64, RepoError> {
    let resp = client
        .update_item()
        .table_name(table_name)
        .key("counter_name", AttributeValue::S(counter_name.to_string()))
        .update_expression("ADD #value :incr")
        .expression_attribute_names("#value", "current_value")
        .expression_attribute_values(":incr", AttributeValue::N("1".to_string()))
        .return_values(ReturnValue::UpdatedNew)
        .send()
        .await
        .context(format!(
            "DynamoDB (table: {}): Failed to increment counter '{}'",
            table_name, counter_name
        ))
        .map_err(RepoError::BackendError)?;

    resp.attributes()
        .and_then(|attrs| attrs.get("current_value"))
        .and_then(|value| value.as_n().ok())
        .and_then(|raw| raw.parse::<i64>().ok())
        .ok_or_else(|| {
            RepoError::DataCorruption(format!(
                "Counter '{}' in table '{}' returned no numeric value",
                counter_name, table_name
            ))
        })
}

/// Scans a whole table, following LastEvaluatedKey across pages.
async fn scan_table(
    client: &DynamoDbClient,
    table_name: &str,
) -> Result<Vec<HashMap<String, AttributeValue>>, RepoError> {
    let mut items = Vec::new();
    let mut last_evaluated_key: Option<HashMap<String, AttributeValue>> = None;

    loop {
        let mut request_builder = client.scan().table_name(table_name);
        if let Some(lek) = last_evaluated_key {
            request_builder = request_builder.set_exclusive_start_key(Some(lek));
        }

        let resp = request_builder
            .send()
            .await
            .context(format!("DynamoDB: Failed to scan table '{}'", table_name))
            .map_err(RepoError::BackendError)?;

        if let Some(page) = resp.items {
            items.extend(page);
        }

        last_evaluated_key = resp.last_evaluated_key;
        if last_evaluated_key.is_none() {
            break;
        }
        tracing::debug!(table_name = %table_name, "DynamoDB Scan: Continuing with LastEvaluatedKey...");
    }

    Ok(items)
}

#[derive(Debug, Clone)]
pub struct DynamoDbUserRepository {
    client: DynamoDbClient,
    table_name: String,
    counters_table: String,
}

impl DynamoDbUserRepository {
    pub fn new(client: DynamoDbClient, table_name: String, counters_table: String) -> Self {
        info!(%table_name, "Initializing DynamoDbUserRepository");
        Self {
            client,
            table_name,
            counters_table,
        }
    }

    async fn put(&self, user: &User) -> Result<(), RepoError> {
        let item = user_to_item(user)?;
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(item))
            .send()
            .await
            .context(format!(
                "DynamoDB (table: {}): Failed to put user (id: {})",
                self.table_name, user.id
            ))
            .map_err(RepoError::BackendError)?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for DynamoDbUserRepository {
    async fn insert(&self, new_user: NewUser) -> Result<User, RepoError> {
        let id = next_counter_value(&self.client, &self.counters_table, USERS_COUNTER).await?;
        let user = new_user.into_user(id);
        self.put(&user).await?;
        tracing::debug!(user_id = user.id, table_name = %self.table_name, "DynamoDB: Stored new user");
        Ok(user)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>, RepoError> {
        let resp = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("user_id", AttributeValue::N(id.to_string()))
            .send()
            .await
            .context(format!(
                "DynamoDB (table: {}): Failed to get user (id: {})",
                self.table_name, id
            ))
            .map_err(RepoError::BackendError)?;

        match resp.item {
            Some(item) => match item_to_user(&item) {
                Some(user) => Ok(Some(user)),
                None => {
                    tracing::error!(user_id = id, table_name = %self.table_name, "DynamoDB: Retrieved item but failed to parse into User");
                    Err(RepoError::DataCorruption(format!(
                        "Failed to parse user data retrieved from DynamoDB table '{}' for id {}",
                        self.table_name, id
                    )))
                }
            },
            None => Ok(None), // Item not found is not an error
        }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError> {
        let needle = email.to_lowercase();
        let users = self.list_all().await?;
        Ok(users
            .into_iter()
            .find(|user| user.email.to_lowercase() == needle))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError> {
        let users = self.list_all().await?;
        Ok(users.into_iter().find(|user| user.username == username))
    }

    async fn username_exists(&self, username: &str) -> Result<bool, RepoError> {
        let needle = username.to_lowercase();
        let users = self.list_all().await?;
        Ok(users
            .iter()
            .any(|user| user.username.to_lowercase() == needle))
    }

    async fn list_all(&self) -> Result<Vec<User>, RepoError> {
        let items = scan_table(&self.client, &self.table_name).await?;
        let mut users = Vec::with_capacity(items.len());
        for item in &items {
            match item_to_user(item) {
                Some(user) => users.push(user),
                None => {
                    let item_id = item.get("user_id").and_then(|v| v.as_n().ok());
                    tracing::error!(item.id = ?item_id, table_name = %self.table_name, "DynamoDB: Failed to parse item from scan into User");
                    // Fail fast if data in the table is corrupt
                    return Err(RepoError::DataCorruption(format!(
                        "DynamoDB: Failed to parse item {:?} during scan of table '{}'",
                        item_id, self.table_name
                    )));
                }
            }
        }
        tracing::debug!(table_name = %self.table_name, count = users.len(), "DynamoDB: Listed users");
        Ok(users)
    }

    async fn update(&self, user: &User) -> Result<(), RepoError> {
        self.put(user).await?;
        tracing::debug!(user_id = user.id, table_name = %self.table_name, "DynamoDB: Updated user");
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct DynamoDbMemeRepository {
    client: DynamoDbClient,
    table_name: String,
    counters_table: String,
}

impl DynamoDbMemeRepository {
    pub fn new(client: DynamoDbClient, table_name: String, counters_table: String) -> Self {
        info!(%table_name, "Initializing DynamoDbMemeRepository");
        Self {
            client,
            table_name,
            counters_table,
        }
    }
}

#[async_trait]
impl MemeRepository for DynamoDbMemeRepository {
    async fn insert(&self, new_meme: NewMeme) -> Result<Meme, RepoError> {
        let id = next_counter_value(&self.client, &self.counters_table, MEMES_COUNTER).await?;
        let meme = new_meme.into_meme(id, Utc::now());
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(meme_to_item(&meme)))
            .send()
            .await
            .context(format!(
                "DynamoDB (table: {}): Failed to put meme (id: {})",
                self.table_name, meme.id
            ))
            .map_err(RepoError::BackendError)?;
        tracing::debug!(meme_id = meme.id, table_name = %self.table_name, "DynamoDB: Stored new meme");
        Ok(meme)
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Meme>, RepoError> {
        let resp = self
            .client
            .get_item()
            .table_name(&self.table_name)
            .key("meme_id", AttributeValue::N(id.to_string()))
            .send()
            .await
            .context(format!(
                "DynamoDB (table: {}): Failed to get meme (id: {})",
                self.table_name, id
            ))
            .map_err(RepoError::BackendError)?;

        match resp.item {
            Some(item) => match item_to_meme(&item) {
                Some(meme) => Ok(Some(meme)),
                None => {
                    tracing::error!(meme_id = id, table_name = %self.table_name, "DynamoDB: Retrieved item but failed to parse into Meme");
                    Err(RepoError::DataCorruption(format!(
                        "Failed to parse meme data retrieved from DynamoDB table '{}' for id {}",
                        self.table_name, id
                    )))
                }
            },
            None => Ok(None), // Item not found is not an error
        }
    }

    async fn list_all(&self) -> Result<Vec<Meme>, RepoError> {
        let items = scan_table(&self.client, &self.table_name).await?;
        let mut memes = Vec::with_capacity(items.len());
        for item in &items {
            match item_to_meme(item) {
                Some(meme) => memes.push(meme),
                None => {
                    let item_id = item.get("meme_id").and_then(|v| v.as_n().ok());
                    tracing::error!(item.id = ?item_id, table_name = %self.table_name, "DynamoDB: Failed to parse item from scan into Meme");
                    // Fail fast if data in the table is corrupt
                    return Err(RepoError::DataCorruption(format!(
                        "DynamoDB: Failed to parse item {:?} during scan of table '{}'",
                        item_id, self.table_name
                    )));
                }
            }
        }
        tracing::debug!(table_name = %self.table_name, count = memes.len(), "DynamoDB: Listed memes");
        Ok(memes)
    }

    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Meme>, RepoError> {
        let mut memes = self.list_all().await?;
        memes.retain(|meme| meme.owner_id == owner_id);
        Ok(memes)
    }

    async fn next_owner_seq(&self, owner_id: i64) -> Result<i64, RepoError> {
        next_counter_value(
            &self.client,
            &self.counters_table,
            &owner_memes_counter(owner_id),
        )
        .await
    }
}

// --- Item codecs ---
// Manual AttributeValue mapping in both directions. Optional fields are
// simply absent from the item; numeric defaults tolerate missing
// attributes so old rows keep parsing.

fn read_count(item: &HashMap<String, AttributeValue>, name: &str) -> i64 {
    item.get(name)
        .and_then(|value| value.as_n().ok())
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0)
}

fn string_list(item: &HashMap<String, AttributeValue>, name: &str) -> Vec<String> {
    item.get(name)
        .and_then(|value| value.as_l().ok())
        .map(|values| {
            values
                .iter()
                .filter_map(|value| value.as_s().ok().cloned())
                .collect()
        })
        .unwrap_or_default()
}

fn user_to_item(user: &User) -> Result<HashMap<String, AttributeValue>, RepoError> {
    let mut item = HashMap::new();
    item.insert(
        "user_id".to_string(),
        AttributeValue::N(user.id.to_string()),
    );
    item.insert("email".to_string(), AttributeValue::S(user.email.clone()));
    item.insert(
        "username".to_string(),
        AttributeValue::S(user.username.clone()),
    );
    item.insert(
        "password_hash".to_string(),
        AttributeValue::S(user.password_hash.clone()),
    );
    if let Some(avatar_url) = &user.avatar_url {
        item.insert(
            "avatar_url".to_string(),
            AttributeValue::S(avatar_url.clone()),
        );
    }
    item.insert(
        "interests".to_string(),
        AttributeValue::L(
            user.interests
                .iter()
                .map(|interest| AttributeValue::S(interest.clone()))
                .collect(),
        ),
    );
    item.insert(
        "is_registered".to_string(),
        AttributeValue::Bool(user.is_registered),
    );
    item.insert(
        "is_verified".to_string(),
        AttributeValue::Bool(user.is_verified),
    );
    if let Some(settings) = &user.settings {
        let raw = serde_json::to_string(settings)
            .context("Failed to serialize user settings")
            .map_err(RepoError::BackendError)?;
        item.insert("settings".to_string(), AttributeValue::S(raw));
    }
    item.insert(
        "followers_count".to_string(),
        AttributeValue::N(user.followers_count.to_string()),
    );
    item.insert(
        "following_count".to_string(),
        AttributeValue::N(user.following_count.to_string()),
    );
    item.insert(
        "likes_count".to_string(),
        AttributeValue::N(user.likes_count.to_string()),
    );
    Ok(item)
}

fn item_to_user(item: &HashMap<String, AttributeValue>) -> Option<User> {
    let id = item.get("user_id")?.as_n().ok()?.parse().ok()?;
    let email = item.get("email")?.as_s().ok()?.to_string();
    let username = item.get("username")?.as_s().ok()?.to_string();
    let password_hash = item.get("password_hash")?.as_s().ok()?.to_string();
    let avatar_url = item
        .get("avatar_url")
        .and_then(|value| value.as_s().ok())
        .cloned();
    let is_registered = item
        .get("is_registered")
        .and_then(|value| value.as_bool().ok())
        .copied()
        .unwrap_or(true);
    let is_verified = item
        .get("is_verified")
        .and_then(|value| value.as_bool().ok())
        .copied()
        .unwrap_or(false);
    let settings = item
        .get("settings")
        .and_then(|value| value.as_s().ok())
        .and_then(|raw| serde_json::from_str::<UserSettings>(raw).ok());

    Some(User {
        id,
        email,
        username,
        password_hash,
        avatar_url,
        interests: string_list(item, "interests"),
        is_registered,
        is_verified,
        settings,
        followers_count: read_count(item, "followers_count"),
        following_count: read_count(item, "following_count"),
        likes_count: read_count(item, "likes_count"),
    })
}

fn meme_to_item(meme: &Meme) -> HashMap<String, AttributeValue> {
    let mut item = HashMap::new();
    item.insert(
        "meme_id".to_string(),
        AttributeValue::N(meme.id.to_string()),
    );
    item.insert(
        "owner_id".to_string(),
        AttributeValue::N(meme.owner_id.to_string()),
    );
    item.insert(
        "image_url".to_string(),
        AttributeValue::S(meme.image_url.clone()),
    );
    if let Some(title) = &meme.title {
        item.insert("title".to_string(), AttributeValue::S(title.clone()));
    }
    if let Some(description) = &meme.description {
        item.insert(
            "description".to_string(),
            AttributeValue::S(description.clone()),
        );
    }
    item.insert(
        "width".to_string(),
        AttributeValue::N(meme.width.to_string()),
    );
    item.insert(
        "height".to_string(),
        AttributeValue::N(meme.height.to_string()),
    );
    item.insert(
        "created_at".to_string(),
        AttributeValue::S(meme.created_at.to_rfc3339()),
    );
    item.insert(
        "likes".to_string(),
        AttributeValue::N(meme.likes.to_string()),
    );
    item.insert(
        "tags".to_string(),
        AttributeValue::L(
            meme.tags
                .iter()
                .map(|tag| AttributeValue::S(tag.clone()))
                .collect(),
        ),
    );
    item.insert(
        "is_featured".to_string(),
        AttributeValue::Bool(meme.is_featured),
    );
    item
}

fn item_to_meme(item: &HashMap<String, AttributeValue>) -> Option<Meme> {
    let id = item.get("meme_id")?.as_n().ok()?.parse().ok()?;
    let owner_id = item.get("owner_id")?.as_n().ok()?.parse().ok()?;
    let image_url = item.get("image_url")?.as_s().ok()?.to_string();
    let title = item
        .get("title")
        .and_then(|value| value.as_s().ok())
        .cloned();
    let description = item
        .get("description")
        .and_then(|value| value.as_s().ok())
        .cloned();
    let width = item.get("width")?.as_n().ok()?.parse().ok()?;
    let height = item.get("height")?.as_n().ok()?.parse().ok()?;
    let created_at = DateTime::parse_from_rfc3339(item.get("created_at")?.as_s().ok()?)
        .ok()?
        .with_timezone(&Utc);
    let is_featured = item
        .get("is_featured")
        .and_then(|value| value.as_bool().ok())
        .copied()
        .unwrap_or(false);

    Some(Meme {
        id,
        image_url,
        title,
        description,
        width,
        height,
        owner_id,
        created_at,
        likes: read_count(item, "likes"),
        tags: string_list(item, "tags"),
        is_featured,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationSettings, PrivacySettings};
    use chrono::TimeZone;

    fn sample_user() -> User {
        User {
            id: 7,
            email: "alice@example.com".to_string(),
            username: "alice".to_string(),
            password_hash: "digest".to_string(),
            avatar_url: Some("http://localhost:3000/static/avatars/7_x.png".to_string()),
            interests: vec!["cats".to_string(), "rust".to_string()],
            is_registered: true,
            is_verified: true,
            settings: Some(UserSettings {
                notifications: NotificationSettings {
                    likes: true,
                    messages: false,
                    memes: true,
                },
                privacy: PrivacySettings {
                    messages: "everyone".to_string(),
                    memes: "friends".to_string(),
                },
                theme: "dark".to_string(),
            }),
            followers_count: 3,
            following_count: 1,
            likes_count: 12,
        }
    }

    fn sample_meme() -> Meme {
        Meme {
            id: 42,
            image_url: "http://localhost:3000/static/memes/1_y.png".to_string(),
            title: Some("title".to_string()),
            description: None,
            width: 480,
            height: 320,
            owner_id: 7,
            created_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap(),
            likes: 2,
            tags: vec!["#cat".to_string()],
            is_featured: true,
        }
    }

    #[test]
    fn user_item_round_trip() {
        let user = sample_user();
        let item = user_to_item(&user).unwrap();
        let parsed = item_to_user(&item).unwrap();

        assert_eq!(parsed.id, user.id);
        assert_eq!(parsed.email, user.email);
        assert_eq!(parsed.username, user.username);
        assert_eq!(parsed.password_hash, user.password_hash);
        assert_eq!(parsed.avatar_url, user.avatar_url);
        assert_eq!(parsed.interests, user.interests);
        assert_eq!(parsed.is_verified, user.is_verified);
        assert_eq!(parsed.settings, user.settings);
        assert_eq!(parsed.followers_count, user.followers_count);
    }

    #[test]
    fn user_item_omits_absent_optionals() {
        let mut user = sample_user();
        user.avatar_url = None;
        user.settings = None;

        let item = user_to_item(&user).unwrap();
        assert!(!item.contains_key("avatar_url"));
        assert!(!item.contains_key("settings"));

        let parsed = item_to_user(&item).unwrap();
        assert_eq!(parsed.avatar_url, None);
        assert_eq!(parsed.settings, None);
    }

    #[test]
    fn user_item_missing_required_field_fails() {
        let user = sample_user();
        let mut item = user_to_item(&user).unwrap();
        item.remove("email");
        assert!(item_to_user(&item).is_none());
    }

    #[test]
    fn meme_item_round_trip() {
        let meme = sample_meme();
        let item = meme_to_item(&meme);
        let parsed = item_to_meme(&item).unwrap();

        assert_eq!(parsed.id, meme.id);
        assert_eq!(parsed.image_url, meme.image_url);
        assert_eq!(parsed.title, meme.title);
        assert_eq!(parsed.description, None);
        assert_eq!(parsed.width, meme.width);
        assert_eq!(parsed.height, meme.height);
        assert_eq!(parsed.owner_id, meme.owner_id);
        assert_eq!(parsed.created_at, meme.created_at);
        assert_eq!(parsed.likes, meme.likes);
        assert_eq!(parsed.tags, meme.tags);
        assert!(parsed.is_featured);
    }

    #[test]
    fn meme_item_bad_timestamp_fails() {
        let meme = sample_meme();
        let mut item = meme_to_item(&meme);
        item.insert(
            "created_at".to_string(),
            AttributeValue::S("yesterday".to_string()),
        );
        assert!(item_to_meme(&item).is_none());
    }
}
