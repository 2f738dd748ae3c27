use crate::errors::{RepoError, StorageError};
use crate::models::{Meme, NewMeme, NewUser, User};
use async_trait::async_trait;

/// Trait defining operations for storing and retrieving user accounts.
#[async_trait]
pub trait UserRepository: Send + Sync + 'static {
    /// Persists a new user under a freshly allocated id and returns the
    /// stored record.
    async fn insert(&self, new_user: NewUser) -> Result<User, RepoError>;

    /// Retrieves a user by id. Returns Ok(None) if the user is not found.
    async fn get_by_id(&self, id: i64) -> Result<Option<User>, RepoError>;

    /// Looks a user up by email, case-insensitively.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepoError>;

    /// Looks a user up by exact username. Uniqueness checks use this.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, RepoError>;

    /// Case-insensitive existence probe on username, for the availability
    /// check endpoint.
    async fn username_exists(&self, username: &str) -> Result<bool, RepoError>;

    /// Lists all users.
    /// WARNING: This can be inefficient on large datasets. Consider pagination.
    async fn list_all(&self) -> Result<Vec<User>, RepoError>;

    /// Overwrites the stored record for an existing user.
    async fn update(&self, user: &User) -> Result<(), RepoError>;
}

/// Trait defining operations for storing and retrieving meme metadata.
#[async_trait]
pub trait MemeRepository: Send + Sync + 'static {
    /// Persists a new meme under a freshly allocated id with a
    /// server-assigned creation timestamp.
    async fn insert(&self, new_meme: NewMeme) -> Result<Meme, RepoError>;

    /// Retrieves a meme by id. Returns Ok(None) if the meme is not found.
    async fn get_by_id(&self, id: i64) -> Result<Option<Meme>, RepoError>;

    /// Lists all memes.
    /// WARNING: This can be inefficient on large datasets. Consider pagination.
    async fn list_all(&self) -> Result<Vec<Meme>, RepoError>;

    /// Lists the memes owned by one user, in no particular order.
    async fn list_by_owner(&self, owner_id: i64) -> Result<Vec<Meme>, RepoError>;

    /// Atomically increments and returns the owner's meme sequence number.
    /// The Nth call for an owner returns N, concurrent callers included.
    async fn next_owner_seq(&self, owner_id: i64) -> Result<i64, RepoError>;
}

/// Trait defining operations for storing and retrieving file data
/// (avatars and meme images).
#[async_trait]
pub trait FileStorage: Send + Sync + 'static {
    /// Uploads file data to the storage backend.
    async fn upload(
        &self,
        key: &str,
        data: Vec<u8>,
        content_type: Option<String>,
    ) -> Result<(), StorageError>;

    /// Downloads file data and its content type from the storage backend.
    async fn download(&self, key: &str) -> Result<(Vec<u8>, Option<String>), StorageError>;
}
