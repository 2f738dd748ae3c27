use crate::{
    auth::AuthUser,
    errors::AppError,
    models::{DEFAULT_MEME_HEIGHT, DEFAULT_MEME_WIDTH, Meme, NewMeme, NewUser, User, UserSettings},
    search,
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

// --- Request/response shapes ---

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub interests: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: String,
    pub user: User,
}

#[derive(Debug, Deserialize)]
pub struct CheckEmailQuery {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckUsernameQuery {
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct ExistsResponse {
    pub exists: bool,
}

#[derive(Debug, Deserialize)]
pub struct UpdateUsernameRequest {
    pub username: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEmailRequest {
    pub current_email: String,
    pub new_email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct UserUpdateResponse {
    pub message: String,
    pub user: User,
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub avatar_url: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct UserMemesQuery {
    #[serde(rename = "type", default = "default_meme_kind")]
    pub kind: String,
}

fn default_meme_kind() -> String {
    "created".to_string()
}

#[derive(Debug, Serialize)]
pub struct UserMemesResponse {
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub memes: Vec<Meme>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

// --- Authentication ---

pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    // Emails are canonicalized to lowercase at every write.
    let email = body.email.to_lowercase();
    if state.user_repo.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }

    // Username uniqueness is deliberately not checked here; only the
    // update-username path enforces it.
    let user = state
        .user_repo
        .insert(NewUser {
            email,
            username: body.username,
            password_hash: state.password_hasher.hash(&body.password),
            interests: body.interests,
        })
        .await?;

    let access_token = state.token_service.issue(user.id)?;
    tracing::info!(user_id = user.id, "User registered");

    Ok(Json(AuthResponse {
        access_token,
        token_type: "bearer".to_string(),
        user,
    }))
}

pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AppError> {
    let user = state
        .user_repo
        .find_by_email(&body.email)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if !state
        .password_hasher
        .verify(&body.password, &user.password_hash)
    {
        return Err(AppError::Unauthorized("Invalid credentials".to_string()));
    }

    let access_token = state.token_service.issue(user.id)?;
    tracing::debug!(user_id = user.id, "User logged in");

    Ok(Json(AuthResponse {
        access_token,
        token_type: "bearer".to_string(),
        user,
    }))
}

pub async fn check_email(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CheckEmailQuery>,
) -> Result<Json<ExistsResponse>, AppError> {
    let exists = state.user_repo.find_by_email(&query.email).await?.is_some();
    Ok(Json(ExistsResponse { exists }))
}

pub async fn check_username(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CheckUsernameQuery>,
) -> Result<Json<ExistsResponse>, AppError> {
    let exists = state.user_repo.username_exists(&query.username).await?;
    Ok(Json(ExistsResponse { exists }))
}

// --- Users ---

pub async fn current_user(AuthUser(user): AuthUser) -> Json<User> {
    Json(user)
}

pub async fn list_users(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = state.user_repo.list_all().await?;
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
) -> Result<Json<User>, AppError> {
    state
        .user_repo
        .get_by_id(user_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

// --- Profile mutations (all ownership-gated through AuthUser) ---

pub async fn update_username(
    State(state): State<Arc<AppState>>,
    AuthUser(mut user): AuthUser,
    Json(body): Json<UpdateUsernameRequest>,
) -> Result<Json<UserUpdateResponse>, AppError> {
    if let Some(existing) = state.user_repo.find_by_username(&body.username).await? {
        if existing.id != user.id {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }
    }

    user.username = body.username;
    state.user_repo.update(&user).await?;
    tracing::info!(user_id = user.id, "Username updated");

    Ok(Json(UserUpdateResponse {
        message: "Username updated successfully".to_string(),
        user,
    }))
}

pub async fn update_email(
    State(state): State<Arc<AppState>>,
    AuthUser(mut user): AuthUser,
    Json(body): Json<UpdateEmailRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if user.email.to_lowercase() != body.current_email.to_lowercase() {
        return Err(AppError::BadRequest(
            "Current email is incorrect".to_string(),
        ));
    }

    let new_email = body.new_email.to_lowercase();
    if user.email.to_lowercase() == new_email {
        return Err(AppError::BadRequest(
            "New email cannot be the same as current email".to_string(),
        ));
    }

    if let Some(existing) = state.user_repo.find_by_email(&new_email).await? {
        if existing.id != user.id {
            return Err(AppError::BadRequest("Email already registered".to_string()));
        }
    }

    user.email = new_email;
    // The new address has not been verified by anyone yet.
    user.is_verified = false;
    state.user_repo.update(&user).await?;
    tracing::info!(user_id = user.id, "Email updated");

    Ok(Json(MessageResponse {
        message: "Email updated successfully. Please verify your new email.".to_string(),
    }))
}

pub async fn update_password(
    State(state): State<Arc<AppState>>,
    AuthUser(mut user): AuthUser,
    Json(body): Json<UpdatePasswordRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if !state
        .password_hasher
        .verify(&body.current_password, &user.password_hash)
    {
        return Err(AppError::BadRequest(
            "Current password is incorrect".to_string(),
        ));
    }

    if body.new_password.chars().count() < 6 {
        return Err(AppError::BadRequest(
            "New password must be at least 6 characters long".to_string(),
        ));
    }

    if state
        .password_hasher
        .verify(&body.new_password, &user.password_hash)
    {
        return Err(AppError::BadRequest(
            "New password cannot be the same as current password".to_string(),
        ));
    }

    user.password_hash = state.password_hasher.hash(&body.new_password);
    state.user_repo.update(&user).await?;
    tracing::info!(user_id = user.id, "Password updated");

    Ok(Json(MessageResponse {
        message: "Password updated successfully".to_string(),
    }))
}

pub async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    AuthUser(mut user): AuthUser,
    mut multipart: Multipart,
) -> Result<Json<AvatarResponse>, AppError> {
    let mut avatar_filename: Option<String> = None;
    let mut avatar_content_type: Option<String> = None;
    let mut avatar_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        match field_name.as_str() {
            "avatar" => {
                avatar_filename = field.file_name().map(|s| s.to_string());
                avatar_content_type = field.content_type().map(|m| m.to_string());
                avatar_data = Some(field.bytes().await?.to_vec());
            }
            _ => tracing::debug!("Ignoring unknown multipart field: {}", field_name),
        }
    }

    let avatar_data =
        avatar_data.ok_or_else(|| AppError::MissingFormField("avatar".to_string()))?;
    if avatar_data.is_empty() {
        return Err(AppError::BadRequest(
            "avatar data cannot be empty".to_string(),
        ));
    }
    if !avatar_content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("image/"))
    {
        return Err(AppError::BadRequest("File must be an image".to_string()));
    }

    let extension = file_extension(avatar_filename.as_deref());
    let object_name = format!("{}_{}.{}", user.id, Uuid::new_v4(), extension);
    let key = format!("avatars/{object_name}");

    state
        .file_storage
        .upload(&key, avatar_data, avatar_content_type)
        .await?;

    let avatar_url = format!("{}/static/avatars/{}", state.public_base_url, object_name);
    user.avatar_url = Some(avatar_url.clone());
    state.user_repo.update(&user).await?;
    tracing::info!(user_id = user.id, "Avatar uploaded");

    Ok(Json(AvatarResponse {
        avatar_url,
        message: "Avatar uploaded successfully".to_string(),
    }))
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    AuthUser(mut user): AuthUser,
    Json(settings): Json<UserSettings>,
) -> Result<Json<MessageResponse>, AppError> {
    // Wholesale replacement; there is no partial merge.
    user.settings = Some(settings);
    state.user_repo.update(&user).await?;

    Ok(Json(MessageResponse {
        message: "Settings updated successfully".to_string(),
    }))
}

// --- Memes ---

pub async fn user_memes(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<i64>,
    Query(query): Query<UserMemesQuery>,
) -> Result<Json<UserMemesResponse>, AppError> {
    if state.user_repo.get_by_id(user_id).await?.is_none() {
        return Err(AppError::NotFound("User not found".to_string()));
    }

    let memes = if query.kind == "created" {
        let mut memes = state.meme_repo.list_by_owner(user_id).await?;
        search::newest_first(&mut memes);
        memes
    } else {
        // "saved" has no backing store yet; it reports an empty list.
        Vec::new()
    };

    Ok(Json(UserMemesResponse {
        user_id,
        kind: query.kind,
        memes,
    }))
}

pub async fn create_meme(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Meme>), AppError> {
    let mut title = None;
    let mut description = None;
    let mut tags_raw: Option<String> = None;
    let mut width_raw: Option<String> = None;
    let mut height_raw: Option<String> = None;
    let mut image_filename: Option<String> = None;
    let mut image_content_type: Option<String> = None;
    let mut image_data: Option<Vec<u8>> = None;

    while let Some(field) = multipart.next_field().await? {
        let field_name = match field.name() {
            Some(name) => name.to_string(),
            None => continue,
        };
        match field_name.as_str() {
            "title" => title = Some(field.text().await?),
            "description" => description = Some(field.text().await?),
            "tags" => tags_raw = Some(field.text().await?),
            "width" => width_raw = Some(field.text().await?),
            "height" => height_raw = Some(field.text().await?),
            "image" => {
                image_filename = field.file_name().map(|s| s.to_string());
                image_content_type = field.content_type().map(|m| m.to_string());
                image_data = Some(field.bytes().await?.to_vec());
            }
            _ => tracing::debug!("Ignoring unknown multipart field: {}", field_name),
        }
    }

    let image_data = image_data.ok_or_else(|| AppError::MissingFormField("image".to_string()))?;
    if image_data.is_empty() {
        return Err(AppError::BadRequest(
            "image data cannot be empty".to_string(),
        ));
    }
    if !image_content_type
        .as_deref()
        .is_some_and(|ct| ct.starts_with("image/"))
    {
        return Err(AppError::BadRequest("File must be an image".to_string()));
    }

    let tags = parse_tags(tags_raw.as_deref())?;
    // Bad dimensions never fail the request; they fall back to defaults.
    let width = parse_dimension(width_raw.as_deref(), DEFAULT_MEME_WIDTH);
    let height = parse_dimension(height_raw.as_deref(), DEFAULT_MEME_HEIGHT);

    let extension = file_extension(image_filename.as_deref());
    let object_name = format!("{}_{}.{}", user.id, Uuid::new_v4(), extension);
    let key = format!("memes/{object_name}");

    state
        .file_storage
        .upload(&key, image_data, image_content_type)
        .await?;
    let image_url = format!("{}/static/memes/{}", state.public_base_url, object_name);

    // The atomically incremented sequence decides the featured flag; two
    // concurrent uploads by one owner see distinct positions.
    let seq = state.meme_repo.next_owner_seq(user.id).await?;
    let meme = state
        .meme_repo
        .insert(NewMeme {
            owner_id: user.id,
            image_url,
            title,
            description,
            width,
            height,
            tags,
            is_featured: search::is_featured_position(seq),
        })
        .await?;

    tracing::info!(
        meme_id = meme.id,
        owner_id = user.id,
        featured = meme.is_featured,
        "Meme created"
    );
    Ok((StatusCode::CREATED, Json(meme)))
}

pub async fn get_meme(
    State(state): State<Arc<AppState>>,
    Path(meme_id): Path<i64>,
) -> Result<Json<Meme>, AppError> {
    state
        .meme_repo
        .get_by_id(meme_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Meme not found".to_string()))
}

// --- Search and feed ---

pub async fn search_memes(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Meme>>, AppError> {
    let memes = state.meme_repo.list_all().await?;
    Ok(Json(search::search_memes(&query.q, memes)))
}

pub async fn search_users(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<User>>, AppError> {
    let users = state.user_repo.list_all().await?;
    Ok(Json(search::search_users(&query.q, users)))
}

pub async fn featured_feed(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Meme>>, AppError> {
    let memes = state.meme_repo.list_all().await?;
    Ok(Json(search::featured_memes(memes)))
}

// --- Static files ---

pub async fn serve_avatar(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    serve_object(&state, "avatars", &filename).await
}

pub async fn serve_meme_image(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, AppError> {
    serve_object(&state, "memes", &filename).await
}

async fn serve_object(
    state: &AppState,
    prefix: &str,
    filename: &str,
) -> Result<Response, AppError> {
    let key = format!("{prefix}/{filename}");
    let (data, content_type) = state.file_storage.download(&key).await?;

    let content_type = content_type
        .or_else(|| {
            mime_guess::from_path(filename)
                .first_raw()
                .map(|s| s.to_string())
        })
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(data))
        .map_err(|e| AppError::Internal(format!("Failed to build file response: {}", e)))
}

// --- Misc ---

pub async fn root() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "message": "Meme App API is running!" }))
}

// --- Helpers ---

/// Extension of the uploaded file, defaulting to jpg when the filename
/// has none.
fn file_extension(filename: Option<&str>) -> &str {
    filename
        .and_then(|name| name.rsplit_once('.').map(|(_, ext)| ext))
        .unwrap_or("jpg")
}

/// Parses a caller-supplied dimension, falling back to the default on a
/// missing value, garbage, or zero.
fn parse_dimension(raw: Option<&str>, default: u32) -> u32 {
    raw.and_then(|value| value.trim().parse::<u32>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

/// Tags arrive as one multipart text field holding a JSON array. A blank
/// field means no tags; anything else malformed is the caller's error.
fn parse_tags(raw: Option<&str>) -> Result<Vec<String>, AppError> {
    match raw {
        None => Ok(Vec::new()),
        Some(raw) if raw.trim().is_empty() => Ok(Vec::new()),
        Some(raw) => serde_json::from_str::<Vec<String>>(raw)
            .map_err(|_| AppError::BadRequest("tags must be a JSON array of strings".to_string())),
    }
}
