use crate::{handlers, state::AppState};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Creates the Axum router and associates routes with handlers.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        // Authentication
        .route("/register", post(handlers::register))
        .route("/login", post(handlers::login))
        .route("/check-email", get(handlers::check_email))
        .route("/check-username", get(handlers::check_username))
        // Users; static segments win over /users/{id}
        .route("/users/me", get(handlers::current_user))
        .route("/users", get(handlers::list_users))
        .route("/users/{id}", get(handlers::get_user))
        // Profile mutations, all bearer-gated
        .route("/users/update-username", put(handlers::update_username))
        .route("/users/update-email", put(handlers::update_email))
        .route("/users/update-password", put(handlers::update_password))
        .route("/users/upload-avatar", post(handlers::upload_avatar))
        .route("/users/settings", put(handlers::update_settings))
        // Memes
        .route("/users/{id}/memes", get(handlers::user_memes))
        .route("/memes", post(handlers::create_meme))
        .route("/memes/{id}", get(handlers::get_meme))
        // Search and feed
        .route("/search/memes", get(handlers::search_memes))
        .route("/search/users", get(handlers::search_users))
        .route("/feed/featured", get(handlers::featured_feed))
        // Stored files, proxied out of the bucket
        .route("/static/avatars/{filename}", get(handlers::serve_avatar))
        .route("/static/memes/{filename}", get(handlers::serve_meme_image))
        // Middleware Layers
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .with_state(state)
}
