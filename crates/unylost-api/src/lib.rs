pub mod admin;
pub mod ai_layer;
pub mod auth;
pub mod categories;
pub mod claims;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod found_items;
pub mod lost_items;
pub mod middleware;
pub mod notify;
pub mod state;
pub mod storage;
pub mod sync;
pub mod upload;
pub mod validation;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};

use crate::middleware::{require_admin, require_auth};
use crate::state::AppState;

/// Five images at the per-file limit plus the text fields.
const BODY_LIMIT: usize = 26 * 1024 * 1024;

/// The full HTTP API: `GET /` health text plus every resource under `/api`.
/// Static uploads, CORS and tracing are layered on by the binary.
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .nest("/auth", auth_routes(&state))
        .nest("/categories", category_routes(&state))
        .nest("/found-items", found_item_routes(&state))
        .nest("/lost-items", lost_item_routes(&state))
        .nest("/claims", claim_routes(&state))
        .nest("/admin", admin_routes(&state))
        .nest("/dashboard", dashboard_routes(&state));

    Router::new()
        .route("/", get(|| async { "UNYLost API is running" }))
        .nest("/api", api)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

fn authenticated(state: &AppState, routes: Router<AppState>) -> Router<AppState> {
    routes.route_layer(from_fn_with_state(state.clone(), require_auth))
}

fn admin_only(state: &AppState, routes: Router<AppState>) -> Router<AppState> {
    authenticated(state, routes.route_layer(from_fn(require_admin)))
}

fn auth_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/verify-email", post(auth::verify_email))
        .route("/verify/{token}", get(auth::verify_token))
        .route("/verify-whatsapp", post(auth::verify_whatsapp))
        .route("/forgot-password", post(auth::forgot_password))
        .route("/reset-password/{token}", post(auth::reset_password));

    let user = Router::new().route("/me", get(auth::me));

    public.merge(authenticated(state, user))
}

fn category_routes(state: &AppState) -> Router<AppState> {
    let user = Router::new()
        .route("/", get(categories::list))
        .route("/{id}", get(categories::get));

    let admin = Router::new()
        .route("/", post(categories::create))
        .route("/{id}", put(categories::update).delete(categories::delete));

    authenticated(state, user).merge(admin_only(state, admin))
}

fn found_item_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new().route("/{id}", get(found_items::get));

    let user = Router::new()
        .route("/", post(found_items::create))
        .route("/my-items", get(found_items::my_items))
        .route("/find-matches", post(found_items::find_matches))
        .route("/{id}", put(found_items::update).delete(found_items::delete))
        .route("/{id}/images", post(found_items::add_images))
        .route("/{id}/images/{image_id}", axum::routing::delete(found_items::delete_image))
        .route("/{id}/images/{image_id}/primary", put(found_items::set_primary_image));

    let admin = Router::new()
        .route("/", get(found_items::list))
        .route("/search", get(found_items::search))
        .route("/user/{id}", get(found_items::by_user))
        .route("/category/{id}", get(found_items::by_category))
        .route("/{id}/status", put(found_items::update_status));

    public
        .merge(authenticated(state, user))
        .merge(admin_only(state, admin))
}

fn lost_item_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(lost_items::list))
        .route("/search", get(lost_items::search))
        .route("/category/{id}", get(lost_items::by_category))
        .route("/{id}", get(lost_items::get));

    let user = Router::new()
        .route("/", post(lost_items::create))
        .route("/my-items", get(lost_items::my_items))
        .route("/find-matches", post(lost_items::find_matches))
        .route("/{id}", put(lost_items::update).delete(lost_items::delete))
        .route("/{id}/matches", get(lost_items::matches))
        .route("/{id}/status", put(lost_items::update_status));

    let admin = Router::new().route("/user/{id}", get(lost_items::by_user));

    public
        .merge(authenticated(state, user))
        .merge(admin_only(state, admin))
}

fn claim_routes(state: &AppState) -> Router<AppState> {
    let user = Router::new()
        .route("/", post(claims::create))
        .route("/my-claims", get(claims::my_claims))
        .route("/item/{id}", get(claims::by_item))
        .route("/{id}", get(claims::get));

    let admin = Router::new()
        .route("/", get(claims::list))
        .route("/user/{id}", get(claims::by_user))
        .route("/{id}/status", put(claims::update_status));

    authenticated(state, user).merge(admin_only(state, admin))
}

fn admin_routes(state: &AppState) -> Router<AppState> {
    let admin = Router::new()
        .route("/users", get(admin::list_users))
        .route("/users/{id}", get(admin::get_user))
        .route("/users/{id}/role", put(admin::update_role))
        .route("/dashboard", get(admin::dashboard))
        .route("/sync-lost-items", post(admin::sync_lost_items));

    admin_only(state, admin)
}

fn dashboard_routes(state: &AppState) -> Router<AppState> {
    authenticated(state, Router::new().route("/user-statistics", get(dashboard::user_statistics)))
}
