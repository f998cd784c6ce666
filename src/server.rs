use axum::{
    extract::Request,
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::auth::{self, TokenService};
use crate::catalog::{self, Classifier};
use crate::config::Config;
use crate::db::Repository;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Arc<dyn Repository>,
    pub tokens: Arc<TokenService>,
    pub classifier: Arc<dyn Classifier>,
}

impl AppState {
    pub fn new(config: Config, db: Arc<dyn Repository>, classifier: Arc<dyn Classifier>) -> Self {
        let tokens = Arc::new(TokenService::new(&config.auth));
        Self {
            config: Arc::new(config),
            db,
            tokens,
            classifier,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/refresh", post(auth::refresh))
        .route("/movies", get(catalog::list_movies))
        .route("/genres", get(catalog::list_genres));

    let protected_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/movie/:imdb_id", get(catalog::get_movie))
        .route("/addmovie", post(catalog::add_movie))
        .route("/updatemovie/:imdb_id", patch(catalog::update_review))
        .route("/recommendedmovies", get(catalog::recommended_movies))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth::require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .fallback(fallback_handler)
        .layer(axum::middleware::from_fn(crate::middleware::log_request))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::PUT,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .allow_headers([header::ORIGIN, header::CONTENT_TYPE, header::AUTHORIZATION]),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback_handler(req: Request) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": format!("No route for {} {}", req.method(), req.uri().path()) })),
    )
}
