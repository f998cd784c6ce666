use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::{debug, info};
use validator::Validate;

use super::ranking::rank_review;
use super::types::*;
use crate::auth::AuthUser;
use crate::db::{DbError, Genre, Movie};
use crate::error::ApiError;
use crate::server::AppState;

fn movie_not_found(e: DbError) -> ApiError {
    match e {
        DbError::NotFound(_) => ApiError::NotFound("movie not found".to_string()),
        other => other.into(),
    }
}

pub async fn list_movies(
    State(state): State<AppState>,
    Query(filter): Query<MovieFilter>,
) -> Result<Json<Vec<Movie>>, ApiError> {
    let genre = filter.genre.as_deref().filter(|g| !g.is_empty());
    let movies = state.db.list_movies(genre).await?;
    Ok(Json(movies))
}

pub async fn get_movie(
    State(state): State<AppState>,
    Path(imdb_id): Path<String>,
) -> Result<Json<Movie>, ApiError> {
    let imdb_id = imdb_id.trim();
    if imdb_id.is_empty() {
        return Err(ApiError::BadRequest("Movie ID is required".to_string()));
    }
    let movie = state.db.get_movie(imdb_id).await.map_err(movie_not_found)?;
    Ok(Json(movie))
}

pub async fn add_movie(
    State(state): State<AppState>,
    _auth: AuthUser,
    body: Result<Json<NewMovie>, JsonRejection>,
) -> Result<(StatusCode, Json<InsertResult>), ApiError> {
    let Json(req) = body?;
    req.validate()?;

    let movie = Movie::from(req);
    state.db.insert_movie(&movie).await.map_err(|e| match e {
        DbError::AlreadyExists(_) => {
            ApiError::Conflict("Movie with this imdb_id already exists".to_string())
        }
        other => other.into(),
    })?;

    info!(imdb_id = %movie.imdb_id, "Added movie");

    Ok((
        StatusCode::CREATED,
        Json(InsertResult {
            inserted_id: movie.imdb_id,
        }),
    ))
}

/// Admin-only. The role check happens before the payload is looked at.
pub async fn update_review(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(imdb_id): Path<String>,
    body: Result<Json<ReviewRequest>, JsonRejection>,
) -> Result<Json<ReviewResponse>, ApiError> {
    if !auth.is_admin() {
        debug!(user_id = %auth.user_id, "Non-admin review update refused");
        return Err(ApiError::Forbidden(
            "Only admins can update movie reviews".to_string(),
        ));
    }

    let Json(req) = body?;
    req.validate()?;

    // Unknown movies never reach the classifier.
    state.db.get_movie(&imdb_id).await.map_err(movie_not_found)?;

    let rankings = state.db.list_rankings().await?;
    let ranking = rank_review(state.classifier.as_ref(), &rankings, &req.admin_review).await;

    state
        .db
        .update_review(&imdb_id, &req.admin_review, &ranking)
        .await
        .map_err(movie_not_found)?;

    info!(
        imdb_id = %imdb_id,
        ranking = %ranking.ranking_name,
        user_id = %auth.user_id,
        "Updated admin review"
    );

    Ok(Json(ReviewResponse {
        ranking_name: ranking.ranking_name,
        admin_review: req.admin_review,
    }))
}

pub async fn recommended_movies(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<Movie>>, ApiError> {
    let user = match state.db.get_user_by_id(&auth.user_id).await {
        Ok(user) => user,
        Err(DbError::NotFound(_)) => return Ok(Json(Vec::new())),
        Err(e) => return Err(e.into()),
    };

    let genres: Vec<String> = user
        .favourite_genres
        .into_iter()
        .map(|g| g.genre_name)
        .collect();
    if genres.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let movies = state
        .db
        .recommended_movies(&genres, state.config.recommendations.limit)
        .await?;
    Ok(Json(movies))
}

pub async fn list_genres(State(state): State<AppState>) -> Result<Json<Vec<Genre>>, ApiError> {
    Ok(Json(state.db.list_genres().await?))
}
