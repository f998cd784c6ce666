use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::model::*;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> DbResult<User>;
    async fn get_user_by_id(&self, id: &str) -> DbResult<User>;
    async fn count_users_by_email(&self, email: &str) -> DbResult<i64>;
    async fn insert_user(&self, user: &User) -> DbResult<()>;
    /// Overwrite the stored token pair of a user in one statement.
    async fn update_tokens(
        &self,
        user_id: &str,
        token: &str,
        refresh_token: &str,
        updated_at: DateTime<Utc>,
    ) -> DbResult<()>;
}

#[async_trait]
pub trait MovieRepo: Send + Sync {
    async fn list_movies(&self, genre: Option<&str>) -> DbResult<Vec<Movie>>;
    async fn get_movie(&self, imdb_id: &str) -> DbResult<Movie>;
    async fn insert_movie(&self, movie: &Movie) -> DbResult<()>;
    async fn update_review(&self, imdb_id: &str, review: &str, ranking: &Ranking) -> DbResult<()>;
    /// Movies sharing any of `genres`, best ranked first. A `limit` of 0 means no limit.
    async fn recommended_movies(&self, genres: &[String], limit: u32) -> DbResult<Vec<Movie>>;
}

#[async_trait]
pub trait GenreRepo: Send + Sync {
    async fn list_genres(&self) -> DbResult<Vec<Genre>>;
}

#[async_trait]
pub trait RankingRepo: Send + Sync {
    async fn list_rankings(&self) -> DbResult<Vec<Ranking>>;
}

#[async_trait]
pub trait Repository: UserRepo + MovieRepo + GenreRepo + RankingRepo + Send + Sync {
    /// Release the underlying connections.
    async fn close(&self);
}
