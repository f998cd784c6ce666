use std::future::Future;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::types::Json;
use tracing::info;

use super::model::*;
use super::repo::*;

const MOVIE_COLUMNS: &str =
    "imdb_id, title, poster_path, youtube_id, genre, admin_review, ranking_value, ranking_name";

const USER_COLUMNS: &str = "user_id, first_name, last_name, email, password, role, \
     favourite_genres, token, refresh_token, created_at, updated_at";

pub struct SqliteRepository {
    pool: SqlitePool,
    timeout: Duration,
}

impl SqliteRepository {
    pub async fn new(db_path: &str, timeout: Duration) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(db_path)?.create_if_missing(true);

        // An in-memory database lives exactly as long as its connection.
        let pool = if db_path.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(5)
                .connect_with(options)
                .await?
        };

        let repo = Self { pool, timeout };

        repo.init_schema().await?;

        info!("Database initialized at {}", db_path);

        Ok(repo)
    }

    async fn init_schema(&self) -> DbResult<()> {
        let schema = include_str!("schema.sql");
        sqlx::raw_sql(schema).execute(&self.pool).await?;
        Ok(())
    }

    /// Run one store operation under the configured deadline.
    async fn deadline<T, F>(&self, what: &str, fut: F) -> DbResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(|e| match e {
                sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                    DbError::AlreadyExists(what.to_string())
                }
                _ => DbError::Sqlx(e),
            }),
            Err(_) => Err(DbError::Timeout(what.to_string())),
        }
    }
}

#[async_trait]
impl UserRepo for SqliteRepository {
    async fn get_user_by_email(&self, email: &str) -> DbResult<User> {
        let query = format!("SELECT {} FROM users WHERE email = ?", USER_COLUMNS);
        self.deadline(
            "get user by email",
            sqlx::query_as::<_, User>(&query)
                .bind(email)
                .fetch_optional(&self.pool),
        )
        .await?
        .ok_or_else(|| DbError::NotFound(format!("User not found: {}", email)))
    }

    async fn get_user_by_id(&self, id: &str) -> DbResult<User> {
        let query = format!("SELECT {} FROM users WHERE user_id = ?", USER_COLUMNS);
        self.deadline(
            "get user by id",
            sqlx::query_as::<_, User>(&query)
                .bind(id)
                .fetch_optional(&self.pool),
        )
        .await?
        .ok_or_else(|| DbError::NotFound(format!("User not found: {}", id)))
    }

    async fn count_users_by_email(&self, email: &str) -> DbResult<i64> {
        let (count,) = self
            .deadline(
                "count users",
                sqlx::query_as::<_, (i64,)>("SELECT COUNT(*) FROM users WHERE email = ?")
                    .bind(email)
                    .fetch_one(&self.pool),
            )
            .await?;
        Ok(count)
    }

    async fn insert_user(&self, user: &User) -> DbResult<()> {
        let query = format!(
            "INSERT INTO users ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            USER_COLUMNS
        );
        self.deadline(
            "insert user",
            sqlx::query(&query)
                .bind(&user.user_id)
                .bind(&user.first_name)
                .bind(&user.last_name)
                .bind(&user.email)
                .bind(&user.password)
                .bind(user.role)
                .bind(Json(&user.favourite_genres))
                .bind(&user.token)
                .bind(&user.refresh_token)
                .bind(user.created_at)
                .bind(user.updated_at)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn update_tokens(
        &self,
        user_id: &str,
        token: &str,
        refresh_token: &str,
        updated_at: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = self
            .deadline(
                "update tokens",
                sqlx::query(
                    "UPDATE users SET token = ?, refresh_token = ?, updated_at = ? WHERE user_id = ?",
                )
                .bind(token)
                .bind(refresh_token)
                .bind(updated_at)
                .bind(user_id)
                .execute(&self.pool),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("User not found: {}", user_id)));
        }
        Ok(())
    }
}

#[async_trait]
impl MovieRepo for SqliteRepository {
    async fn list_movies(&self, genre: Option<&str>) -> DbResult<Vec<Movie>> {
        match genre {
            Some(genre) => {
                let query = format!(
                    "SELECT {} FROM movies
                     WHERE EXISTS (
                        SELECT 1 FROM json_each(movies.genre) AS g
                        WHERE json_extract(g.value, '$.genre_name') = ?
                     )
                     ORDER BY rowid",
                    MOVIE_COLUMNS
                );
                self.deadline(
                    "list movies by genre",
                    sqlx::query_as::<_, Movie>(&query)
                        .bind(genre)
                        .fetch_all(&self.pool),
                )
                .await
            }
            None => {
                let query = format!("SELECT {} FROM movies ORDER BY rowid", MOVIE_COLUMNS);
                self.deadline(
                    "list movies",
                    sqlx::query_as::<_, Movie>(&query).fetch_all(&self.pool),
                )
                .await
            }
        }
    }

    async fn get_movie(&self, imdb_id: &str) -> DbResult<Movie> {
        let query = format!("SELECT {} FROM movies WHERE imdb_id = ?", MOVIE_COLUMNS);
        self.deadline(
            "get movie",
            sqlx::query_as::<_, Movie>(&query)
                .bind(imdb_id)
                .fetch_optional(&self.pool),
        )
        .await?
        .ok_or_else(|| DbError::NotFound(format!("Movie not found: {}", imdb_id)))
    }

    async fn insert_movie(&self, movie: &Movie) -> DbResult<()> {
        let query = format!(
            "INSERT INTO movies ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            MOVIE_COLUMNS
        );
        self.deadline(
            "insert movie",
            sqlx::query(&query)
                .bind(&movie.imdb_id)
                .bind(&movie.title)
                .bind(&movie.poster_path)
                .bind(&movie.youtube_id)
                .bind(Json(&movie.genre))
                .bind(&movie.admin_review)
                .bind(movie.ranking.ranking_value)
                .bind(&movie.ranking.ranking_name)
                .execute(&self.pool),
        )
        .await?;
        Ok(())
    }

    async fn update_review(&self, imdb_id: &str, review: &str, ranking: &Ranking) -> DbResult<()> {
        let result = self
            .deadline(
                "update review",
                sqlx::query(
                    "UPDATE movies SET admin_review = ?, ranking_value = ?, ranking_name = ?
                     WHERE imdb_id = ?",
                )
                .bind(review)
                .bind(ranking.ranking_value)
                .bind(&ranking.ranking_name)
                .bind(imdb_id)
                .execute(&self.pool),
            )
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Movie not found: {}", imdb_id)));
        }
        Ok(())
    }

    async fn recommended_movies(&self, genres: &[String], limit: u32) -> DbResult<Vec<Movie>> {
        if genres.is_empty() {
            return Ok(Vec::new());
        }
        // SQLite treats a negative LIMIT as "no limit".
        let limit: i64 = if limit == 0 { -1 } else { i64::from(limit) };
        let query = format!(
            "SELECT {} FROM movies
             WHERE EXISTS (
                SELECT 1 FROM json_each(movies.genre) AS g
                WHERE json_extract(g.value, '$.genre_name') IN (SELECT value FROM json_each(?))
             )
             ORDER BY ranking_value ASC, rowid ASC
             LIMIT ?",
            MOVIE_COLUMNS
        );
        self.deadline(
            "recommended movies",
            sqlx::query_as::<_, Movie>(&query)
                .bind(Json(genres))
                .bind(limit)
                .fetch_all(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl GenreRepo for SqliteRepository {
    async fn list_genres(&self) -> DbResult<Vec<Genre>> {
        self.deadline(
            "list genres",
            sqlx::query_as::<_, Genre>("SELECT genre_id, genre_name FROM genres ORDER BY genre_id")
                .fetch_all(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl RankingRepo for SqliteRepository {
    async fn list_rankings(&self) -> DbResult<Vec<Ranking>> {
        self.deadline(
            "list rankings",
            sqlx::query_as::<_, Ranking>(
                "SELECT ranking_value, ranking_name FROM rankings ORDER BY ranking_value",
            )
            .fetch_all(&self.pool),
        )
        .await
    }
}

#[async_trait]
impl Repository for SqliteRepository {
    async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_repo() -> SqliteRepository {
        SqliteRepository::new("sqlite::memory:", Duration::from_secs(5))
            .await
            .unwrap()
    }

    fn genre(id: i64, name: &str) -> Genre {
        Genre {
            genre_id: id,
            genre_name: name.to_string(),
        }
    }

    fn movie(imdb_id: &str, genres: Vec<Genre>, rank: i64) -> Movie {
        Movie {
            imdb_id: imdb_id.to_string(),
            title: format!("Movie {}", imdb_id),
            poster_path: "https://example.com/poster.jpg".to_string(),
            youtube_id: "abc123".to_string(),
            genre: genres,
            admin_review: String::new(),
            ranking: Ranking {
                ranking_value: rank,
                ranking_name: "Good".to_string(),
            },
        }
    }

    fn user(id: &str, email: &str) -> User {
        let now = Utc::now();
        User {
            user_id: id.to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            password: "hash".to_string(),
            role: Role::User,
            favourite_genres: vec![genre(2, "Drama")],
            token: String::new(),
            refresh_token: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_seed_data() {
        let repo = memory_repo().await;
        let rankings = repo.list_rankings().await.unwrap();
        assert_eq!(rankings.len(), 6);
        assert_eq!(rankings[0].ranking_name, "Excellent");
        assert_eq!(rankings[5].ranking_value, NOT_RANKED_VALUE);

        let genres = repo.list_genres().await.unwrap();
        assert_eq!(genres.len(), 9);
        assert_eq!(genres[0], genre(1, "Comedy"));
    }

    #[tokio::test]
    async fn test_user_roundtrip_and_unique_email() {
        let repo = memory_repo().await;
        repo.insert_user(&user("u1", "a@x.com")).await.unwrap();

        let found = repo.get_user_by_email("a@x.com").await.unwrap();
        assert_eq!(found.user_id, "u1");
        assert_eq!(found.role, Role::User);
        assert_eq!(found.favourite_genres, vec![genre(2, "Drama")]);
        assert_eq!(repo.count_users_by_email("a@x.com").await.unwrap(), 1);

        let dup = repo.insert_user(&user("u2", "a@x.com")).await;
        assert!(matches!(dup, Err(DbError::AlreadyExists(_))));

        assert!(matches!(
            repo.get_user_by_id("nope").await,
            Err(DbError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_update_tokens() {
        let repo = memory_repo().await;
        repo.insert_user(&user("u1", "a@x.com")).await.unwrap();

        repo.update_tokens("u1", "access", "refresh", Utc::now())
            .await
            .unwrap();
        let found = repo.get_user_by_id("u1").await.unwrap();
        assert_eq!(found.token, "access");
        assert_eq!(found.refresh_token, "refresh");

        repo.update_tokens("u1", "", "", Utc::now()).await.unwrap();
        let found = repo.get_user_by_id("u1").await.unwrap();
        assert!(found.token.is_empty());
        assert!(found.refresh_token.is_empty());

        let missing = repo.update_tokens("ghost", "", "", Utc::now()).await;
        assert!(matches!(missing, Err(DbError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_movies_and_recommendations() {
        let repo = memory_repo().await;
        repo.insert_movie(&movie("tt1", vec![genre(2, "Drama")], 3))
            .await
            .unwrap();
        repo.insert_movie(&movie("tt2", vec![genre(7, "Action"), genre(2, "Drama")], 1))
            .await
            .unwrap();
        repo.insert_movie(&movie("tt3", vec![genre(1, "Comedy")], 2))
            .await
            .unwrap();

        assert!(matches!(
            repo.insert_movie(&movie("tt1", vec![], 1)).await,
            Err(DbError::AlreadyExists(_))
        ));

        assert_eq!(repo.list_movies(None).await.unwrap().len(), 3);
        let dramas = repo.list_movies(Some("Drama")).await.unwrap();
        assert_eq!(dramas.len(), 2);

        let recommended = repo
            .recommended_movies(&["Drama".to_string()], 0)
            .await
            .unwrap();
        let ids: Vec<&str> = recommended.iter().map(|m| m.imdb_id.as_str()).collect();
        assert_eq!(ids, vec!["tt2", "tt1"]);

        let limited = repo
            .recommended_movies(&["Drama".to_string(), "Comedy".to_string()], 2)
            .await
            .unwrap();
        let ids: Vec<&str> = limited.iter().map(|m| m.imdb_id.as_str()).collect();
        assert_eq!(ids, vec!["tt2", "tt3"]);

        assert!(repo.recommended_movies(&[], 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_review() {
        let repo = memory_repo().await;
        repo.insert_movie(&movie("tt1", vec![genre(2, "Drama")], 999))
            .await
            .unwrap();

        let ranking = Ranking {
            ranking_value: 1,
            ranking_name: "Excellent".to_string(),
        };
        repo.update_review("tt1", "A masterpiece", &ranking)
            .await
            .unwrap();
        let found = repo.get_movie("tt1").await.unwrap();
        assert_eq!(found.admin_review, "A masterpiece");
        assert_eq!(found.ranking, ranking);

        assert!(matches!(
            repo.update_review("tt404", "meh", &ranking).await,
            Err(DbError::NotFound(_))
        ));
    }
}
