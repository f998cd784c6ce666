use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::db::{Genre, Movie, Ranking, NOT_RANKED_VALUE};

#[derive(Debug, Deserialize, Validate)]
pub struct NewMovie {
    #[validate(length(min = 1))]
    pub imdb_id: String,
    #[validate(length(min = 2, max = 500))]
    pub title: String,
    #[validate(url)]
    pub poster_path: String,
    #[validate(length(min = 1))]
    pub youtube_id: String,
    #[validate(length(min = 1))]
    pub genre: Vec<Genre>,
    #[serde(default)]
    pub admin_review: String,
    #[serde(default)]
    pub ranking: Option<Ranking>,
}

impl From<NewMovie> for Movie {
    fn from(m: NewMovie) -> Self {
        Movie {
            imdb_id: m.imdb_id,
            title: m.title,
            poster_path: m.poster_path,
            youtube_id: m.youtube_id,
            genre: m.genre,
            admin_review: m.admin_review,
            ranking: m.ranking.unwrap_or_else(|| Ranking {
                ranking_value: NOT_RANKED_VALUE,
                ranking_name: "Not_Ranked".to_string(),
            }),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct MovieFilter {
    #[serde(default)]
    pub genre: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InsertResult {
    pub inserted_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(length(min = 1))]
    pub admin_review: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReviewResponse {
    pub ranking_name: String,
    pub admin_review: String,
}
