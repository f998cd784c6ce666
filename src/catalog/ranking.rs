use tracing::{info, warn};

use super::classifier::Classifier;
use crate::db::{Ranking, NOT_RANKED_VALUE};

/// Ranking names the classifier may choose from, in ranking order.
pub fn vocabulary(rankings: &[Ranking]) -> Vec<String> {
    rankings
        .iter()
        .filter(|r| r.ranking_value != NOT_RANKED_VALUE)
        .map(|r| r.ranking_name.clone())
        .collect()
}

/// Exact-match a label to its ranking value; anything unknown ranks 0.
pub fn rank_for_label(rankings: &[Ranking], label: &str) -> i64 {
    rankings
        .iter()
        .find(|r| r.ranking_name == label)
        .map(|r| r.ranking_value)
        .unwrap_or(0)
}

/// Classify an admin review. A classifier failure is not fatal: the review
/// ends up unranked (value 0, empty name).
pub async fn rank_review(
    classifier: &dyn Classifier,
    rankings: &[Ranking],
    review: &str,
) -> Ranking {
    let labels = vocabulary(rankings);
    match classifier.classify(review, &labels).await {
        Ok(label) => {
            let value = rank_for_label(rankings, &label);
            info!(label = %label, value, "Classified admin review");
            Ranking {
                ranking_value: value,
                ranking_name: label,
            }
        }
        Err(e) => {
            warn!("Review classification failed, leaving unranked: {}", e);
            Ranking::unranked()
        }
    }
}
