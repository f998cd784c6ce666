pub mod classifier;
pub mod handlers;
pub mod ranking;
pub mod types;

pub use classifier::{Classifier, ClassifierError, OpenAiClassifier};
pub use handlers::*;
pub use types::*;
