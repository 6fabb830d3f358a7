pub mod classifier;
pub mod patterns;

pub use classifier::{
    looks_like_path, ClassificationResult, Classifier, Reason, ScoreBreakdown, TitleKind,
    DEFAULT_THRESHOLD,
};
pub use patterns::{runtime_language, AdPattern, MatchKind, PatternCatalog};
