use std::fmt;

use super::patterns::{MatchKind, PatternCatalog};
use crate::target::TargetProfile;

pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Subtracted from the pattern score when a title is shaped like "Artist - Track".
pub const MUSIC_SHAPE_PENALTY: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleKind {
    Ad,
    Content,
    Paused,
    /// Wrong-window detection (file path, executable); excluded from mute decisions.
    Indeterminate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    EmptyTitle,
    IdleTitle,
    PathLike,
    Pattern {
        pattern: String,
        language: &'static str,
        kind: MatchKind,
    },
    BelowThreshold {
        pattern: String,
    },
    NoMatch,
}

impl fmt::Display for Reason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reason::EmptyTitle => write!(f, "empty title"),
            Reason::IdleTitle => write!(f, "idle/paused title"),
            Reason::PathLike => write!(f, "looks like a file path"),
            Reason::Pattern {
                pattern,
                language,
                kind,
            } => write!(f, "{} match {pattern:?} [{language}]", kind.as_str()),
            Reason::BelowThreshold { pattern } => {
                write!(f, "matched {pattern:?} but below threshold")
            }
            Reason::NoMatch => write!(f, "no ad pattern matched"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub kind: TitleKind,
    pub is_ad: bool,
    pub confidence: f64,
    pub reason: Reason,
    pub music_penalty_applied: bool,
}

impl ClassificationResult {
    fn fixed(kind: TitleKind, confidence: f64, reason: Reason) -> Self {
        Self {
            kind,
            is_ad: kind == TitleKind::Ad,
            confidence,
            reason,
            music_penalty_applied: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BestPattern {
    pub pattern: String,
    pub language: &'static str,
    pub kind: MatchKind,
}

/// Pattern score before and after the music-shape penalty.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreBreakdown {
    pub raw: f64,
    pub looks_like_music: bool,
    pub penalized: f64,
    pub best_pattern: Option<BestPattern>,
}

pub struct Classifier {
    catalog: PatternCatalog,
    profile: TargetProfile,
    threshold: f64,
}

impl Classifier {
    pub fn new(catalog: PatternCatalog, profile: TargetProfile, threshold: f64) -> Self {
        Self {
            catalog,
            profile,
            threshold: threshold.clamp(0.0, 1.0),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn catalog(&self) -> &PatternCatalog {
        &self.catalog
    }

    pub fn classify(&self, title: &str) -> ClassificationResult {
        self.classify_with(title, self.threshold)
    }

    /// Classification against an explicit threshold. The precedence order
    /// (empty, idle, path-like, then pattern scoring) is fixed.
    pub fn classify_with(&self, title: &str, threshold: f64) -> ClassificationResult {
        let trimmed = title.trim();
        if trimmed.is_empty() {
            return ClassificationResult::fixed(TitleKind::Ad, 1.0, Reason::EmptyTitle);
        }

        if self.profile.is_idle_title(trimmed) {
            return ClassificationResult::fixed(TitleKind::Paused, 0.0, Reason::IdleTitle);
        }

        if looks_like_path(trimmed) {
            return ClassificationResult::fixed(TitleKind::Indeterminate, 0.0, Reason::PathLike);
        }

        let breakdown = self.score_breakdown(trimmed);
        let is_ad = breakdown.penalized >= threshold;
        let reason = match (&breakdown.best_pattern, is_ad) {
            (None, _) => Reason::NoMatch,
            (Some(best), false) => Reason::BelowThreshold {
                pattern: best.pattern.clone(),
            },
            (Some(best), true) => Reason::Pattern {
                pattern: best.pattern.clone(),
                language: best.language,
                kind: best.kind,
            },
        };

        ClassificationResult {
            kind: if is_ad {
                TitleKind::Ad
            } else {
                TitleKind::Content
            },
            is_ad,
            confidence: breakdown.penalized,
            reason,
            music_penalty_applied: breakdown.looks_like_music && breakdown.raw > 0.0,
        }
    }

    pub fn score_breakdown(&self, title: &str) -> ScoreBreakdown {
        let hit = self.catalog.best_match(title);
        let raw = hit.as_ref().map(|hit| hit.confidence).unwrap_or(0.0);
        let looks_like_music = self.catalog.looks_like_music(title.trim());
        let penalized = if looks_like_music {
            (raw - MUSIC_SHAPE_PENALTY).max(0.0)
        } else {
            raw
        };

        ScoreBreakdown {
            raw,
            looks_like_music,
            penalized,
            best_pattern: hit.map(|hit| BestPattern {
                pattern: hit.pattern.pattern.clone(),
                language: hit.pattern.language,
                kind: hit.pattern.kind,
            }),
        }
    }
}

/// True for titles that are really a file path or executable name, which
/// means the wrong window was picked up.
pub fn looks_like_path(title: &str) -> bool {
    const PATH_INDICATORS: &[&str] = &[":\\", ".exe", "/", "\\"];
    let lowered = title.to_lowercase();
    PATH_INDICATORS
        .iter()
        .any(|indicator| lowered.contains(indicator))
}
