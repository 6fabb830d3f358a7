use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

/// How an [`AdPattern`] is compared against a title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    /// Trimmed title equals the pattern, case-sensitive.
    Exact,
    /// Case-insensitive substring.
    Contains,
    /// Case-insensitive regex search.
    Regex,
}

impl MatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchKind::Exact => "exact",
            MatchKind::Contains => "contains",
            MatchKind::Regex => "regex",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AdPattern {
    pub pattern: String,
    /// ISO 639-1 code, or `generic` for language-neutral patterns.
    pub language: &'static str,
    pub confidence: f64,
    pub kind: MatchKind,
    compiled: Option<Regex>,
    folded: String,
}

impl AdPattern {
    fn new(pattern: &str, language: &'static str, confidence: f64, kind: MatchKind) -> Result<Self> {
        let compiled = match kind {
            MatchKind::Regex => Some(
                RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .with_context(|| format!("invalid ad pattern regex {pattern:?}"))?,
            ),
            _ => None,
        };

        Ok(Self {
            pattern: pattern.to_string(),
            language,
            confidence: confidence.clamp(0.0, 1.0),
            kind,
            compiled,
            folded: pattern.to_lowercase(),
        })
    }

    /// `title` must already be trimmed; `folded` is its lowercase form.
    fn matches(&self, title: &str, folded: &str) -> bool {
        match self.kind {
            MatchKind::Exact => title == self.pattern,
            MatchKind::Contains => folded.contains(&self.folded),
            MatchKind::Regex => self
                .compiled
                .as_ref()
                .map(|re| re.is_match(title))
                .unwrap_or(false),
        }
    }
}

/// Strongest pattern hit for a title.
#[derive(Debug, Clone)]
pub struct PatternHit<'a> {
    pub pattern: &'a AdPattern,
    pub confidence: f64,
}

type Entry = (&'static str, &'static str, f64, MatchKind);

const PATTERNS: &[Entry] = &[
    // English
    ("Advertisement", "en", 0.95, MatchKind::Exact),
    ("Spotify Free", "en", 0.90, MatchKind::Exact),
    ("Spotify Premium", "en", 0.90, MatchKind::Exact),
    ("Get Spotify Premium", "en", 0.85, MatchKind::Contains),
    // Swedish
    ("Titta nu", "sv", 0.90, MatchKind::Exact),
    ("Spotify Free", "sv", 0.85, MatchKind::Exact),
    ("Spotify Premium", "sv", 0.85, MatchKind::Exact),
    ("Lyssna utan annonser", "sv", 0.90, MatchKind::Contains),
    ("Uppgradera till Premium", "sv", 0.85, MatchKind::Contains),
    // German
    ("Werbung", "de", 0.95, MatchKind::Exact),
    ("Jetzt ansehen", "de", 0.80, MatchKind::Exact),
    // Language-neutral
    (r"^Spotify$", "generic", 0.70, MatchKind::Regex),
    (r"^\s*$", "generic", 0.85, MatchKind::Regex),
    ("Premium", "generic", 0.60, MatchKind::Contains),
    ("Free", "generic", 0.60, MatchKind::Contains),
    ("Titta nu", "generic", 0.85, MatchKind::Exact),
    ("Watch now", "generic", 0.85, MatchKind::Exact),
    ("Jetzt ansehen", "generic", 0.85, MatchKind::Exact),
    ("Regarder maintenant", "generic", 0.85, MatchKind::Exact),
    ("Ver ahora", "generic", 0.85, MatchKind::Exact),
    ("Guarda ora", "generic", 0.85, MatchKind::Exact),
    ("Bekijk nu", "generic", 0.85, MatchKind::Exact),
];

/// "Artist - Track", "Artist – Track", "Track by Artist".
const MUSIC_SHAPES: &[&str] = &[r".+\s-\s.+", r".+\s–\s.+", r".+\sby\s.+"];

/// Immutable set of ad phrases across every supported language.
#[derive(Debug)]
pub struct PatternCatalog {
    patterns: Vec<AdPattern>,
    music_shapes: Vec<Regex>,
}

impl PatternCatalog {
    pub fn new() -> Result<Self> {
        let patterns = PATTERNS
            .iter()
            .map(|(pattern, language, confidence, kind)| {
                AdPattern::new(pattern, language, *confidence, *kind)
            })
            .collect::<Result<Vec<_>>>()?;

        let music_shapes = MUSIC_SHAPES
            .iter()
            .map(|shape| Regex::new(shape).with_context(|| format!("invalid music shape {shape:?}")))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            patterns,
            music_shapes,
        })
    }

    pub fn patterns(&self) -> &[AdPattern] {
        &self.patterns
    }

    /// Patterns written for one language. Diagnostics only; matching always
    /// uses the whole catalog because ad copy does not follow the system locale.
    pub fn for_language<'a>(&'a self, language: &'a str) -> impl Iterator<Item = &'a AdPattern> + 'a {
        self.patterns
            .iter()
            .filter(move |pattern| pattern.language == language)
    }

    /// Highest-confidence pattern matching `title`, if any.
    pub fn best_match(&self, title: &str) -> Option<PatternHit<'_>> {
        let title = title.trim();
        let folded = title.to_lowercase();

        let mut best: Option<PatternHit<'_>> = None;
        for pattern in &self.patterns {
            if !pattern.matches(title, &folded) {
                continue;
            }
            if best
                .as_ref()
                .map_or(true, |hit| pattern.confidence > hit.confidence)
            {
                best = Some(PatternHit {
                    pattern,
                    confidence: pattern.confidence,
                });
            }
        }
        best
    }

    pub fn looks_like_music(&self, title: &str) -> bool {
        self.music_shapes.iter().any(|shape| shape.is_match(title))
    }
}

/// Language part of the runtime locale (`sv_SE.UTF-8` -> `sv`), defaulting to `en`.
pub fn runtime_language() -> String {
    ["LC_ALL", "LC_MESSAGES", "LANG"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .find(|value| !value.is_empty() && value != "C" && value != "POSIX")
        .and_then(|value| {
            value
                .split(|c: char| c == '_' || c == '.' || c == '-')
                .next()
                .map(|lang| lang.to_lowercase())
        })
        .filter(|lang| !lang.is_empty())
        .unwrap_or_else(|| "en".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> PatternCatalog {
        PatternCatalog::new().expect("catalog compiles")
    }

    #[test]
    fn exact_patterns_are_case_sensitive() {
        let catalog = catalog();
        let hit = catalog.best_match("Advertisement").expect("hit");
        assert_eq!(hit.pattern.kind, MatchKind::Exact);
        assert!((hit.confidence - 0.95).abs() < f64::EPSILON);
        assert!(catalog.best_match("advertisement").is_none());
    }

    #[test]
    fn contains_patterns_ignore_case() {
        let catalog = catalog();
        let hit = catalog
            .best_match("Nu kan du LYSSNA UTAN ANNONSER")
            .expect("hit");
        assert_eq!(hit.pattern.language, "sv");
        assert!((hit.confidence - 0.90).abs() < f64::EPSILON);
    }

    #[test]
    fn strongest_pattern_wins() {
        let catalog = catalog();
        // "Free" (0.60) and "Get Spotify Premium" (0.85) and "Premium" (0.60)
        let hit = catalog.best_match("Get Spotify Premium Free").expect("hit");
        assert!((hit.confidence - 0.85).abs() < f64::EPSILON);
    }

    #[test]
    fn music_shapes() {
        let catalog = catalog();
        assert!(catalog.looks_like_music("ABBA - Dancing Queen"));
        assert!(catalog.looks_like_music("ABBA – Dancing Queen"));
        assert!(catalog.looks_like_music("Dancing Queen by ABBA"));
        assert!(!catalog.looks_like_music("ABBA-Dancing Queen"));
        assert!(!catalog.looks_like_music("Advertisement"));
    }

    #[test]
    fn language_filter_lists_only_that_language() {
        let catalog = catalog();
        let swedish: Vec<_> = catalog.for_language("sv").collect();
        assert_eq!(swedish.len(), 5);
        assert!(swedish.iter().all(|pattern| pattern.language == "sv"));
    }
}
