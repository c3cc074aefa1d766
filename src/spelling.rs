//! Spell correction for style prompts
//!
//! A deliberately small, closed vocabulary: known misspellings are rewritten
//! in place and longer words that look like artistic terms get suggestions.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};

/// Artistic vocabulary used for near-match suggestions, in lookup order.
pub const ARTISTIC_TERMS: [&str; 34] = [
    "vibrant",
    "aesthetic",
    "cyberpunk",
    "watercolor",
    "pastels",
    "cinematic",
    "dramatic",
    "surreal",
    "abstract",
    "impressionist",
    "renaissance",
    "baroque",
    "contemporary",
    "minimalist",
    "saturated",
    "monochromatic",
    "complementary",
    "analogous",
    "warm",
    "cool",
    "neutral",
    "vintage",
    "retro",
    "modern",
    "anime",
    "manga",
    "cartoon",
    "realistic",
    "photorealistic",
    "fantasy",
    "sci-fi",
    "steampunk",
    "gothic",
    "romantic",
];

/// Known misspelling → canonical term.
pub const COMMON_CORRECTIONS: [(&str, &str); 24] = [
    ("vibrante", "vibrant"),
    ("aestetic", "aesthetic"),
    ("watercolour", "watercolor"),
    ("pastelles", "pastels"),
    ("cinematico", "cinematic"),
    ("surrealistic", "surreal"),
    ("abstracto", "abstract"),
    ("minimalistic", "minimalist"),
    ("saturate", "saturated"),
    ("monochrome", "monochromatic"),
    ("complementory", "complementary"),
    ("analogous", "analogous"),
    ("vintaje", "vintage"),
    ("retroo", "retro"),
    ("moderne", "modern"),
    ("animee", "anime"),
    ("mangaa", "manga"),
    ("cartoony", "cartoon"),
    ("realist", "realistic"),
    ("fantasyy", "fantasy"),
    ("scifi", "sci-fi"),
    ("steampunck", "steampunk"),
    ("gothik", "gothic"),
    ("romantik", "romantic"),
];

const SUGGESTION_THRESHOLD: f64 = 0.7;
const MAX_SUGGESTIONS: usize = 3;
const MIN_SUGGESTION_LENGTH: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SpellingIssue {
    /// A known misspelling that was rewritten in the prompt.
    Spelling {
        original: String,
        suggestion: String,
        severity: Severity,
    },
    /// A word that resembles one or more artistic terms; left untouched.
    Suggestion {
        original: String,
        suggestions: Vec<String>,
        severity: Severity,
    },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SpellCheckerStats {
    pub corrections_applied: u64,
    pub suggestions_made: u64,
}

#[derive(Debug, Default)]
pub struct SpellChecker {
    corrections_applied: AtomicU64,
    suggestions_made: AtomicU64,
}

impl SpellChecker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the corrected prompt and every issue found, in token order.
    pub fn check(&self, prompt: &str) -> (String, Vec<SpellingIssue>) {
        let mut corrected = prompt.to_string();
        let mut issues = Vec::new();
        let mut corrections = 0usize;

        for token in tokenize(prompt) {
            let lowered = token.to_lowercase();

            if let Some(canonical) = lookup_correction(&lowered) {
                let replacement = if token.starts_with(|c: char| c.is_uppercase()) {
                    capitalize(canonical)
                } else {
                    canonical.to_string()
                };

                corrected = corrected.replace(token, &replacement);
                corrections += 1;
                issues.push(SpellingIssue::Spelling {
                    original: token.to_string(),
                    suggestion: replacement,
                    severity: Severity::Medium,
                });
            } else if lowered.chars().count() >= MIN_SUGGESTION_LENGTH {
                let suggestions = suggest_terms(&lowered);
                if !suggestions.is_empty() {
                    self.suggestions_made.fetch_add(1, Ordering::Relaxed);
                    issues.push(SpellingIssue::Suggestion {
                        original: token.to_string(),
                        suggestions,
                        severity: Severity::Low,
                    });
                }
            }
        }

        if corrections > 0 {
            self.corrections_applied.fetch_add(1, Ordering::Relaxed);
            tracing::info!("Auto-corrected {} words in style prompt", corrections);
        }

        (corrected, issues)
    }

    pub fn stats(&self) -> SpellCheckerStats {
        SpellCheckerStats {
            corrections_applied: self.corrections_applied.load(Ordering::Relaxed),
            suggestions_made: self.suggestions_made.load(Ordering::Relaxed),
        }
    }
}

/// Character-set overlap: `|set(a) ∩ set(b)| / max(|set(a)|, |set(b)|)`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let left: HashSet<char> = a.chars().collect();
    let right: HashSet<char> = b.chars().collect();

    let denominator = left.len().max(right.len());
    if denominator == 0 {
        return 1.0;
    }

    left.intersection(&right).count() as f64 / denominator as f64
}

fn lookup_correction(word: &str) -> Option<&'static str> {
    COMMON_CORRECTIONS
        .iter()
        .find(|(misspelling, _)| *misspelling == word)
        .map(|(_, canonical)| *canonical)
}

fn suggest_terms(word: &str) -> Vec<String> {
    ARTISTIC_TERMS
        .iter()
        .filter(|term| similarity(word, term) > SUGGESTION_THRESHOLD)
        .take(MAX_SUGGESTIONS)
        .map(|term| term.to_string())
        .collect()
}

/// Whole words made only of ASCII letters; words touching digits or
/// underscores are skipped entirely.
fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty() && token.chars().all(|c| c.is_ascii_alphabetic()))
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_clean_prompt_is_unchanged() {
        let checker = SpellChecker::new();
        let (corrected, issues) = checker.check("bold red hues");
        assert_eq!(corrected, "bold red hues");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_vocabulary_word_suggests_itself() {
        let checker = SpellChecker::new();
        let (corrected, issues) = checker.check("vibrant colors");
        assert_eq!(corrected, "vibrant colors");
        assert_eq!(
            issues,
            vec![SpellingIssue::Suggestion {
                original: "vibrant".to_string(),
                suggestions: vec!["vibrant".to_string(), "vintage".to_string()],
                severity: Severity::Low,
            }]
        );
    }

    #[test]
    fn test_known_misspelling_is_replaced() {
        let checker = SpellChecker::new();
        let (corrected, issues) = checker.check("a vintaje photo with gothik shadows");

        assert_eq!(corrected, "a vintage photo with gothic shadows");
        assert_eq!(
            issues,
            vec![
                SpellingIssue::Spelling {
                    original: "vintaje".to_string(),
                    suggestion: "vintage".to_string(),
                    severity: Severity::Medium,
                },
                SpellingIssue::Spelling {
                    original: "gothik".to_string(),
                    suggestion: "gothic".to_string(),
                    severity: Severity::Medium,
                },
            ]
        );
    }

    #[test]
    fn test_capitalized_misspelling_keeps_capital() {
        let checker = SpellChecker::new();
        let (corrected, _) = checker.check("Watercolour landscape");
        assert_eq!(corrected, "Watercolor landscape");
    }

    #[test]
    fn test_all_occurrences_of_token_replaced() {
        let checker = SpellChecker::new();
        let (corrected, issues) = checker.check("retroo and retroo");
        assert_eq!(corrected, "retro and retro");
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn test_identity_correction_still_reported() {
        let checker = SpellChecker::new();
        let (corrected, issues) = checker.check("analogous palette");
        assert_eq!(corrected, "analogous palette");
        assert!(matches!(
            &issues[0],
            SpellingIssue::Spelling { suggestion, .. } if suggestion == "analogous"
        ));
    }

    #[test]
    fn test_tokens_with_digits_are_ignored() {
        let checker = SpellChecker::new();
        let (corrected, issues) = checker.check("vintaje2 red");
        assert_eq!(corrected, "vintaje2 red");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_near_match_produces_suggestion() {
        let checker = SpellChecker::new();
        let (corrected, issues) = checker.check("dramatc lighting");

        assert_eq!(corrected, "dramatc lighting");
        match &issues[0] {
            SpellingIssue::Suggestion {
                original,
                suggestions,
                severity,
            } => {
                assert_eq!(original, "dramatc");
                assert!(suggestions.contains(&"dramatic".to_string()));
                assert!(suggestions.len() <= 3);
                assert_eq!(*severity, Severity::Low);
            }
            other => panic!("expected suggestion, got {:?}", other),
        }
    }

    #[test]
    fn test_short_words_get_no_suggestions() {
        let checker = SpellChecker::new();
        let (_, issues) = checker.check("warn");
        assert!(issues.is_empty());
    }

    #[test]
    fn test_check_is_idempotent_without_misspellings() {
        let checker = SpellChecker::new();
        let (once, _) = checker.check("moody cinematic vintage portrait");
        let (twice, _) = checker.check(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_similarity_properties() {
        assert_eq!(similarity("vibrant", "vibrant"), 1.0);
        assert_eq!(similarity("abc", "xyz"), 0.0);
        for (a, b) in [("dramatc", "dramatic"), ("retro", "romantic"), ("anime", "manga")] {
            assert_eq!(similarity(a, b), similarity(b, a));
        }
    }

    #[test]
    fn test_stats_track_corrections_and_suggestions() {
        let checker = SpellChecker::new();
        checker.check("vibrante sky");
        checker.check("dramatc sky");

        let stats = checker.stats();
        assert_eq!(stats.corrections_applied, 1);
        assert_eq!(stats.suggestions_made, 1);
    }

    #[test]
    fn test_issue_serializes_with_type_tag() {
        let issue = SpellingIssue::Spelling {
            original: "scifi".to_string(),
            suggestion: "sci-fi".to_string(),
            severity: Severity::Medium,
        };
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["type"], "spelling");
        assert_eq!(json["severity"], "medium");
    }
}
