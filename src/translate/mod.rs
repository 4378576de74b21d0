// Translation between Persian, English and German
//
// - prompt: role-structured prompts for word and sentence input
// - response: parsing of free-text model output
// - orchestrator: single-flight detect -> translate pipeline

pub mod prompt;
pub mod response;
pub mod orchestrator;

use serde::{Deserialize, Serialize};

use crate::detect::{is_german_diacritic, is_persian_char};
use crate::language::{DetectionResult, Language};

pub use orchestrator::{OrchestratorState, TranslationOrchestrator};

/// One translation attempt for a single target language
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub source_text: String,
    pub source_language: Language,
    pub target_language: Language,
    pub is_single_word: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub target_language: Language,
    pub translation_text: String,
    pub example_sentence: Option<String>,
}

/// Everything produced by one `translate()` call, results in target order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationReport {
    pub source_text: String,
    pub detection: DetectionResult,
    pub is_single_word: bool,
    pub results: Vec<TranslationResult>,
}

/// Translation targets for a detected source language
pub fn target_languages(source: Language) -> Vec<Language> {
    source.targets().to_vec()
}

/// True when the trimmed text is a single word: ASCII word characters,
/// Persian script or German diacritics, and no whitespace.
pub fn is_word_only(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty()
        && trimmed.chars().all(|c| {
            c.is_ascii_alphanumeric() || c == '_' || is_persian_char(c) || is_german_diacritic(c)
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_word_only() {
        assert!(is_word_only(" hello "));
        assert!(is_word_only("köln"));
        assert!(is_word_only("گربه"));
        assert!(is_word_only("snake_case2"));
        assert!(!is_word_only("hello world"));
        assert!(!is_word_only("hello!"));
        assert!(!is_word_only("café"));
        assert!(!is_word_only("   "));
    }

    #[test]
    fn test_target_languages_exclude_source() {
        assert_eq!(target_languages(Language::English), vec![Language::Persian, Language::German]);
        for language in Language::ALL {
            assert!(!target_languages(language).contains(&language));
        }
    }
}
