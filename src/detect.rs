use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::DetectionConfig;
use crate::inference::{ChatMessage, ChatRequest, GenerationParams, InferenceProvider};
use crate::language::{DetectionMethod, DetectionResult, Language};

const GERMAN_WORDS: &[&str] = &[
    "der", "die", "das", "und", "ich", "ist", "zu", "ein", "eine", "haben", "werden", "sie",
    "von", "mit", "sich", "auf", "für", "als", "bei", "nach", "über", "durch", "gegen", "ohne",
    "wem", "wer", "wie", "wo", "was", "wann", "gehört", "katze", "schwarze",
];

const ENGLISH_WORDS: &[&str] = &[
    "the", "and", "to", "of", "a", "in", "is", "it", "you", "that", "he", "was", "for", "on",
    "are", "as", "with", "his", "they", "i", "at", "be", "this", "have", "from", "or", "one",
    "had", "but", "not", "what", "all", "were", "we", "when", "your", "can", "said", "there",
    "each", "which", "their", "who", "does", "belong", "black", "cat",
];

static GERMAN_WORD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| word_patterns(GERMAN_WORDS));

static ENGLISH_WORD_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| word_patterns(ENGLISH_WORDS));

static GERMAN_MORPHEMES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(sch|tsch|ung|keit|heit|lich|ig|er|en|em|es|ch|ß|hört|gehört)\b")
        .expect("Failed to compile German morpheme pattern")
});

fn word_patterns(words: &[&str]) -> Vec<Regex> {
    words
        .iter()
        .map(|word| {
            Regex::new(&format!(r"\b{}\b", regex::escape(word)))
                .expect("Failed to compile word pattern")
        })
        .collect()
}

/// Arabic-script block used for Persian
pub fn is_persian_char(c: char) -> bool {
    ('\u{0600}'..='\u{06FF}').contains(&c)
}

pub fn is_german_diacritic(c: char) -> bool {
    matches!(c, 'ä' | 'ö' | 'ü' | 'Ä' | 'Ö' | 'Ü' | 'ß')
}

pub fn contains_persian(text: &str) -> bool {
    text.chars().any(is_persian_char)
}

pub fn contains_german_diacritic(text: &str) -> bool {
    text.chars().any(is_german_diacritic)
}

/// Word-list scores for a piece of text
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LanguageScores {
    pub german: f32,
    pub english: f32,
}

pub fn score(text: &str) -> LanguageScores {
    let lower = text.to_lowercase();

    let german_words = GERMAN_WORD_PATTERNS.iter().filter(|re| re.is_match(&lower)).count();
    let english_words = ENGLISH_WORD_PATTERNS.iter().filter(|re| re.is_match(&lower)).count();
    let morphemes = GERMAN_MORPHEMES.find_iter(&lower).count();

    LanguageScores {
        german: german_words as f32 + morphemes as f32 * 0.5,
        english: english_words as f32,
    }
}

/// Word and affix scoring. Always answers; English wins when nothing matches.
pub fn heuristic_language(text: &str) -> Language {
    if contains_persian(text) {
        return Language::Persian;
    }

    let scores = score(text);
    debug!("Language scores - German: {}, English: {}", scores.german, scores.english);

    if scores.german > scores.english && scores.german > 0.0 {
        Language::German
    } else {
        Language::English
    }
}

pub fn build_detection_prompt(text: &str) -> String {
    format!(
        "What language is this text? Answer only with one word: english, german, or persian.\n\
         \n\
         Text: \"{}\"\n\
         \n\
         Language:",
        text
    )
}

/// Read the model's one-word answer. Containment is checked english, german, persian in that order.
pub fn parse_language_answer(response: &str) -> Option<Language> {
    let answer = response.trim().to_lowercase();
    [Language::English, Language::German, Language::Persian]
        .into_iter()
        .find(|language| answer.contains(language.code()))
}

/// Decides whether text is Persian, English or German
#[derive(Debug, Clone)]
pub struct LanguageIdentifier {
    config: DetectionConfig,
}

impl LanguageIdentifier {
    pub fn new(config: DetectionConfig) -> Self {
        Self { config }
    }

    pub async fn detect(
        &self,
        text: &str,
        provider: Option<&dyn InferenceProvider>,
    ) -> DetectionResult {
        debug!("Detecting language for text: {}", text);

        if contains_persian(text) {
            debug!("Persian detected by character pattern");
            return DetectionResult::new(Language::Persian, DetectionMethod::CharacterPattern);
        }

        if contains_german_diacritic(text) {
            debug!("German detected by special characters");
            return DetectionResult::new(Language::German, DetectionMethod::CharacterPattern);
        }

        if let Some(provider) = provider.filter(|_| self.config.ai_assisted) {
            if let Some(language) = self.ask_provider(text, provider).await {
                return DetectionResult::new(language, DetectionMethod::AiAssisted);
            }
        }

        let language = heuristic_language(text);
        let method = if language == Language::Persian {
            DetectionMethod::CharacterPattern
        } else {
            DetectionMethod::WordScoreFallback
        };
        debug!("Fallback detection result: {}", language);
        DetectionResult::new(language, method)
    }

    async fn ask_provider(&self, text: &str, provider: &dyn InferenceProvider) -> Option<Language> {
        let request = ChatRequest {
            messages: vec![ChatMessage::user(build_detection_prompt(text))],
            params: GenerationParams {
                temperature: self.config.temperature,
                max_tokens: self.config.max_tokens,
                top_p: None,
            },
        };

        match provider.complete(&request).await {
            Ok(completion) => {
                let answer = completion.first_text().unwrap_or_default();
                debug!("AI response: {}", answer);
                let language = parse_language_answer(answer);
                if language.is_none() {
                    debug!("AI answer '{}' is not a supported language", answer.trim());
                }
                language
            }
            Err(e) => {
                warn!("AI language detection failed: {}", e);
                None
            }
        }
    }
}
