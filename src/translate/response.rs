//! Parsing of raw model output into translation text and example sentence.
//!
//! Models do not reliably follow the requested format, so both parsers
//! accept unlabelled output and never fail.

use once_cell::sync::Lazy;
use regex::Regex;

static TRANSLATION_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^translation:\s*").expect("Failed to compile translation label pattern")
});

static EXAMPLE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^example:\s*").expect("Failed to compile example label pattern")
});

static SENTENCE_LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(translated text:|translation:)").expect("Failed to compile sentence label pattern")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedTranslation {
    pub translation_text: String,
    pub example_sentence: Option<String>,
}

/// Parse a word-mode reply of the form `Translation: ...` / `Example: ...`.
///
/// Without a translation label the first line that is not a labelled example
/// is taken as the translation, and the next such line (if any) as the example.
pub fn parse_word_response(response: &str) -> ParsedTranslation {
    let lines: Vec<&str> = response
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();

    let mut translation: Option<String> = None;
    let mut example: Option<String> = None;

    for line in &lines {
        if TRANSLATION_LABEL.is_match(line) {
            translation = Some(TRANSLATION_LABEL.replace(line, "").trim().to_string());
        } else if EXAMPLE_LABEL.is_match(line) {
            example = Some(EXAMPLE_LABEL.replace(line, "").trim().to_string());
        }
    }

    let translation = translation.filter(|t| !t.is_empty());
    let example = example.filter(|e| !e.is_empty());

    match translation {
        Some(translation_text) => ParsedTranslation { translation_text, example_sentence: example },
        None => {
            let mut positional = lines.iter().filter(|line| !EXAMPLE_LABEL.is_match(line));
            let translation_text = positional.next().map(|l| l.to_string()).unwrap_or_default();
            let example_sentence = example.or_else(|| positional.next().map(|l| l.to_string()));
            ParsedTranslation { translation_text, example_sentence }
        }
    }
}

/// Parse a sentence-mode reply: drop one leading label, then one layer of quotes.
pub fn parse_sentence_response(response: &str) -> String {
    let unlabelled = SENTENCE_LABEL.replace(response.trim(), "");
    let text = unlabelled.trim();
    let text = text.strip_prefix(is_quote).unwrap_or(text);
    let text = text.strip_suffix(is_quote).unwrap_or(text);
    text.trim().to_string()
}

fn is_quote(c: char) -> bool {
    matches!(c, '\'' | '"' | '`')
}
