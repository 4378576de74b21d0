use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TrilingoError;

/// The three languages trilingo detects and translates between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Persian,
    English,
    German,
}

impl Language {
    pub const ALL: [Language; 3] = [Language::Persian, Language::English, Language::German];

    /// English name used inside prompts
    pub fn name(&self) -> &'static str {
        match self {
            Self::Persian => "Persian",
            Self::English => "English",
            Self::German => "German",
        }
    }

    /// Lower-case identifier, as the engine is asked to answer
    pub fn code(&self) -> &'static str {
        match self {
            Self::Persian => "persian",
            Self::English => "english",
            Self::German => "german",
        }
    }

    /// Label shown next to detection results and translations
    pub fn display(&self) -> &'static str {
        match self {
            Self::Persian => "🇮🇷 Persian (فارسی)",
            Self::English => "🇬🇧 English",
            Self::German => "🇩🇪 German (Deutsch)",
        }
    }

    /// Translation targets in display order. Never contains `self`.
    pub fn targets(&self) -> [Language; 2] {
        match self {
            Self::Persian => [Self::English, Self::German],
            Self::English => [Self::Persian, Self::German],
            Self::German => [Self::English, Self::Persian],
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = TrilingoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "persian" | "fa" | "farsi" => Ok(Self::Persian),
            "english" | "en" => Ok(Self::English),
            "german" | "de" | "deutsch" => Ok(Self::German),
            other => Err(TrilingoError::Config(format!(
                "Unsupported language '{}'. Valid languages: persian, english, german",
                other
            ))),
        }
    }
}

/// Which stage of detection produced the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetectionMethod {
    CharacterPattern,
    AiAssisted,
    WordScoreFallback,
}

impl fmt::Display for DetectionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CharacterPattern => "character pattern",
            Self::AiAssisted => "ai-assisted",
            Self::WordScoreFallback => "word score",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub language: Language,
    pub method: DetectionMethod,
}

impl DetectionResult {
    pub fn new(language: Language, method: DetectionMethod) -> Self {
        Self { language, method }
    }
}
