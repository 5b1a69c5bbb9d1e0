use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use crate::speech::voice::VoiceCode;

/// Key of a tutor in the dialogue script.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TutorId(String);

impl TutorId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TutorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TutorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Borrow<str> for TutorId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Scene keys start at 1.
pub type SceneIndex = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Chinese,
    Japanese,
    Korean,
    Spanish,
}

impl Language {
    pub const ALL: [Language; 4] = [
        Language::Chinese,
        Language::Japanese,
        Language::Korean,
        Language::Spanish,
    ];

    pub fn voice_code(&self) -> VoiceCode {
        match self {
            Language::Chinese => VoiceCode::Zh,
            Language::Japanese => VoiceCode::Ja,
            Language::Korean => VoiceCode::Ko,
            Language::Spanish => VoiceCode::Es,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Chinese => "chinese",
            Language::Japanese => "japanese",
            Language::Korean => "korean",
            Language::Spanish => "spanish",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Language::ALL
            .into_iter()
            .find(|lang| lang.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unsupported language: {}", s))
    }
}

/// Localized text bundle. English is the fallback for every language.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageContent {
    #[serde(default)]
    pub english: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chinese: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pinyin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub japanese: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub romaji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub korean: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub romanized: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spanish: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl MessageContent {
    pub fn english(text: impl Into<String>) -> Self {
        Self {
            english: text.into(),
            ..Self::default()
        }
    }

    /// Text in `language` only, without falling back.
    pub fn localized(&self, language: Language) -> Option<&str> {
        let field = match language {
            Language::Chinese => &self.chinese,
            Language::Japanese => &self.japanese,
            Language::Korean => &self.korean,
            Language::Spanish => &self.spanish,
        };
        field.as_deref().filter(|s| !s.is_empty())
    }

    pub fn primary_text(&self, language: Language) -> &str {
        self.localized(language).unwrap_or(&self.english)
    }

    /// Romanization matching the language: pinyin, romaji or revised romanization.
    pub fn pronunciation(&self, language: Language) -> Option<&str> {
        let field = match language {
            Language::Chinese => &self.pinyin,
            Language::Japanese => &self.romaji,
            Language::Korean => &self.romanized,
            Language::Spanish => return None,
        };
        field.as_deref().filter(|s| !s.is_empty())
    }

    /// English line shown under the primary text, when it differs from it.
    pub fn translation(&self, language: Language) -> Option<&str> {
        if self.english.is_empty() || self.localized(language).is_none() {
            None
        } else {
            Some(&self.english)
        }
    }

    pub fn has_text(&self) -> bool {
        !self.english.is_empty()
            || Language::ALL
                .into_iter()
                .any(|lang| self.localized(lang).is_some())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOption {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub content: MessageContent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial: Option<MessageContent>,
    #[serde(default)]
    pub options: Vec<ChatOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transition: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tutor {
    pub name: String,
    pub language: Language,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: String,
    /// Name written in the tutor's own language.
    #[serde(
        default,
        alias = "chineseName",
        alias = "japaneseName",
        alias = "koreanName",
        alias = "spanishName",
        skip_serializing_if = "Option::is_none"
    )]
    pub native_name: Option<String>,
    #[serde(default)]
    pub scenes: BTreeMap<SceneIndex, Scene>,
}

impl Tutor {
    pub fn scene(&self, index: SceneIndex) -> Option<&Scene> {
        self.scenes.get(&index)
    }
}
