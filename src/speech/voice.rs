use serde::{Deserialize, Serialize};
use std::fmt;

/// Voice used when a request carries a tag outside the table.
pub const DEFAULT_VOICE: &str = "alloy";

/// Symbolic voice code sent to the synthesis provider, one per language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceCode {
    Zh,
    Ja,
    Ko,
    Es,
}

impl VoiceCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceCode::Zh => "zh",
            VoiceCode::Ja => "ja",
            VoiceCode::Ko => "ko",
            VoiceCode::Es => "es",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "zh" => Some(VoiceCode::Zh),
            "ja" => Some(VoiceCode::Ja),
            "ko" => Some(VoiceCode::Ko),
            "es" => Some(VoiceCode::Es),
            _ => None,
        }
    }

    pub fn provider_voice(&self) -> &'static str {
        match self {
            VoiceCode::Zh => "alloy",
            VoiceCode::Ja => "nova",
            VoiceCode::Ko => "shimmer",
            VoiceCode::Es => "onyx",
        }
    }
}

impl fmt::Display for VoiceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider voice for a wire tag. Unknown tags get [`DEFAULT_VOICE`].
pub fn voice_for_tag(tag: &str) -> &'static str {
    VoiceCode::from_tag(tag)
        .map(|code| code.provider_voice())
        .unwrap_or(DEFAULT_VOICE)
}
