//! Voice descriptors returned by the similarity lookup

use serde::{Deserialize, Serialize};

const TAG_MAX_CHARS: usize = 64;
const DESCRIPTION_MAX_CHARS: usize = 70;

/// One candidate voice
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceDescriptor {
    pub voice_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub preview_url: Option<String>,
    pub gender: Option<String>,
    pub accent: Option<String>,
    pub age: Option<String>,
    pub descriptive: Option<String>,
    pub use_case: Option<String>,
    pub category: Option<String>,
    pub language: Option<String>,
}

impl VoiceDescriptor {
    /// Display name, with a generic fallback
    pub fn display_name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or("Selected voice")
    }

    /// Short human-readable tag: "descriptive · use case · accent"
    ///
    /// Falls back to the first sentence of the description when none of the
    /// labels are present.
    pub fn short_tag(&self) -> String {
        let parts: Vec<String> = [
            tidy(self.descriptive.as_deref()),
            tidy(self.use_case.as_deref()).replace("characters animation", "character voice"),
            tidy(self.accent.as_deref()),
        ]
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();

        if !parts.is_empty() {
            return truncate(&parts.join(" · "), TAG_MAX_CHARS);
        }

        let description = self.description.as_deref().unwrap_or("").trim();
        let first = description
            .split(|c| matches!(c, '.' | '!' | '?' | '\n'))
            .next()
            .unwrap_or("")
            .trim();

        if first.chars().count() > DESCRIPTION_MAX_CHARS {
            let head: String = first.chars().take(DESCRIPTION_MAX_CHARS - 3).collect();
            format!("{}...", head)
        } else {
            first.to_string()
        }
    }

    /// Parse the similarity response body
    ///
    /// The list is read from `voices`, then `similar_voices`; anything else
    /// yields an empty list.
    pub fn list_from_response(body: &serde_json::Value) -> Vec<VoiceDescriptor> {
        let list = body
            .get("voices")
            .or_else(|| body.get("similar_voices"))
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        serde_json::from_value(list).unwrap_or_default()
    }
}

/// First candidate that carries a usable voice id
pub fn pick_first_voice(voices: &[VoiceDescriptor]) -> Option<&VoiceDescriptor> {
    voices.iter().find(|v| {
        v.voice_id
            .as_deref()
            .map(|id| !id.trim().is_empty())
            .unwrap_or(false)
    })
}

/// Collapse `_`/`-` runs and whitespace into single spaces
fn tidy(s: Option<&str>) -> String {
    s.unwrap_or("")
        .split(|c: char| c == '_' || c == '-' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate(s: &str, max: usize) -> String {
    s.chars().take(max).collect::<String>().trim().to_string()
}
