//! Bilingual-or-plain text fields.
//!
//! Course and bundle titles/descriptions arrive from clients either as a
//! plain string or as an `{en, tg}` object. Both shapes are preserved
//! on the wire; all internal read sites go through [`LocalizedText::display`]
//! so the branching lives in exactly one place.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LocalizedText {
    Plain(String),
    Bilingual { en: String, tg: String },
}

impl LocalizedText {
    /// The display string: the plain value, or English with Tajik fallback.
    pub fn display(&self) -> &str {
        match self {
            LocalizedText::Plain(s) => s,
            LocalizedText::Bilingual { en, tg } => {
                if en.trim().is_empty() {
                    tg
                } else {
                    en
                }
            }
        }
    }

    /// The text for a specific language tag, if present.
    pub fn get(&self, lang: &str) -> Option<&str> {
        match self {
            LocalizedText::Plain(s) => Some(s),
            LocalizedText::Bilingual { en, tg } => match lang {
                "en" => Some(en),
                "tg" => Some(tg),
                _ => None,
            },
        }
    }

    /// True when no variant carries any non-whitespace text.
    pub fn is_blank(&self) -> bool {
        match self {
            LocalizedText::Plain(s) => s.trim().is_empty(),
            LocalizedText::Bilingual { en, tg } => en.trim().is_empty() && tg.trim().is_empty(),
        }
    }

    /// Serialize for TEXT column storage.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "\"\"".to_string())
    }

    /// Parse from a TEXT column. Falls back to treating the raw value as a
    /// plain string so pre-JSON rows still load.
    pub fn from_json(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|_| LocalizedText::Plain(raw.to_string()))
    }
}

impl From<&str> for LocalizedText {
    fn from(s: &str) -> Self {
        LocalizedText::Plain(s.to_string())
    }
}

impl From<String> for LocalizedText {
    fn from(s: String) -> Self {
        LocalizedText::Plain(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_round_trip() {
        let t = LocalizedText::Plain("Intro to Trading".into());
        let json = t.to_json();
        assert_eq!(json, "\"Intro to Trading\"");
        assert_eq!(LocalizedText::from_json(&json), t);
        assert_eq!(t.display(), "Intro to Trading");
    }

    #[test]
    fn test_bilingual_round_trip() {
        let t = LocalizedText::Bilingual {
            en: "Trading".into(),
            tg: "Тиҷорат".into(),
        };
        let json = t.to_json();
        let parsed = LocalizedText::from_json(&json);
        assert_eq!(parsed, t);
        assert_eq!(parsed.display(), "Trading");
        assert_eq!(parsed.get("tg"), Some("Тиҷорат"));
    }

    #[test]
    fn test_display_falls_back_to_tajik() {
        let t = LocalizedText::Bilingual {
            en: "  ".into(),
            tg: "Тиҷорат".into(),
        };
        assert_eq!(t.display(), "Тиҷорат");
    }

    #[test]
    fn test_untagged_deserialization() {
        let plain: LocalizedText = serde_json::from_str("\"hello\"").unwrap();
        assert_eq!(plain, LocalizedText::Plain("hello".into()));

        let bi: LocalizedText = serde_json::from_str(r#"{"en":"a","tg":"b"}"#).unwrap();
        assert_eq!(
            bi,
            LocalizedText::Bilingual {
                en: "a".into(),
                tg: "b".into()
            }
        );
    }

    #[test]
    fn test_non_json_column_value_loads_as_plain() {
        let t = LocalizedText::from_json("legacy raw title");
        assert_eq!(t, LocalizedText::Plain("legacy raw title".into()));
    }

    #[test]
    fn test_is_blank() {
        assert!(LocalizedText::Plain("  ".into()).is_blank());
        assert!(!LocalizedText::Plain("x".into()).is_blank());
        assert!(LocalizedText::Bilingual {
            en: "".into(),
            tg: " ".into()
        }
        .is_blank());
    }
}
