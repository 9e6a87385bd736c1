use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReaderModeTheme {
    Light,
    Sepia,
    Dark,
    Black,
}

impl ReaderModeTheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderModeTheme::Light => "light",
            ReaderModeTheme::Sepia => "sepia",
            ReaderModeTheme::Dark => "dark",
            ReaderModeTheme::Black => "black",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReaderModeFontType {
    #[serde(rename = "serif")]
    Serif,
    #[serde(rename = "sans-serif")]
    SansSerif,
}

impl ReaderModeFontType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReaderModeFontType::Serif => "serif",
            ReaderModeFontType::SansSerif => "sans-serif",
        }
    }
}

/// Font size step, 1 through 13
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ReaderModeFontSize(u8);

impl ReaderModeFontSize {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 13;
    pub const DEFAULT: ReaderModeFontSize = ReaderModeFontSize(5);

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for ReaderModeFontSize {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&v) {
            Ok(Self(v))
        } else {
            Err(format!("font size {} out of range", v))
        }
    }
}

impl From<ReaderModeFontSize> for u8 {
    fn from(size: ReaderModeFontSize) -> u8 {
        size.0
    }
}

/// The user's reader-mode presentation choice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaderModeStyle {
    pub theme: ReaderModeTheme,
    pub font_type: ReaderModeFontType,
    pub font_size: ReaderModeFontSize,
}

impl Default for ReaderModeStyle {
    fn default() -> Self {
        Self {
            theme: ReaderModeTheme::Light,
            font_type: ReaderModeFontType::SansSerif,
            font_size: ReaderModeFontSize::DEFAULT,
        }
    }
}

impl ReaderModeStyle {
    /// Parse a stored preference dictionary; `None` when any field is missing or invalid
    pub fn from_dict(dict: &Value) -> Option<Self> {
        serde_json::from_value(dict.clone()).ok()
    }

    /// Resolve a possibly absent or malformed preference to a usable style
    pub fn resolve(dict: Option<&Value>) -> Self {
        dict.and_then(Self::from_dict).unwrap_or_default()
    }

    pub fn to_dict(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Class list applied to the reader body element
    pub fn body_classes(&self) -> String {
        format!(
            "{} {} font-size{}",
            self.theme.as_str(),
            self.font_type.as_str(),
            self.font_size.value()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_stored_dictionary() {
        let style = ReaderModeStyle::from_dict(&json!({"theme": "dark", "fontType": "serif", "fontSize": 9})).unwrap();
        assert_eq!(style.theme, ReaderModeTheme::Dark);
        assert_eq!(style.font_type, ReaderModeFontType::Serif);
        assert_eq!(style.font_size.value(), 9);
        assert_eq!(style.body_classes(), "dark serif font-size9");
    }

    #[test]
    fn malformed_preferences_fall_back_to_default() {
        for bad in [
            json!({"theme": "neon", "fontType": "serif", "fontSize": 3}),
            json!({"theme": "dark", "fontType": "serif", "fontSize": 40}),
            json!({"theme": "dark"}),
            json!("dark"),
        ] {
            assert_eq!(ReaderModeStyle::resolve(Some(&bad)), ReaderModeStyle::default());
        }
        assert_eq!(ReaderModeStyle::resolve(None).body_classes(), "light sans-serif font-size5");
    }

    #[test]
    fn dictionary_round_trips() {
        let style = ReaderModeStyle {
            theme: ReaderModeTheme::Sepia,
            font_type: ReaderModeFontType::SansSerif,
            font_size: ReaderModeFontSize::try_from(13).unwrap(),
        };
        assert_eq!(style.to_dict(), json!({"theme": "sepia", "fontType": "sans-serif", "fontSize": 13}));
        assert_eq!(ReaderModeStyle::from_dict(&style.to_dict()), Some(style));
    }
}
