use std::env;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const DEFAULT_STYLE: &str = "ghibli";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "1:1")]
    Square,
    #[default]
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "4:3")]
    Classic43,
    #[serde(rename = "3:4")]
    Classic34,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Portrait,
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Classic34,
        AspectRatio::Classic43,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Classic43 => "4:3",
            AspectRatio::Classic34 => "3:4",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().replace('/', ":");
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == normalized)
            .ok_or_else(|| {
                format!(
                    "Unsupported aspect ratio '{}'; expected one of 1:1, 9:16, 16:9, 4:3, 3:4.",
                    raw.trim()
                )
            })
    }
}

#[derive(Clone, Copy, Debug)]
pub struct StyleSpec {
    pub id: &'static str,
    pub fragment: &'static str,
}

pub const STYLES: &[StyleSpec] = &[
    StyleSpec {
        id: "ghibli",
        fragment: "Vibrant, cinematic, highly detailed, epic lighting, beautiful composition, iconic Ghibli aesthetic, with a touch of nostalgia and wonder.",
    },
    StyleSpec {
        id: "cyberpunk",
        fragment: "Cyberpunk style, neon-drenched cityscapes, futuristic technology, cybernetic enhancements, rainy streets, high-contrast lighting, dystopian mood.",
    },
    StyleSpec {
        id: "steampunk",
        fragment: "Steampunk aesthetic, victorian era with retrofuturistic technology, gears, cogs, steam-powered machinery, copper and brass tones, intricate details.",
    },
    StyleSpec {
        id: "pixel",
        fragment: "Pixel art style, 16-bit, detailed sprites, vibrant retro color palette, nostalgic video game feel, crisp pixelated look.",
    },
    StyleSpec {
        id: "fantasy",
        fragment: "High fantasy style, epic landscapes, magical elements, mythical creatures, ornate armor, cinematic lighting, lord of the rings inspiration.",
    },
];

pub fn is_known_style(id: &str) -> bool {
    STYLES.iter().any(|spec| spec.id == id)
}

/// Descriptive fragment for a style id; unknown ids use the default style.
pub fn style_fragment(id: &str) -> &'static str {
    STYLES
        .iter()
        .find(|spec| spec.id == id)
        .or_else(|| STYLES.iter().find(|spec| spec.id == DEFAULT_STYLE))
        .map(|spec| spec.fragment)
        .unwrap_or_default()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Ar,
}

impl Language {
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Ar => "ar",
        }
    }

    pub fn from_locale(tag: &str) -> Self {
        if tag.trim().to_ascii_lowercase().starts_with("ar") {
            Language::Ar
        } else {
            Language::En
        }
    }

    /// Locale detection from `LC_ALL`, then `LANG`.
    pub fn detect() -> Self {
        ["LC_ALL", "LANG"]
            .into_iter()
            .filter_map(|key| env::var(key).ok())
            .find(|value| !value.trim().is_empty())
            .map(|value| Language::from_locale(&value))
            .unwrap_or_default()
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Language::En),
            "ar" => Ok(Language::Ar),
            other => Err(format!("Unsupported language '{other}'; expected en or ar.")),
        }
    }
}
