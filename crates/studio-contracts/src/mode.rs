use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionMode {
    #[default]
    TextToImage,
    ImageToImage,
    TryOn,
    Upscale,
}

impl InteractionMode {
    pub const ALL: [InteractionMode; 4] = [
        InteractionMode::TextToImage,
        InteractionMode::ImageToImage,
        InteractionMode::TryOn,
        InteractionMode::Upscale,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::TextToImage => "Text-to-Image",
            Self::ImageToImage => "Image-to-Image",
            Self::TryOn => "Virtual Try-on",
            Self::Upscale => "Upscale",
        }
    }

    /// Short token used on the command line and in event payloads.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextToImage => "text",
            Self::ImageToImage => "edit",
            Self::TryOn => "tryon",
            Self::Upscale => "upscale",
        }
    }

    /// Name of the hosted model family shown next to the style selector.
    pub fn model_family(self) -> &'static str {
        match self {
            Self::TextToImage => "Imagen 4",
            _ => "Nano Banana",
        }
    }

    pub fn supports_style(self) -> bool {
        matches!(self, Self::TextToImage | Self::ImageToImage)
    }
}

impl fmt::Display for InteractionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for InteractionMode {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw
            .trim()
            .to_ascii_lowercase()
            .replace(['-', '_', ' '], "");
        match normalized.as_str() {
            "text" | "texttoimage" | "t2i" | "generate" => Ok(Self::TextToImage),
            "edit" | "imagetoimage" | "i2i" => Ok(Self::ImageToImage),
            "tryon" | "virtualtryon" => Ok(Self::TryOn),
            "upscale" | "upscaler" => Ok(Self::Upscale),
            _ => Err(format!(
                "Unknown mode '{}'. Expected one of: text, edit, tryon, upscale.",
                raw.trim()
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum UpscaleFactor {
    #[default]
    X2,
    X4,
}

impl UpscaleFactor {
    pub const ALL: [UpscaleFactor; 2] = [UpscaleFactor::X2, UpscaleFactor::X4];

    pub fn value(self) -> u32 {
        match self {
            Self::X2 => 2,
            Self::X4 => 4,
        }
    }
}

impl fmt::Display for UpscaleFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.value())
    }
}

impl TryFrom<u32> for UpscaleFactor {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Self::X2),
            4 => Ok(Self::X4),
            other => Err(format!("Unsupported upscale factor {other}; choose 2 or 4.")),
        }
    }
}

impl FromStr for UpscaleFactor {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim().trim_end_matches(['x', 'X']);
        let value = trimmed
            .parse::<u32>()
            .map_err(|_| format!("Unsupported upscale factor '{}'; choose 2 or 4.", raw.trim()))?;
        Self::try_from(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArtisticStyle {
    #[default]
    Default,
    Seedream,
    Flux,
    ChatGpt,
    IdeogramV3,
}

impl ArtisticStyle {
    pub const ALL: [ArtisticStyle; 5] = [
        ArtisticStyle::Default,
        ArtisticStyle::Seedream,
        ArtisticStyle::Flux,
        ArtisticStyle::ChatGpt,
        ArtisticStyle::IdeogramV3,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "Default",
            Self::Seedream => "Seedream",
            Self::Flux => "Flux",
            Self::ChatGpt => "ChatGPT",
            Self::IdeogramV3 => "Ideogram V3",
        }
    }

    pub fn label(self) -> String {
        match self {
            Self::Default => "Default".to_string(),
            other => format!("{} Style", other.name()),
        }
    }

    pub fn is_default(self) -> bool {
        self == Self::Default
    }
}

impl fmt::Display for ArtisticStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ArtisticStyle {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_ascii_lowercase().replace([' ', '_', '-'], "");
        Self::ALL
            .into_iter()
            .find(|style| style.name().to_ascii_lowercase().replace(' ', "") == wanted)
            .ok_or_else(|| {
                let names = Self::ALL
                    .iter()
                    .map(|style| style.name())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!("Unknown style '{}'. Expected one of: {names}.", raw.trim())
            })
    }
}
