use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::mode::{ArtisticStyle, UpscaleFactor};

pub const TRY_ON_INSTRUCTION: &str = "Please apply the clothing item from the second image onto the person in the first image. Maintain the person's pose and the original background as much as possible. The clothing should look natural and fit well.";

/// Appends the style qualifier unless the style is the `Default` sentinel.
pub fn style_qualified_prompt(prompt: &str, style: ArtisticStyle) -> String {
    if style.is_default() {
        return prompt.to_string();
    }
    format!("{prompt}, in the artistic style of {}", style.name())
}

/// Wording used for the upscale instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpscalePolicy {
    /// Enlarge only; the model is told not to invent detail.
    #[default]
    Preserve,
    Enhance,
}

impl UpscalePolicy {
    pub fn instruction(self, factor: UpscaleFactor) -> String {
        let factor = factor.value();
        match self {
            Self::Preserve => format!(
                "Increase the resolution of this image by {factor}x. Do not enhance details or improve the quality. The image should simply be made larger while preserving the original content and style."
            ),
            Self::Enhance => format!(
                "Upscale this image by {factor}x. Enhance fine details and sharpen textures while keeping the original composition, content and style unchanged."
            ),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preserve => "preserve",
            Self::Enhance => "enhance",
        }
    }
}

impl fmt::Display for UpscalePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpscalePolicy {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "preserve" | "strict" => Ok(Self::Preserve),
            "enhance" | "detail" => Ok(Self::Enhance),
            other => Err(format!(
                "Unknown upscale policy '{other}'. Expected preserve or enhance."
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{style_qualified_prompt, UpscalePolicy};
    use crate::mode::{ArtisticStyle, UpscaleFactor};

    #[test]
    fn style_qualifier_only_for_non_default_styles() {
        assert_eq!(style_qualified_prompt("a cat", ArtisticStyle::Default), "a cat");
        assert_eq!(
            style_qualified_prompt("a cat", ArtisticStyle::Flux),
            "a cat, in the artistic style of Flux"
        );
        assert_eq!(
            style_qualified_prompt("a cat", ArtisticStyle::IdeogramV3),
            "a cat, in the artistic style of Ideogram V3"
        );
    }

    #[test]
    fn upscale_instruction_varies_only_by_factor() {
        for policy in [UpscalePolicy::Preserve, UpscalePolicy::Enhance] {
            let two = policy.instruction(UpscaleFactor::X2);
            let four = policy.instruction(UpscaleFactor::X4);
            assert_ne!(two, four);
            assert_eq!(two.replace("2x", "4x"), four);
        }
        assert!(UpscalePolicy::Preserve
            .instruction(UpscaleFactor::X2)
            .contains("Do not enhance details"));
    }

    #[test]
    fn policy_parses_both_spellings() {
        assert_eq!("enhance".parse(), Ok(UpscalePolicy::Enhance));
        assert_eq!("STRICT".parse(), Ok(UpscalePolicy::Preserve));
        assert!("sharpen".parse::<UpscalePolicy>().is_err());
    }
}
