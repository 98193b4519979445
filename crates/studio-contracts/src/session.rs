use std::path::Path;

use crate::encoded::{DecodeError, EncodedImage};
use crate::mode::{ArtisticStyle, InteractionMode, UpscaleFactor};
use crate::upload::{PreviewHandle, PreviewRegistry, SingleUpload};

/// Inputs a mode cannot run without, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    Prompt,
    SourceImage,
    PersonImage,
    ClothingImage,
    UpscaleImage,
}

impl RequiredField {
    pub fn message(self) -> &'static str {
        match self {
            Self::Prompt => "Please enter a prompt.",
            Self::SourceImage => "Please upload a source image.",
            Self::PersonImage => "Please upload an image of a person.",
            Self::ClothingImage => "Please upload an image of the clothing.",
            Self::UpscaleImage => "Please upload an image to upscale.",
        }
    }
}

/// Identifies one dispatched request. Resetting the session invalidates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub fn id(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlState {
    pub inputs_enabled: bool,
    pub submit_enabled: bool,
    pub save_enabled: bool,
}

/// All per-session state, owned by one controller.
///
/// Every field is reset together by [`Session::set_mode`].
#[derive(Debug, Default)]
pub struct Session {
    mode: InteractionMode,
    prompt: String,
    primary: SingleUpload,
    secondary: SingleUpload,
    upscale_factor: UpscaleFactor,
    style: ArtisticStyle,
    result: Option<EncodedImage>,
    error: Option<String>,
    busy: bool,
    previews: PreviewRegistry,
    ticket_seq: u64,
    in_flight: Option<u64>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn primary_image(&self) -> Option<&EncodedImage> {
        self.primary.image()
    }

    pub fn primary_preview(&self) -> Option<&PreviewHandle> {
        self.primary.preview()
    }

    pub fn secondary_image(&self) -> Option<&EncodedImage> {
        self.secondary.image()
    }

    pub fn secondary_preview(&self) -> Option<&PreviewHandle> {
        self.secondary.preview()
    }

    pub fn upscale_factor(&self) -> UpscaleFactor {
        self.upscale_factor
    }

    pub fn style(&self) -> ArtisticStyle {
        self.style
    }

    pub fn result(&self) -> Option<&EncodedImage> {
        self.result.as_ref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    /// Switches mode and discards every in-progress input, including a
    /// pending request's right to write its outcome.
    pub fn set_mode(&mut self, mode: InteractionMode) {
        self.mode = mode;
        self.reset();
    }

    pub fn reset(&mut self) {
        self.prompt.clear();
        self.primary.clear(&mut self.previews);
        self.secondary.clear(&mut self.previews);
        self.upscale_factor = UpscaleFactor::default();
        self.style = ArtisticStyle::default();
        self.result = None;
        self.error = None;
        self.busy = false;
        self.in_flight = None;
    }

    pub fn set_prompt(&mut self, prompt: impl Into<String>) {
        self.prompt = prompt.into();
    }

    pub fn set_style(&mut self, style: ArtisticStyle) {
        self.style = style;
    }

    pub fn set_upscale_factor(&mut self, factor: UpscaleFactor) {
        self.upscale_factor = factor;
    }

    pub fn set_primary_image(&mut self, image: EncodedImage) {
        self.primary.replace(image, &mut self.previews);
    }

    pub fn set_secondary_image(&mut self, image: EncodedImage) {
        self.secondary.replace(image, &mut self.previews);
    }

    pub fn load_primary_image(&mut self, path: &Path) -> Result<(), DecodeError> {
        self.primary.load(path, &mut self.previews)
    }

    pub fn load_secondary_image(&mut self, path: &Path) -> Result<(), DecodeError> {
        self.secondary.load(path, &mut self.previews)
    }

    pub fn clear_primary_image(&mut self) {
        self.primary.clear(&mut self.previews);
    }

    pub fn clear_secondary_image(&mut self) {
        self.secondary.clear(&mut self.previews);
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn first_missing_field(&self) -> Option<RequiredField> {
        let has_prompt = !self.prompt.is_empty();
        let has_primary = self.primary.image().is_some();
        let has_secondary = self.secondary.image().is_some();
        match self.mode {
            InteractionMode::TextToImage => (!has_prompt).then_some(RequiredField::Prompt),
            InteractionMode::ImageToImage => {
                if !has_prompt {
                    Some(RequiredField::Prompt)
                } else if !has_primary {
                    Some(RequiredField::SourceImage)
                } else {
                    None
                }
            }
            InteractionMode::TryOn => {
                if !has_primary {
                    Some(RequiredField::PersonImage)
                } else if !has_secondary {
                    Some(RequiredField::ClothingImage)
                } else {
                    None
                }
            }
            InteractionMode::Upscale => (!has_primary).then_some(RequiredField::UpscaleImage),
        }
    }

    pub fn controls(&self) -> ControlState {
        ControlState {
            inputs_enabled: !self.busy,
            submit_enabled: !self.busy && self.first_missing_field().is_none(),
            save_enabled: !self.busy && self.result.is_some(),
        }
    }

    /// Clears the previous outcome and marks the session busy.
    pub fn begin_request(&mut self) -> RequestTicket {
        self.result = None;
        self.error = None;
        self.busy = true;
        self.ticket_seq += 1;
        self.in_flight = Some(self.ticket_seq);
        RequestTicket(self.ticket_seq)
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.in_flight == Some(ticket.0)
    }

    /// Records a request outcome. Returns `false` when the ticket was
    /// invalidated by a reset, in which case nothing changes.
    pub fn complete_request(
        &mut self,
        ticket: RequestTicket,
        outcome: Result<EncodedImage, String>,
    ) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        match outcome {
            Ok(image) => {
                self.result = Some(image);
                self.error = None;
            }
            Err(message) => {
                self.result = None;
                self.error = Some(message);
            }
        }
        self.busy = false;
        self.in_flight = None;
        true
    }
}
