use serde_json::{json, Value};
use studio_contracts::encoded::EncodedImage;
use studio_contracts::events::{payload_from, EventWriter};
use studio_contracts::mode::InteractionMode;
use studio_contracts::prompts::{style_qualified_prompt, UpscalePolicy};
use studio_contracts::session::{RequestTicket, RequiredField, Session};
use thiserror::Error;

use crate::collaborator::{CollaboratorError, GenerationCollaborator};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{}", .0.message())]
    Missing(RequiredField),
    #[error("A request is already in progress.")]
    Busy,
}

/// The only failure text a user sees for a mode; the underlying error goes
/// to the event log.
pub fn failure_message(mode: InteractionMode) -> &'static str {
    match mode {
        InteractionMode::TextToImage => {
            "Failed to generate image. Please check your prompt and API key."
        }
        InteractionMode::ImageToImage | InteractionMode::Upscale => {
            "Failed to edit image. The model might not be suitable for this task."
        }
        InteractionMode::TryOn => {
            "Failed to perform virtual try-on. Ensure images are clear and suitable."
        }
    }
}

#[derive(Debug, Clone)]
enum Operation {
    Synthesize {
        prompt: String,
    },
    Edit {
        prompt: String,
        image: EncodedImage,
    },
    Composite {
        person: EncodedImage,
        garment: EncodedImage,
    },
}

/// Snapshot of the inputs of one validated request. Owns everything it needs,
/// so it can run on a worker thread while the session stays with its owner.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    ticket: RequestTicket,
    mode: InteractionMode,
    operation: Operation,
}

impl PendingRequest {
    pub fn ticket(&self) -> RequestTicket {
        self.ticket
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    /// Text sent to the service, if the operation carries one.
    pub fn prompt(&self) -> Option<&str> {
        match &self.operation {
            Operation::Synthesize { prompt } | Operation::Edit { prompt, .. } => Some(prompt),
            Operation::Composite { .. } => None,
        }
    }

    pub fn execute(
        &self,
        collaborator: &dyn GenerationCollaborator,
    ) -> Result<EncodedImage, CollaboratorError> {
        match &self.operation {
            Operation::Synthesize { prompt } => collaborator.synthesize_from_text(prompt),
            Operation::Edit { prompt, image } => collaborator.edit_with_image(prompt, image),
            Operation::Composite { person, garment } => {
                collaborator.composite_two_images(person, garment)
            }
        }
    }
}

pub struct Orchestrator {
    events: EventWriter,
    upscale_policy: UpscalePolicy,
}

impl Orchestrator {
    pub fn new(events: EventWriter, upscale_policy: UpscalePolicy) -> Self {
        Self {
            events,
            upscale_policy,
        }
    }

    pub fn upscale_policy(&self) -> UpscalePolicy {
        self.upscale_policy
    }

    pub fn events(&self) -> &EventWriter {
        &self.events
    }

    /// Validates the session for its mode, then clears the previous outcome
    /// and marks it busy. A missing field is written to the session error and
    /// nothing is dispatched.
    pub fn begin(&self, session: &mut Session) -> Result<PendingRequest, ValidationError> {
        let mode = session.mode();
        if session.is_busy() {
            self.events.record(
                "request_rejected",
                payload_from(json!({ "mode": mode.as_str(), "reason": "busy" })),
            );
            return Err(ValidationError::Busy);
        }
        if let Some(field) = session.first_missing_field() {
            session.set_error(field.message());
            self.events.record(
                "request_rejected",
                payload_from(json!({ "mode": mode.as_str(), "reason": field.message() })),
            );
            return Err(ValidationError::Missing(field));
        }

        let operation = self.operation_for(session)?;
        let ticket = session.begin_request();
        let request = PendingRequest {
            ticket,
            mode,
            operation,
        };
        self.events.record(
            "request_started",
            payload_from(json!({
                "mode": mode.as_str(),
                "ticket": ticket.id(),
                "style": mode.supports_style().then(|| session.style().name()),
                "upscale_factor": (mode == InteractionMode::Upscale)
                    .then(|| session.upscale_factor().value()),
                "prompt": request.prompt(),
            })),
        );
        Ok(request)
    }

    fn operation_for(&self, session: &Session) -> Result<Operation, ValidationError> {
        let primary = session.primary_image().cloned();
        let secondary = session.secondary_image().cloned();
        let operation = match session.mode() {
            InteractionMode::TextToImage => Operation::Synthesize {
                prompt: style_qualified_prompt(session.prompt(), session.style()),
            },
            InteractionMode::ImageToImage => Operation::Edit {
                prompt: style_qualified_prompt(session.prompt(), session.style()),
                image: primary.ok_or(ValidationError::Missing(RequiredField::SourceImage))?,
            },
            InteractionMode::TryOn => Operation::Composite {
                person: primary.ok_or(ValidationError::Missing(RequiredField::PersonImage))?,
                garment: secondary.ok_or(ValidationError::Missing(RequiredField::ClothingImage))?,
            },
            InteractionMode::Upscale => Operation::Edit {
                prompt: self.upscale_policy.instruction(session.upscale_factor()),
                image: primary.ok_or(ValidationError::Missing(RequiredField::UpscaleImage))?,
            },
        };
        Ok(operation)
    }

    /// Writes the outcome of `request` into the session and clears busy.
    /// Returns `false` when the session was reset while the request was
    /// pending; the outcome is then dropped.
    pub fn finish(
        &self,
        session: &mut Session,
        request: &PendingRequest,
        outcome: Result<EncodedImage, CollaboratorError>,
    ) -> bool {
        let mode = request.mode().as_str();
        let ticket = request.ticket().id();
        if !session.is_current(request.ticket()) {
            self.events.record(
                "request_discarded",
                payload_from(json!({
                    "mode": mode,
                    "ticket": ticket,
                    "ok": outcome.is_ok(),
                })),
            );
            return false;
        }

        match outcome {
            Ok(image) => {
                self.events.record(
                    "request_succeeded",
                    payload_from(json!({
                        "mode": mode,
                        "ticket": ticket,
                        "media_type": image.media_type(),
                    })),
                );
                session.complete_request(request.ticket(), Ok(image))
            }
            Err(err) => {
                let message = failure_message(request.mode());
                self.events.record(
                    "request_failed",
                    payload_from(json!({
                        "mode": mode,
                        "ticket": ticket,
                        "message": message,
                        "error": Value::String(err.to_string()),
                    })),
                );
                session.complete_request(request.ticket(), Err(message.to_string()))
            }
        }
    }

    /// Runs one request to completion on the calling thread.
    pub fn run(
        &self,
        session: &mut Session,
        collaborator: &dyn GenerationCollaborator,
    ) -> Result<(), ValidationError> {
        let request = self.begin(session)?;
        let outcome = request.execute(collaborator);
        self.finish(session, &request, outcome);
        Ok(())
    }
}
