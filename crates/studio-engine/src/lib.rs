pub mod collaborator;
pub mod config;
pub mod google;
pub mod orchestrator;

pub use collaborator::{CollaboratorError, GenerationCollaborator};
pub use config::{ConfigError, StudioConfig};
pub use google::GoogleGenAiClient;
pub use orchestrator::{failure_message, Orchestrator, PendingRequest, ValidationError};
