use studio_contracts::encoded::EncodedImage;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("No image was generated.")]
    NoImageProduced,
    #[error("No image found in the response.")]
    NoImageFound,
    #[error("{0}")]
    Service(String),
}

/// The remote generative-image service, one blocking call per operation.
pub trait GenerationCollaborator: Send + Sync {
    fn name(&self) -> &str;

    fn synthesize_from_text(&self, prompt: &str) -> Result<EncodedImage, CollaboratorError>;

    fn edit_with_image(
        &self,
        prompt: &str,
        image: &EncodedImage,
    ) -> Result<EncodedImage, CollaboratorError>;

    /// Dresses the person in the first image with the garment in the second.
    fn composite_two_images(
        &self,
        person: &EncodedImage,
        garment: &EncodedImage,
    ) -> Result<EncodedImage, CollaboratorError>;
}
