use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::encoded::{
    media_type_for_path, sniff_media_type, DecodeError, EncodedImage, FALLBACK_MEDIA_TYPE,
};

/// Revocable reference used to display an upload before it is sent anywhere.
///
/// Not `Clone`; [`PreviewRegistry::revoke`] consumes it.
#[derive(Debug, PartialEq, Eq)]
pub struct PreviewHandle {
    id: u64,
    url: String,
}

impl PreviewHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Debug, Default)]
pub struct PreviewRegistry {
    next_id: u64,
    live: BTreeMap<u64, String>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn issue(&mut self, name: &str) -> PreviewHandle {
        self.next_id += 1;
        let id = self.next_id;
        let url = format!("preview://{id}/{name}");
        self.live.insert(id, url.clone());
        PreviewHandle { id, url }
    }

    pub fn revoke(&mut self, handle: PreviewHandle) -> bool {
        self.live.remove(&handle.id).is_some()
    }

    pub fn is_live(&self, handle: &PreviewHandle) -> bool {
        self.live.contains_key(&handle.id)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }
}

#[derive(Debug)]
pub struct ImageUpload {
    image: EncodedImage,
    preview: PreviewHandle,
}

impl ImageUpload {
    pub fn new(image: EncodedImage, registry: &mut PreviewRegistry) -> Self {
        let preview = registry.issue(image.name());
        Self { image, preview }
    }

    pub fn image(&self) -> &EncodedImage {
        &self.image
    }

    pub fn preview(&self) -> &PreviewHandle {
        &self.preview
    }

    pub fn release(self, registry: &mut PreviewRegistry) -> EncodedImage {
        registry.revoke(self.preview);
        self.image
    }
}

/// Reads a file into an [`EncodedImage`].
///
/// The media type comes from the extension, then from the leading bytes, and
/// finally falls back to `application/octet-stream`.
pub fn read_image_file(path: &Path) -> Result<EncodedImage, DecodeError> {
    let bytes = fs::read(path).map_err(|source| DecodeError::Unreadable {
        path: path.display().to_string(),
        source,
    })?;
    let media_type = media_type_for_path(path)
        .or_else(|| sniff_media_type(&bytes))
        .unwrap_or(FALLBACK_MEDIA_TYPE);
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .unwrap_or("upload")
        .to_string();
    Ok(EncodedImage::from_bytes(&bytes, media_type, name))
}

/// One image slot; a new upload replaces the previous one.
#[derive(Debug, Default)]
pub struct SingleUpload {
    current: Option<ImageUpload>,
}

impl SingleUpload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&self) -> Option<&EncodedImage> {
        self.current.as_ref().map(ImageUpload::image)
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.current.as_ref().map(ImageUpload::preview)
    }

    pub fn replace(&mut self, image: EncodedImage, registry: &mut PreviewRegistry) {
        self.clear(registry);
        self.current = Some(ImageUpload::new(image, registry));
    }

    /// Loads `path` into the slot. A failed read leaves the slot empty.
    pub fn load(
        &mut self,
        path: &Path,
        registry: &mut PreviewRegistry,
    ) -> Result<(), DecodeError> {
        match read_image_file(path) {
            Ok(image) => {
                self.replace(image, registry);
                Ok(())
            }
            Err(err) => {
                self.clear(registry);
                Err(err)
            }
        }
    }

    pub fn clear(&mut self, registry: &mut PreviewRegistry) -> Option<EncodedImage> {
        self.current.take().map(|upload| upload.release(registry))
    }
}

/// Ordered multi-image selection.
#[derive(Debug, Default)]
pub struct MultiUpload {
    items: Vec<ImageUpload>,
}

impl MultiUpload {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn images(&self) -> impl Iterator<Item = &EncodedImage> {
        self.items.iter().map(ImageUpload::image)
    }

    pub fn get(&self, index: usize) -> Option<&ImageUpload> {
        self.items.get(index)
    }

    pub fn append(&mut self, images: Vec<EncodedImage>, registry: &mut PreviewRegistry) {
        for image in images {
            self.items.push(ImageUpload::new(image, registry));
        }
    }

    /// Reads every path before touching the selection, so one unreadable
    /// file leaves the existing items as they were.
    pub fn append_paths<P: AsRef<Path>>(
        &mut self,
        paths: &[P],
        registry: &mut PreviewRegistry,
    ) -> Result<usize, DecodeError> {
        let images = paths
            .iter()
            .map(|path| read_image_file(path.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        let added = images.len();
        self.append(images, registry);
        Ok(added)
    }

    pub fn remove(&mut self, index: usize, registry: &mut PreviewRegistry) -> Option<EncodedImage> {
        if index >= self.items.len() {
            return None;
        }
        Some(self.items.remove(index).release(registry))
    }

    pub fn clear(&mut self, registry: &mut PreviewRegistry) {
        for upload in self.items.drain(..) {
            upload.release(registry);
        }
    }
}
