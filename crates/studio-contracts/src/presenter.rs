use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use crate::encoded::EncodedImage;
use crate::session::Session;

pub const RESULT_TITLE: &str = "Generated Output";
pub const BUSY_TEXT: &str = "Generating...";
pub const PLACEHOLDER_TEXT: &str = "Your generated image will appear here";
pub const DEFAULT_EXTENSION: &str = "jpeg";
const DOWNLOAD_PREFIX: &str = "ai-generated-image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultContent<'a> {
    Image(&'a EncodedImage),
    Placeholder(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultView<'a> {
    pub title: &'static str,
    pub busy_overlay: Option<&'static str>,
    pub content: ResultContent<'a>,
    pub error: Option<&'a str>,
    pub save_enabled: bool,
}

impl<'a> ResultView<'a> {
    pub fn from_session(session: &'a Session) -> Self {
        let busy = session.is_busy();
        let content = match session.result() {
            Some(image) if !busy => ResultContent::Image(image),
            _ => ResultContent::Placeholder(PLACEHOLDER_TEXT),
        };
        Self {
            title: RESULT_TITLE,
            busy_overlay: busy.then_some(BUSY_TEXT),
            content,
            error: session.error(),
            save_enabled: session.controls().save_enabled,
        }
    }
}

/// Subtype of `type/subtype`, or `jpeg` when it cannot be recovered or
/// carries anything besides `[a-z0-9+.-]`.
pub fn extension_for_media_type(media_type: Option<&str>) -> String {
    media_type
        .and_then(|value| value.split_once('/'))
        .map(|(_, subtype)| subtype.split(';').next().unwrap_or_default().trim())
        .map(str::to_ascii_lowercase)
        .filter(|subtype| is_safe_extension(subtype))
        .unwrap_or_else(|| DEFAULT_EXTENSION.to_string())
}

fn is_safe_extension(subtype: &str) -> bool {
    !subtype.is_empty()
        && subtype.bytes().any(|byte| byte.is_ascii_alphanumeric())
        && subtype
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || matches!(byte, b'+' | b'.' | b'-'))
}

pub fn download_file_name(media_type: Option<&str>, stamp_millis: i64) -> String {
    format!(
        "{DOWNLOAD_PREFIX}-{stamp_millis}.{}",
        extension_for_media_type(media_type)
    )
}

pub fn save_image(image: &EncodedImage, out_dir: &Path, stamp_millis: i64) -> Result<PathBuf> {
    let media_type = Some(image.media_type()).filter(|value| !value.is_empty());
    let path = out_dir.join(download_file_name(media_type, stamp_millis));
    let bytes = image.decode().context("generated image payload is corrupt")?;
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;
    std::fs::write(&path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Writes the current result to `out_dir`. Refused while busy or when there
/// is nothing to save.
pub fn save_session_result(session: &Session, out_dir: &Path) -> Result<PathBuf> {
    let Some(image) = session.result().filter(|_| session.controls().save_enabled) else {
        bail!("Nothing to save yet.");
    };
    save_image(image, out_dir, chrono::Utc::now().timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::{
        download_file_name, extension_for_media_type, save_image, save_session_result,
        ResultContent, ResultView, BUSY_TEXT, PLACEHOLDER_TEXT,
    };
    use crate::encoded::EncodedImage;
    use crate::session::Session;

    #[test]
    fn extension_follows_media_type_subtype() {
        assert_eq!(extension_for_media_type(Some("image/png")), "png");
        assert_eq!(extension_for_media_type(Some("image/webp")), "webp");
        assert_eq!(extension_for_media_type(Some("image/jpeg")), "jpeg");
    }

    #[test]
    fn extension_falls_back_to_jpeg() {
        assert_eq!(extension_for_media_type(None), "jpeg");
        assert_eq!(extension_for_media_type(Some("")), "jpeg");
        assert_eq!(extension_for_media_type(Some("garbage")), "jpeg");
        assert_eq!(extension_for_media_type(Some("image/")), "jpeg");
    }

    #[test]
    fn server_media_type_cannot_escape_the_output_dir() -> anyhow::Result<()> {
        assert_eq!(extension_for_media_type(Some("image/png/../x")), "jpeg");
        assert_eq!(extension_for_media_type(Some("image/..\\x")), "jpeg");
        assert_eq!(extension_for_media_type(Some("image/svg+xml")), "svg+xml");

        let temp = tempfile::tempdir()?;
        let image = EncodedImage::from_bytes(b"bytes", "image/png/../../escaped", "generated");
        let path = save_image(&image, temp.path(), 7)?;
        assert_eq!(path.parent(), Some(temp.path()));
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some("ai-generated-image-7.jpeg")
        );
        Ok(())
    }

    #[test]
    fn download_name_uses_prefix_and_stamp() {
        assert_eq!(
            download_file_name(Some("image/png"), 1_700_000_000_000),
            "ai-generated-image-1700000000000.png"
        );
    }

    #[test]
    fn save_image_writes_decoded_bytes() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let image = EncodedImage::from_bytes(b"png-bytes", "image/png", "generated");
        let path = save_image(&image, temp.path(), 42)?;
        assert_eq!(
            path.file_name().and_then(|name| name.to_str()),
            Some("ai-generated-image-42.png")
        );
        assert_eq!(std::fs::read(path)?, b"png-bytes");
        Ok(())
    }

    #[test]
    fn view_tracks_busy_result_and_placeholder() {
        let mut session = Session::new();
        session.set_prompt("a cat");

        let idle = ResultView::from_session(&session);
        assert_eq!(idle.content, ResultContent::Placeholder(PLACEHOLDER_TEXT));
        assert!(idle.busy_overlay.is_none());
        assert!(!idle.save_enabled);

        let ticket = session.begin_request();
        let busy = ResultView::from_session(&session);
        assert_eq!(busy.busy_overlay, Some(BUSY_TEXT));
        assert!(!busy.save_enabled);

        let image = EncodedImage::from_bytes(b"x", "image/jpeg", "generated");
        session.complete_request(ticket, Ok(image.clone()));
        let done = ResultView::from_session(&session);
        assert_eq!(done.content, ResultContent::Image(&image));
        assert!(done.save_enabled);
    }

    #[test]
    fn save_is_refused_without_result_or_while_busy() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut session = Session::new();
        assert!(save_session_result(&session, temp.path()).is_err());

        session.set_prompt("a cat");
        let ticket = session.begin_request();
        session.complete_request(ticket, Ok(EncodedImage::from_bytes(b"x", "image/png", "g")));
        let saved = save_session_result(&session, temp.path())?;
        assert!(saved.exists());

        session.begin_request();
        assert!(save_session_result(&session, temp.path()).is_err());
        Ok(())
    }
}
