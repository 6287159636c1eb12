use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::{debug, info};
use uuid::Uuid;

use super::object_store::{ObjectStore, StorageError, StoredObject};
use crate::models::{ImageKind, MediaError, UploadImageRequest, UploadImageResponse};

/// Largest decoded image accepted for upload.
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// Decodes raw base64 or a `data:<mime>;base64,<payload>` URL.
pub fn decode_image_data(data: &str) -> Result<Vec<u8>, MediaError> {
    let data = data.trim();
    if data.is_empty() {
        return Err(MediaError::ValidationError("imageData is required".to_string()));
    }

    let payload = match data.strip_prefix("data:") {
        Some(rest) => {
            let (meta, payload) = rest
                .split_once(',')
                .ok_or_else(|| MediaError::ValidationError("Malformed data URL".to_string()))?;
            if !meta.ends_with(";base64") {
                return Err(MediaError::ValidationError("Data URL must be base64 encoded".to_string()));
            }
            payload
        }
        None => data,
    };

    let compact: String = payload.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD
        .decode(compact)
        .map_err(|_| MediaError::ValidationError("imageData is not valid base64".to_string()))
}

/// Rejects empty, absolute and `..` paths before they reach the store, along
/// with characters that would change the meaning of the blob URL.
pub fn validate_image_path(path: &str) -> Result<String, MediaError> {
    let path = path.trim();
    let invalid = path.is_empty()
        || path.starts_with('/')
        || path.starts_with('\\')
        || path
            .chars()
            .any(|c| c.is_control() || matches!(c, ':' | '?' | '#' | '%'))
        || path
            .split(['/', '\\'])
            .any(|segment| segment.is_empty() || segment == "." || segment == "..");

    if invalid {
        return Err(MediaError::ValidationError(format!("Invalid image path '{}'", path)));
    }
    Ok(path.to_string())
}

fn folder_for(encounter_id: Option<&str>) -> Result<String, MediaError> {
    match encounter_id.map(str::trim).filter(|id| !id.is_empty()) {
        Some(id) => {
            let valid = id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
                && id != "."
                && id != "..";
            if !valid {
                return Err(MediaError::ValidationError(format!("Invalid encounterId '{}'", id)));
            }
            Ok(id.to_string())
        }
        None => Ok("unassigned".to_string()),
    }
}

pub struct ImageService {
    store: Arc<dyn ObjectStore>,
}

impl ImageService {
    pub fn new(store: Option<Arc<dyn ObjectStore>>) -> Result<Self, MediaError> {
        let store = store.ok_or(StorageError::NotConfigured)?;
        Ok(Self { store })
    }

    pub async fn upload(&self, request: UploadImageRequest) -> Result<UploadImageResponse, MediaError> {
        let bytes = decode_image_data(&request.image_data)?;
        if bytes.len() > MAX_IMAGE_BYTES {
            return Err(MediaError::ValidationError(format!(
                "Image is {} bytes, the limit is {}",
                bytes.len(),
                MAX_IMAGE_BYTES
            )));
        }
        let kind = ImageKind::sniff(&bytes)
            .ok_or_else(|| MediaError::ValidationError("Only PNG and JPEG images are accepted".to_string()))?;

        let folder = folder_for(request.encounter_id.as_deref())?;
        let image_path = format!("{}/{}.{}", folder, Uuid::new_v4(), kind.extension());
        let size = bytes.len();

        self.store.put(&image_path, bytes, kind.content_type()).await?;
        info!("Uploaded image {}", image_path);

        Ok(UploadImageResponse {
            url: self.store.object_url(&image_path),
            image_path,
            content_type: kind.content_type().to_string(),
            size,
        })
    }

    pub async fn fetch(&self, path: &str) -> Result<StoredObject, MediaError> {
        let path = validate_image_path(path)?;
        debug!("Fetching image {}", path);

        self.store
            .get(&path)
            .await?
            .ok_or_else(|| MediaError::NotFound(format!("Image {}", path)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn decodes_plain_and_data_url() {
        assert_eq!(decode_image_data("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_image_data("data:image/png;base64,aGVs\nbG8=").unwrap(), b"hello");
        assert_matches!(decode_image_data("data:image/png,hello"), Err(MediaError::ValidationError(_)));
        assert_matches!(decode_image_data("***"), Err(MediaError::ValidationError(_)));
        assert_matches!(decode_image_data("  "), Err(MediaError::ValidationError(_)));
    }

    #[test]
    fn sniffs_magic_bytes() {
        assert_eq!(ImageKind::sniff(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0]), Some(ImageKind::Png));
        assert_eq!(ImageKind::sniff(&[0xFF, 0xD8, 0xFF, 0xE0]), Some(ImageKind::Jpeg));
        assert_eq!(ImageKind::sniff(b"GIF89a"), None);
    }

    #[test]
    fn rejects_escaping_paths() {
        assert_eq!(validate_image_path("ENC-1/a.png").unwrap(), "ENC-1/a.png");
        assert!(validate_image_path("../secret").is_err());
        assert!(validate_image_path("ENC-1/../../x").is_err());
        assert!(validate_image_path("/etc/passwd").is_err());
        assert!(validate_image_path("C:\\x.png").is_err());
        assert!(validate_image_path("a//b.png").is_err());
    }

    #[test]
    fn rejects_url_syntax_in_paths() {
        assert!(validate_image_path("ENC-1/a.png?comp=list").is_err());
        assert!(validate_image_path("ENC-1/a.png#frag").is_err());
        assert!(validate_image_path("ENC-1/%2e%2e/x.png").is_err());
        assert!(validate_image_path("ENC-1/a\nb.png").is_err());
        assert_eq!(validate_image_path("ENC-1/scan 2.png").unwrap(), "ENC-1/scan 2.png");
    }

    #[test]
    fn folders_default_to_unassigned() {
        assert_eq!(folder_for(None).unwrap(), "unassigned");
        assert_eq!(folder_for(Some("  ")).unwrap(), "unassigned");
        assert_eq!(folder_for(Some("ENC-7")).unwrap(), "ENC-7");
        assert!(folder_for(Some("../x")).is_err());
    }
}
