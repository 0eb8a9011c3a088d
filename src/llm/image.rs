//! Turns the base64 image blobs sent by the browser into data URLs the
//! vision endpoint accepts.

use base64::{ engine::general_purpose::STANDARD, Engine as _ };

use crate::error::ModelError;

const DEFAULT_MIME: &str = "image/jpeg";

/// Returns a `data:` URL for `image`, which is either raw base64 or already a
/// base64 data URL. The MIME type is taken from the decoded magic bytes.
pub fn to_data_url(image: &str) -> Result<String, ModelError> {
    let payload = match image.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(";base64,")
            .map(|(_, data)| data)
            .ok_or_else(|| ModelError::InvalidImage("data URL is not base64 encoded".into()))?,
        None => image,
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(ModelError::InvalidImage("empty image payload".into()));
    }

    let bytes = STANDARD.decode(payload).map_err(|e| ModelError::InvalidImage(e.to_string()))?;
    Ok(format!("data:{};base64,{}", sniff_mime(&bytes), payload))
}

fn sniff_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xff, 0xd8, 0xff, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => DEFAULT_MIME,
    }
}
