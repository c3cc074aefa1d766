use crate::models::OutputFormat;

/// Identify an encoded image by its magic bytes.
pub fn sniff_format(bytes: &[u8]) -> Option<OutputFormat> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some(OutputFormat::Jpeg),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(OutputFormat::Png),
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Some(OutputFormat::Webp),
        [0x42, 0x4D, ..] => Some(OutputFormat::Bmp),
        _ => None,
    }
}

pub fn detect_image_mime(bytes: &[u8]) -> &'static str {
    match sniff_format(bytes) {
        Some(format) => format.mime_type(),
        None => {
            tracing::warn!(
                "Unrecognized image format (first 4 bytes: {:02X?}), falling back to image/png",
                &bytes[..bytes.len().min(4)]
            );
            "image/png"
        }
    }
}
