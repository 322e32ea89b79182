//! Artifact encoding: `DynamicImage` → PNG bytes, binary → base64 text.
//!
//! PNG keeps redaction boxes and remaining text edges crisp; the lossy JPEG
//! used inside redacted PDF pages is never exposed as an image artifact.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        width = img.width(),
        height = img.height(),
        bytes = buf.len(),
        "Encoded page PNG"
    );
    Ok(buf)
}

/// Transport encoding for binary payloads returned inline.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let png = encode_png(&img).expect("encode should succeed");
        assert_eq!(&png[1..4], b"PNG");

        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (10, 10));
    }

    #[test]
    fn base64_is_standard_alphabet_with_padding() {
        assert_eq!(to_base64(b"%PDF-1"), "JVBERi0x");
        assert_eq!(to_base64(&[0xfb, 0xff]), "+/8=");
    }
}
