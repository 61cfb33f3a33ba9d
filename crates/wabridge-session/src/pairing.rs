//! Pairing code rendering.
//!
//! The driver hands out the raw pairing string; the HTTP surface serves it as a
//! PNG data URI that a browser can drop straight into an `<img>` tag.

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{DynamicImage, ImageFormat, Luma};
use qrcode::QrCode;

use crate::error::{SessionError, SessionResult};

/// Prefix of every rendered pairing image.
pub const DATA_URI_PREFIX: &str = "data:image/png;base64,";

/// Smallest edge of the rendered image in pixels.
const MIN_DIMENSION: u32 = 256;

/// Render a raw pairing code into a `data:image/png;base64,...` URI.
pub fn render_data_uri(code: &str) -> SessionResult<String> {
    if code.is_empty() {
        return Err(SessionError::render("empty pairing code"));
    }

    let qr = QrCode::new(code.as_bytes()).map_err(|e| SessionError::render(e.to_string()))?;
    let pixels = qr
        .render::<Luma<u8>>()
        .min_dimensions(MIN_DIMENSION, MIN_DIMENSION)
        .build();

    let mut png = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(pixels)
        .write_to(&mut png, ImageFormat::Png)
        .map_err(|e| SessionError::render(e.to_string()))?;

    Ok(format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(png.into_inner())))
}
