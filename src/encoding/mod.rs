// Image encoding - RGBA buffers to self-contained PNG data URLs

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

use crate::engine::ImageBuffer;

pub const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encode an RGBA8 buffer as PNG bytes
pub fn encode_png(image: &ImageBuffer) -> Result<Vec<u8>> {
    if image.width == 0 || image.height == 0 {
        bail!("Cannot encode empty image ({}x{})", image.width, image.height);
    }
    if image.pixels.len() != image.expected_len() {
        bail!(
            "Pixel buffer has {} bytes, expected {} for {}x{} RGBA",
            image.pixels.len(),
            image.expected_len(),
            image.width,
            image.height
        );
    }

    let mut bytes = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut bytes, image.width, image.height);
        encoder.set_color(png::ColorType::Rgba);
        encoder.set_depth(png::BitDepth::Eight);

        let mut writer = encoder.write_header().context("Failed to write PNG header")?;
        writer
            .write_image_data(&image.pixels)
            .context("Failed to write PNG data")?;
        writer.finish().context("Failed to finish PNG stream")?;
    }

    Ok(bytes)
}

/// Encode an RGBA8 buffer as a `data:image/png;base64,...` URL
pub fn encode_data_url(image: &ImageBuffer) -> Result<String> {
    let png = encode_png(image)?;
    Ok(format!("{}{}", PNG_DATA_URL_PREFIX, STANDARD.encode(png)))
}

/// Extract the PNG bytes from a data URL produced by [`encode_data_url`]
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let payload = url
        .strip_prefix(PNG_DATA_URL_PREFIX)
        .context("Not a PNG data URL")?;
    STANDARD
        .decode(payload)
        .context("Data URL payload is not valid base64")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32) -> ImageBuffer {
        ImageBuffer {
            width,
            height,
            pixels: [10u8, 20, 30, 255].repeat((width * height) as usize),
        }
    }

    #[test]
    fn test_data_url_prefix_and_png_signature() {
        let url = encode_data_url(&solid(4, 3)).unwrap();
        assert!(url.starts_with(PNG_DATA_URL_PREFIX));

        let png = decode_data_url(&url).unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn test_png_preserves_dimensions() {
        let png = encode_png(&solid(5, 2)).unwrap();
        let decoder = png::Decoder::new(png.as_slice());
        let reader = decoder.read_info().unwrap();
        assert_eq!(reader.info().width, 5);
        assert_eq!(reader.info().height, 2);
    }

    #[test]
    fn test_rejects_mismatched_buffer() {
        let mut image = solid(2, 2);
        image.pixels.pop();
        let err = encode_png(&image).unwrap_err();
        assert!(err.to_string().contains("expected 16"));
    }

    #[test]
    fn test_rejects_zero_sized_image() {
        let image = ImageBuffer {
            width: 0,
            height: 3,
            pixels: Vec::new(),
        };
        assert!(encode_png(&image).is_err());
    }

    #[test]
    fn test_decode_rejects_foreign_url() {
        assert!(decode_data_url("data:image/jpeg;base64,AAAA").is_err());
    }
}
