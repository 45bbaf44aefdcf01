//! Image codec helpers.
//!
//! Decoding goes through the `image` crate with format sniffing, so PNG, JPEG,
//! WebP, TIFF and the other enabled formats are handled alike.

use crate::datapoints::EncodedImage;
use crate::error::{VisionError, VisionResult};
use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, ImageReader};
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

const READ_BUFFER_SIZE: usize = 8192;

/// Decodes encoded bytes into a raster.
pub fn decode_image(bytes: &[u8]) -> VisionResult<DynamicImage> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| VisionError::Decode(e.into()))?
        .decode()
        .map_err(VisionError::Decode)
}

/// Encodes a raster as PNG.
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .context("Failed to encode image as PNG")?;
    Ok(buffer.into_inner())
}

/// Reads a file into an [`EncodedImage`] without decoding it.
pub fn read_encoded(path: impl AsRef<Path>) -> Result<EncodedImage> {
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open image: {}", path.display()))?;

    let file_size = file.metadata()?.len() as usize;
    let mut reader = BufReader::with_capacity(READ_BUFFER_SIZE, file);
    let mut buffer = Vec::with_capacity(file_size);
    reader
        .read_to_end(&mut buffer)
        .with_context(|| format!("Failed to read image: {}", path.display()))?;
    Ok(EncodedImage::new(buffer))
}

/// Reads and decodes an image file.
pub fn load_image(path: impl AsRef<Path>) -> Result<DynamicImage> {
    let path = path.as_ref();
    let encoded = read_encoded(path)?;
    decode_image(encoded.as_bytes())
        .with_context(|| format!("Failed to decode image: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn sample_raster() -> DynamicImage {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, Rgb([10, 20, 30]));
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_png_round_trip_through_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("pixel.png");
        std::fs::write(&path, encode_png(&sample_raster())?)?;

        let loaded = load_image(&path)?;
        assert_eq!((loaded.width(), loaded.height()), (3, 2));
        assert_eq!(loaded.to_rgb8().get_pixel(2, 1), &Rgb([10, 20, 30]));
        Ok(())
    }

    #[test]
    fn test_garbage_bytes_are_a_decode_error() {
        let err = decode_image(b"definitely not an image");
        assert!(matches!(err, Err(VisionError::Decode(_))));
    }

    #[test]
    fn test_missing_file_names_path() {
        let err = load_image("/nonexistent/frame.png").unwrap_err();
        assert!(err.to_string().contains("frame.png"));
    }
}
