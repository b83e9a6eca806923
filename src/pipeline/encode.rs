//! Image preparation for OCR: `DynamicImage` → greyscale PNG.
//!
//! Tesseract binarises its input internally; handing it a single-channel
//! image gives the same result for every source format (RGBA page renders,
//! paletted PNGs, JPEG scans), so recognition output depends only on the
//! pixels and not on how they were encoded.
//!
//! The PNG is written to a [`NamedTempFile`] that is removed when dropped, so
//! page images never outlive the OCR call and concurrent runs cannot collide
//! on file names.

use image::{DynamicImage, GrayImage};
use std::io::Write;
use tempfile::NamedTempFile;
use tracing::debug;

/// Convert to 8-bit greyscale (ITU-R 601 luma).
pub fn to_greyscale(img: &DynamicImage) -> GrayImage {
    img.to_luma8()
}

/// Encode a greyscale page into a scoped temporary PNG file.
pub fn write_ocr_png(img: &DynamicImage) -> Result<NamedTempFile, image::ImageError> {
    let grey = DynamicImage::ImageLuma8(to_greyscale(img));

    let mut buf = Vec::new();
    grey.write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let mut tmp = tempfile::Builder::new()
        .prefix("ocr-page-")
        .suffix(".png")
        .tempfile()
        .map_err(image::ImageError::IoError)?;
    tmp.write_all(&buf).map_err(image::ImageError::IoError)?;
    tmp.flush().map_err(image::ImageError::IoError)?;

    debug!(
        "Prepared {}x{} greyscale page → {} ({} bytes)",
        grey.width(),
        grey.height(),
        tmp.path().display(),
        buf.len()
    );
    Ok(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn greyscale_has_one_channel() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 3, Rgba([255, 0, 0, 255])));
        let grey = to_greyscale(&img);
        assert_eq!(grey.dimensions(), (4, 3));
        // Pure red maps to a mid-dark luma, identical on every pixel.
        let first = grey.get_pixel(0, 0)[0];
        assert!(grey.pixels().all(|p| p[0] == first));
    }

    #[test]
    fn temp_png_is_decodable_and_removed_on_drop() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 255])));
        let tmp = write_ocr_png(&img).expect("encode should succeed");
        let path = tmp.path().to_path_buf();

        let decoded = image::open(&path).expect("valid png");
        assert_eq!(decoded.color(), image::ColorType::L8);

        drop(tmp);
        assert!(!path.exists());
    }
}
