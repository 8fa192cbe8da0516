//! Photo optimization ahead of composition.
//!
//! Photos are downsized to the quality preset's bound before either
//! backend touches them, which bounds encoder memory and CPU cost.
//! Optimization is strictly best-effort: a photo that fails to decode or
//! re-encode is passed through unchanged and the job continues.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, Rgb, RgbImage};
use tracing::{debug, info, warn};

use reel_models::QualityPreset;

use crate::error::{MediaError, MediaResult};

/// Compute the optimized size for an image, preserving aspect ratio.
///
/// Images within the bound keep their size; larger images are scaled down
/// proportionally. Output dimensions are always rounded down to even
/// values (encoder requirement for yuv420p).
pub fn target_size(original: (u32, u32), max: (u32, u32)) -> (u32, u32) {
    let (ow, oh) = original;
    let (mw, mh) = max;

    let (w, h) = if ow <= mw && oh <= mh {
        (ow, oh)
    } else {
        let ratio = (mw as f64 / ow as f64).min(mh as f64 / oh as f64);
        ((ow as f64 * ratio) as u32, (oh as f64 * ratio) as u32)
    };

    (even(w), even(h))
}

fn even(v: u32) -> u32 {
    let v = if v % 2 == 0 { v } else { v - 1 };
    v.max(2)
}

/// Optimize a single photo into `output`.
///
/// Applies the decoder's EXIF orientation, flattens transparency onto a
/// white background, scales down to the preset bound if needed and
/// re-encodes as JPEG at the preset quality.
pub fn optimize_photo(input: &Path, output: &Path, preset: QualityPreset) -> MediaResult<()> {
    let reader = ImageReader::open(input)
        .map_err(|e| MediaError::image_failed(input, e.to_string()))?
        .with_guessed_format()
        .map_err(|e| MediaError::image_failed(input, e.to_string()))?;

    let mut decoder = reader
        .into_decoder()
        .map_err(|e| MediaError::image_failed(input, e.to_string()))?;
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut img = DynamicImage::from_decoder(decoder)
        .map_err(|e| MediaError::image_failed(input, e.to_string()))?;
    img.apply_orientation(orientation);

    let rgb = flatten_to_rgb(img);
    let original_size = rgb.dimensions();
    let target = target_size(original_size, preset.max_photo_size());

    let resized = if target != original_size {
        debug!(
            "Resizing {}: {:?} -> {:?}",
            input.display(),
            original_size,
            target
        );
        image::imageops::resize(&rgb, target.0, target.1, FilterType::Lanczos3)
    } else {
        rgb
    };

    let file = File::create(output)?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, preset.jpeg_quality());
    resized
        .write_with_encoder(encoder)
        .map_err(|e| MediaError::image_failed(input, e.to_string()))?;

    Ok(())
}

/// Flatten any alpha channel onto a white background.
fn flatten_to_rgb(img: DynamicImage) -> RgbImage {
    if !img.color().has_alpha() {
        return img.to_rgb8();
    }

    let rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut flat = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = pixel[3] as u16;
        let inv = 255 - alpha;
        let blend = |fg: u8| ((fg as u16 * alpha + 255 * inv) / 255) as u8;
        flat.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }

    flat
}

/// Optimize a photo set element-wise into `temp_dir`.
///
/// The output preserves input order and length: any photo that fails to
/// optimize keeps its original path in the result.
pub fn optimize_photos(photos: &[PathBuf], preset: QualityPreset, temp_dir: &Path) -> Vec<PathBuf> {
    if photos.is_empty() {
        return Vec::new();
    }

    if let Err(e) = std::fs::create_dir_all(temp_dir) {
        warn!(
            "Failed to create optimization directory {}: {}, using originals",
            temp_dir.display(),
            e
        );
        return photos.to_vec();
    }

    info!(
        "Optimizing {} photos with preset {:?}",
        photos.len(),
        preset
    );

    photos
        .iter()
        .enumerate()
        .map(|(i, photo)| {
            let stem = photo
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
                .unwrap_or_else(|| "photo".to_string());
            let output = temp_dir.join(format!("opt_{:03}_{}.jpg", i, stem));

            match optimize_photo(photo, &output, preset) {
                Ok(()) => output,
                Err(e) => {
                    warn!("Photo optimization failed, using original {}: {}", photo.display(), e);
                    photo.clone()
                }
            }
        })
        .collect()
}
