//! Downsampled derivatives of captured frames.

use crate::catalog::is_derived;
use cammy_config::ResizeConfig;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// Marker inserted before the extension of a derivative's name.
pub const DERIVED_MARKER: &str = "_sml";

#[derive(Debug, Error)]
pub enum ResizeError {
    #[error("Failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to decode {path}: {source}")]
    Decode {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Name of the derivative for `filename`: `a.jpg` -> `a_sml.jpg`.
///
/// A leading dot does not start an extension, so `.jpg` -> `.jpg_sml`.
pub fn derived_name(filename: &str) -> String {
    match filename.rfind('.') {
        Some(dot) if dot > 0 => format!(
            "{}{}{}",
            &filename[..dot],
            DERIVED_MARKER,
            &filename[dot..]
        ),
        _ => format!("{}{}", filename, DERIVED_MARKER),
    }
}

/// Dimensions that fit `width`x`height` inside the bounding box.
///
/// Aspect ratio is kept and images already inside the box are never enlarged.
pub fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || max_width == 0 || max_height == 0 {
        return (width, height);
    }
    if width <= max_width && height <= max_height {
        return (width, height);
    }

    let scale = f64::min(
        max_width as f64 / width as f64,
        max_height as f64 / height as f64,
    );
    let new_width = ((width as f64 * scale).round() as u32).clamp(1, max_width);
    let new_height = ((height as f64 * scale).round() as u32).clamp(1, max_height);
    (new_width, new_height)
}

/// Writes a downsampled JPEG next to `filename` and returns the derivative's name.
///
/// Derivatives are returned unchanged without touching the disk. The original
/// is never modified.
pub fn resize_image(dir: &Path, filename: &str, cfg: &ResizeConfig) -> Result<String, ResizeError> {
    if is_derived(filename) {
        return Ok(filename.to_string());
    }

    let source = dir.join(filename);
    let img = ImageReader::open(&source)
        .map_err(|e| ResizeError::Open {
            path: source.clone(),
            source: e,
        })?
        .with_guessed_format()
        .map_err(|e| ResizeError::Open {
            path: source.clone(),
            source: e,
        })?
        .decode()
        .map_err(|e| ResizeError::Decode {
            path: source.clone(),
            source: e,
        })?;

    let (width, height) = fit_within(img.width(), img.height(), cfg.max_width, cfg.max_height);
    let resized = if (width, height) == (img.width(), img.height()) {
        img
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3)
    };

    let out_name = derived_name(filename);
    let out_path = dir.join(&out_name);
    if let Err(e) = write_jpeg(&resized, &out_path, cfg.quality) {
        let _ = fs::remove_file(&out_path);
        return Err(e);
    }

    info!(source = %source.display(), derived = %out_name, width, height, "Resized image");
    Ok(out_name)
}

fn write_jpeg(img: &DynamicImage, path: &Path, quality: u8) -> Result<(), ResizeError> {
    let write_err = |source| ResizeError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let encoder = JpegEncoder::new_with_quality(&mut writer, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|source| ResizeError::Encode {
            path: path.to_path_buf(),
            source,
        })?;

    writer.flush().map_err(write_err)
}
