//! Local compressor built on the `image` crate.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::DynamicImage;
use tracing::debug;

use crate::config::{CompressionOptions, ImageFormat};
use crate::core::CompressedImage;
use crate::stages::Compressor;

/// Decodes, downsizes and re-encodes images in-process.
///
/// Decoding and encoding run on the blocking pool. PNG and WebP output is
/// lossless; `quality` only affects JPEG. When the source is already in the
/// target format and fits the bounds, a re-encode that is not smaller is
/// discarded and the source bytes are kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCompressor {
    filter: Filter,
}

/// Resampling filter used when shrinking.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Filter {
    /// Fast, lower quality.
    Triangle,
    /// Slow, sharpest result.
    #[default]
    Lanczos3,
}

impl From<Filter> for FilterType {
    fn from(filter: Filter) -> Self {
        match filter {
            Filter::Triangle => Self::Triangle,
            Filter::Lanczos3 => Self::Lanczos3,
        }
    }
}

impl ImageCompressor {
    /// Creates a compressor with the default filter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the resampling filter.
    #[must_use]
    pub const fn with_filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }
}

#[async_trait]
impl Compressor for ImageCompressor {
    async fn compress(&self, raw: &[u8], options: &CompressionOptions) -> Result<CompressedImage> {
        if raw.is_empty() {
            bail!("image data is empty");
        }
        if !options.enabled {
            let format = ImageFormat::sniff(raw).unwrap_or(options.target_format);
            return Ok(CompressedImage::new(raw.to_vec(), format));
        }

        let raw = raw.to_vec();
        let options = options.clone();
        let filter = self.filter;
        tokio::task::spawn_blocking(move || transcode(&raw, &options, filter))
            .await
            .map_err(|e| anyhow!("image worker did not complete: {e}"))?
    }
}

fn transcode(raw: &[u8], options: &CompressionOptions, filter: Filter) -> Result<CompressedImage> {
    let source_format =
        image::guess_format(raw).context("unrecognized or corrupt image data")?;
    let decoded = image::load_from_memory_with_format(raw, source_format)
        .with_context(|| format!("failed to decode {source_format:?} image"))?;

    let (width, height) = (decoded.width(), decoded.height());
    let (target_width, target_height) =
        fit_within(width, height, options.max_width, options.max_height);
    let resized = if (target_width, target_height) == (width, height) {
        decoded
    } else {
        decoded.resize_exact(target_width, target_height, filter.into())
    };

    let mut bytes = encode(&resized, options.target_format, options.quality)?;
    let unchanged = (target_width, target_height) == (width, height)
        && ImageFormat::sniff(raw) == Some(options.target_format);
    if unchanged && bytes.len() >= raw.len() {
        debug!(
            encoded = bytes.len(),
            source = raw.len(),
            "Re-encode not smaller, keeping source bytes"
        );
        bytes = raw.to_vec();
    }
    debug!(
        from = ?(width, height),
        to = ?(target_width, target_height),
        format = %options.target_format,
        bytes = bytes.len(),
        "Image transcoded"
    );
    Ok(CompressedImage::new(bytes, options.target_format)
        .with_dimensions(target_width, target_height))
}

/// Largest size with the same aspect ratio that fits inside the box.
/// Never enlarges.
pub(crate) fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let scale = (f64::from(max_width) / f64::from(width))
        .min(f64::from(max_height) / f64::from(height));
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let scaled = |side: u32| ((f64::from(side) * scale).round() as u32).max(1);
    (
        scaled(width).min(max_width),
        scaled(height).min(max_height),
    )
}

fn encode(image: &DynamicImage, format: ImageFormat, quality: u8) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    match format {
        ImageFormat::Jpeg => {
            let rgb = DynamicImage::ImageRgb8(image.to_rgb8());
            rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut out, quality))
        }
        ImageFormat::Png => image.write_with_encoder(PngEncoder::new(&mut out)),
        ImageFormat::Webp => {
            let rgba = DynamicImage::ImageRgba8(image.to_rgba8());
            rgba.write_with_encoder(WebPEncoder::new_lossless(&mut out))
        }
    }
    .with_context(|| format!("failed to encode {format}"))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x % 255) as u8, (y % 255) as u8, 128])
        });
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_with_encoder(PngEncoder::new(&mut out))
            .unwrap();
        out
    }

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within(400, 200, 100, 100), (100, 50));
        assert_eq!(fit_within(3840, 2160, 1920, 1080), (1920, 1080));
        assert_eq!(fit_within(1000, 3000, 1920, 1080), (360, 1080));
        assert_eq!(fit_within(50, 40, 1920, 1080), (50, 40));
        assert_eq!(fit_within(10_000, 1, 100, 100), (100, 1));
    }

    #[tokio::test]
    async fn test_downsizes_to_bounds() {
        let options = CompressionOptions::default()
            .with_max_size(100, 100)
            .with_format(ImageFormat::Png);
        let out = ImageCompressor::new()
            .compress(&png_bytes(400, 200), &options)
            .await
            .unwrap();

        assert_eq!(out.format(), ImageFormat::Png);
        assert_eq!(out.dimensions(), Some((100, 50)));
        let decoded = image::load_from_memory(out.bytes()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));
    }

    #[tokio::test]
    async fn test_small_image_not_enlarged() {
        let options = CompressionOptions::default().with_format(ImageFormat::Jpeg);
        let out = ImageCompressor::new()
            .with_filter(Filter::Triangle)
            .compress(&png_bytes(32, 16), &options)
            .await
            .unwrap();

        assert_eq!(out.dimensions(), Some((32, 16)));
        assert_eq!(ImageFormat::sniff(out.bytes()), Some(ImageFormat::Jpeg));
    }

    #[tokio::test]
    async fn test_webp_output() {
        let out = ImageCompressor::new()
            .compress(&png_bytes(20, 20), &CompressionOptions::default())
            .await
            .unwrap();
        assert_eq!(ImageFormat::sniff(out.bytes()), Some(ImageFormat::Webp));
    }

    #[tokio::test]
    async fn test_larger_reencode_keeps_source() {
        let img = DynamicImage::ImageRgb8(image::RgbImage::from_fn(64, 64, |x, y| {
            Rgb([(x * 4) as u8, (y * 4) as u8, ((x + y) * 2) as u8])
        }));
        let mut source = Vec::new();
        img.write_with_encoder(JpegEncoder::new_with_quality(&mut source, 10))
            .unwrap();

        let options = CompressionOptions::default()
            .with_format(ImageFormat::Jpeg)
            .with_quality(100);
        let out = ImageCompressor::new().compress(&source, &options).await.unwrap();

        assert_eq!(out.bytes(), source.as_slice());
        assert_eq!(out.format(), ImageFormat::Jpeg);
        assert_eq!(out.dimensions(), Some((64, 64)));
    }

    #[tokio::test]
    async fn test_webp_ignores_quality() {
        let raw = png_bytes(24, 24);
        let low = ImageCompressor::new()
            .compress(&raw, &CompressionOptions::default().with_quality(5))
            .await
            .unwrap();
        let high = ImageCompressor::new()
            .compress(&raw, &CompressionOptions::default().with_quality(100))
            .await
            .unwrap();
        assert_eq!(low.bytes(), high.bytes());
    }

    #[tokio::test]
    async fn test_rejects_garbage() {
        let err = ImageCompressor::new()
            .compress(b"definitely not an image", &CompressionOptions::default())
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("unrecognized or corrupt"));
    }

    #[tokio::test]
    async fn test_rejects_empty() {
        assert!(ImageCompressor::new()
            .compress(&[], &CompressionOptions::default())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_disabled_passes_through() {
        let raw = png_bytes(8, 8);
        let options = CompressionOptions::default().with_enabled(false);
        let out = ImageCompressor::new().compress(&raw, &options).await.unwrap();

        assert_eq!(out.bytes(), raw.as_slice());
        assert_eq!(out.format(), ImageFormat::Png);
        assert_eq!(out.dimensions(), None);
    }
}
