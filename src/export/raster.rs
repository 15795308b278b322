//! Headless rasterizer.
//!
//! Paints each slide's background layer (fill colour plus the image visual at
//! its effective opacity) into a PNG. Text is left to interactive renderers.
//! Video slides produce a transparent overlay, as the video is shipped
//! separately.

use std::io::Cursor;

use async_trait::async_trait;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use super::{CaptureOptions, RenderedSlide, SlideRasterizer};
use crate::carousel::data_uri::DataUri;
use crate::carousel::model::{Carousel, Slide};
use crate::carousel::style::{self, VisualKind};
use crate::error::{CarouselError, CarouselResult};

/// Width in pixels a slide is laid out at before scaling.
pub const PREVIEW_WIDTH: u32 = 540;

const TRANSPARENT: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// Rasterizer over a carousel snapshot, laying every slide out at [`PREVIEW_WIDTH`].
pub struct FlatRasterizer {
    carousel: Carousel,
    width: u32,
}

impl FlatRasterizer {
    pub fn new(carousel: Carousel) -> Self {
        Self {
            carousel,
            width: PREVIEW_WIDTH,
        }
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = width;
        self
    }

    fn render(&self, slide: &Slide, options: &CaptureOptions) -> CarouselResult<RgbaImage> {
        let prefs = &self.carousel.preferences;
        let width = (self.width as f64 * options.scale).round() as u32;
        if width == 0 {
            return Err(CarouselError::export("capture width is zero"));
        }
        let height = prefs.aspect_ratio.height_for_width(width).max(1);

        let fill = match &options.background {
            Some(color) => parse_hex_color(color)?,
            None => TRANSPARENT,
        };
        let mut canvas = RgbaImage::from_pixel(width, height, fill);

        let visual = style::background_image(Some(slide), Some(prefs));
        if let (VisualKind::Image, Some(uri)) = (VisualKind::of(visual), visual) {
            let decoded = image::load_from_memory(&DataUri::parse(uri)?.bytes)?;
            let layer = decoded
                .resize_to_fill(width, height, FilterType::Triangle)
                .to_rgba8();
            let opacity = style::background_opacity(Some(slide), Some(prefs)).clamp(0.0, 1.0);
            blend(&mut canvas, &layer, opacity);
        }
        Ok(canvas)
    }
}

#[async_trait]
impl SlideRasterizer for FlatRasterizer {
    async fn rendered_slides(&self) -> CarouselResult<Vec<RenderedSlide>> {
        Ok(self
            .carousel
            .slides
            .iter()
            .map(|s| RenderedSlide {
                slide_id: s.id.clone(),
                width: self.width,
            })
            .collect())
    }

    async fn capture(&self, slide_id: &str, options: &CaptureOptions) -> CarouselResult<Vec<u8>> {
        let slide = self
            .carousel
            .slide(slide_id)
            .ok_or_else(|| CarouselError::slide_not_found(slide_id))?;
        let canvas = self.render(slide, options)?;
        debug!(slide_id, width = canvas.width(), height = canvas.height(), "slide rasterized");

        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(canvas).write_to(&mut bytes, ImageFormat::Png)?;
        Ok(bytes.into_inner())
    }
}

/// Draws `layer` over `canvas` with its alpha scaled by `opacity`.
fn blend(canvas: &mut RgbaImage, layer: &RgbaImage, opacity: f64) {
    let mut faded = layer.clone();
    for pixel in faded.pixels_mut() {
        pixel[3] = (pixel[3] as f64 * opacity).round() as u8;
    }
    imageops::overlay(canvas, &faded, 0, 0);
}

/// Parses `#RGB`, `#RRGGBB` or `#RRGGBBAA`.
pub fn parse_hex_color(color: &str) -> CarouselResult<Rgba<u8>> {
    let hex = color.trim().trim_start_matches('#');
    let invalid = || CarouselError::export(format!("invalid colour {}", color));
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(|_| invalid());

    match hex.len() {
        3 => {
            let mut rgb = [0u8; 3];
            for (i, c) in hex.chars().enumerate() {
                let v = c.to_digit(16).ok_or_else(invalid)? as u8;
                rgb[i] = v * 17;
            }
            Ok(Rgba([rgb[0], rgb[1], rgb[2], 255]))
        }
        6 | 8 if hex.is_ascii() => {
            let alpha = if hex.len() == 8 { channel(&hex[6..8])? } else { 255 };
            Ok(Rgba([
                channel(&hex[0..2])?,
                channel(&hex[2..4])?,
                channel(&hex[4..6])?,
                alpha,
            ]))
        }
        _ => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::carousel::model::{AspectRatio, DesignPreferences};
    use crate::export::export_carousel;

    fn png_data_uri(color: [u8; 4]) -> String {
        let image = RgbaImage::from_pixel(4, 4, Rgba(color));
        let mut bytes = Cursor::new(Vec::new());
        DynamicImage::ImageRgba8(image)
            .write_to(&mut bytes, ImageFormat::Png)
            .unwrap();
        DataUri::encode("image/png", &bytes.into_inner())
    }

    fn decode(bytes: &[u8]) -> RgbaImage {
        image::load_from_memory(bytes).unwrap().to_rgba8()
    }

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FFFFFF").unwrap(), Rgba([255, 255, 255, 255]));
        assert_eq!(parse_hex_color("#0f0").unwrap(), Rgba([0, 255, 0, 255]));
        assert_eq!(parse_hex_color("#11182780").unwrap(), Rgba([0x11, 0x18, 0x27, 0x80]));
        assert!(parse_hex_color("red").is_err());
        assert!(parse_hex_color("#12345").is_err());
    }

    #[tokio::test]
    async fn test_capture_fills_and_scales() {
        let carousel = Carousel::new("c", "T")
            .with_preferences(
                DesignPreferences::default()
                    .with_background_color("#FF0000")
                    .with_aspect_ratio(AspectRatio::Portrait),
            )
            .with_slide(Slide::new("a"));
        let raster = FlatRasterizer::new(carousel);
        let options = CaptureOptions {
            scale: 2.0,
            background: Some("#FF0000".to_string()),
        };
        let png = raster.capture("a", &options).await.unwrap();
        let image = decode(&png);
        assert_eq!(image.width(), 1080);
        assert_eq!(image.height(), 1350);
        assert_eq!(*image.get_pixel(0, 0), Rgba([255, 0, 0, 255]));
    }

    #[tokio::test]
    async fn test_image_blended_at_opacity() {
        let mut slide = Slide::new("a").with_background_image(png_data_uri([0, 0, 255, 255]));
        slide.style.background_opacity = Some(0.0);
        let carousel = Carousel::new("c", "T").with_slide(slide);
        let raster = FlatRasterizer::new(carousel).with_width(10);
        let options = CaptureOptions {
            scale: 1.0,
            background: Some("#FFFFFF".to_string()),
        };
        let image = decode(&raster.capture("a", &options).await.unwrap());
        assert_eq!(*image.get_pixel(5, 5), Rgba([255, 255, 255, 255]));
    }

    #[tokio::test]
    async fn test_transparent_without_background() {
        let carousel = Carousel::new("c", "T").with_slide(Slide::new("a"));
        let raster = FlatRasterizer::new(carousel).with_width(8);
        let options = CaptureOptions {
            scale: 1.0,
            background: None,
        };
        let image = decode(&raster.capture("a", &options).await.unwrap());
        assert_eq!(image.get_pixel(0, 0)[3], 0);
    }

    #[tokio::test]
    async fn test_unknown_slide() {
        let raster = FlatRasterizer::new(Carousel::new("c", "T"));
        let options = CaptureOptions {
            scale: 1.0,
            background: None,
        };
        assert!(raster.capture("missing", &options).await.is_err());
    }

    #[tokio::test]
    async fn test_full_export_at_target_width() {
        let carousel = Carousel::new("c", "Flat")
            .with_slide(Slide::new("a"))
            .with_slide(Slide::new("b").with_background_image(png_data_uri([9, 9, 9, 255])));
        let raster = FlatRasterizer::new(carousel.clone());
        let archive = export_carousel(&carousel, &raster).await.unwrap();
        assert_eq!(archive.entries, vec!["slide-1.png", "slide-2.png"]);

        let mut zip = zip::ZipArchive::new(Cursor::new(archive.bytes)).unwrap();
        let mut bytes = Vec::new();
        std::io::Read::read_to_end(&mut zip.by_name("slide-1.png").unwrap(), &mut bytes).unwrap();
        assert_eq!(decode(&bytes).width(), 1080);
    }
}
