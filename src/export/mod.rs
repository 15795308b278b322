//! Export renderer.
//!
//! Assembles the download archive from whatever surface renders the slides.
//! The surface is reached through [`SlideRasterizer`]; archive naming,
//! ordering and the video/overlay split live here and do not depend on how
//! pixels are produced.

#[cfg(feature = "raster")]
pub mod raster;

use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::carousel::data_uri::DataUri;
use crate::carousel::model::{Carousel, Slide};
use crate::carousel::style::{self, VisualKind};
use crate::error::{CarouselError, CarouselResult};

#[cfg(feature = "raster")]
pub use raster::FlatRasterizer;

/// Width in pixels of every exported still image.
pub const TARGET_WIDTH: u32 = 1080;

/// Scale used for transparent overlay captures of video slides.
pub const OVERLAY_SCALE: f64 = 2.0;

const FALLBACK_ARCHIVE_STEM: &str = "carousel";

/// A slide as currently shown by the rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSlide {
    pub slide_id: String,
    /// Rendered width in surface pixels.
    pub width: u32,
}

/// Options for one capture.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureOptions {
    pub scale: f64,
    /// Canvas fill; `None` is transparent.
    pub background: Option<String>,
}

/// Rendering surface able to rasterize slides.
#[async_trait]
pub trait SlideRasterizer: Send + Sync {
    /// Slides the surface shows, in surface order (not necessarily document order).
    async fn rendered_slides(&self) -> CarouselResult<Vec<RenderedSlide>>;

    /// Strips visual-only decorations (transforms, shadows, rounded corners).
    async fn begin_capture(&self, _slide_id: &str) -> CarouselResult<()> {
        Ok(())
    }

    /// Restores what `begin_capture` stripped.
    async fn end_capture(&self, _slide_id: &str) -> CarouselResult<()> {
        Ok(())
    }

    /// Shows or hides the slide's video layer.
    async fn set_video_visible(&self, _slide_id: &str, _visible: bool) -> CarouselResult<()> {
        Ok(())
    }

    /// Captures the slide as PNG bytes.
    async fn capture(&self, slide_id: &str, options: &CaptureOptions) -> CarouselResult<Vec<u8>>;
}

/// One file in the archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveEntry {
    pub name: String,
    pub bytes: Vec<u8>,
}

/// A finished archive, held in memory until written.
#[derive(Debug, Clone)]
pub struct ExportArchive {
    pub file_name: String,
    pub bytes: Vec<u8>,
    pub entries: Vec<String>,
}

impl ExportArchive {
    /// Writes the archive into `dir` and returns its path.
    pub fn write_to(&self, dir: &Path) -> CarouselResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Archive file name: lowercase title with every other character replaced by `_`.
pub fn archive_file_name(title: &str) -> String {
    let stem: String = title
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    if stem.is_empty() {
        format!("{}.zip", FALLBACK_ARCHIVE_STEM)
    } else {
        format!("{}.zip", stem)
    }
}

/// Renders every slide and packages the results.
///
/// Any failure aborts the export: nothing is returned except
/// [`CarouselError::Export`].
pub async fn export_carousel(
    carousel: &Carousel,
    rasterizer: &dyn SlideRasterizer,
) -> CarouselResult<ExportArchive> {
    match build_archive(carousel, rasterizer).await {
        Ok(archive) => {
            info!(
                carousel_id = %carousel.id,
                file = %archive.file_name,
                entries = archive.entries.len(),
                "carousel exported"
            );
            Ok(archive)
        }
        Err(e) => {
            error!(carousel_id = %carousel.id, error = %e, "failed to export carousel");
            Err(match e {
                CarouselError::Export(msg) => CarouselError::Export(msg),
                other => CarouselError::export(other.to_string()),
            })
        }
    }
}

async fn build_archive(
    carousel: &Carousel,
    rasterizer: &dyn SlideRasterizer,
) -> CarouselResult<ExportArchive> {
    let positions: HashMap<&str, usize> = carousel
        .slides
        .iter()
        .enumerate()
        .map(|(i, s)| (s.id.as_str(), i))
        .collect();

    let mut nodes: Vec<(usize, RenderedSlide)> = Vec::new();
    for node in rasterizer.rendered_slides().await? {
        match positions.get(node.slide_id.as_str()) {
            Some(index) => nodes.push((*index, node)),
            None => debug!(slide_id = %node.slide_id, "skipping rendered node with no slide"),
        }
    }
    nodes.sort_by_key(|(index, _)| *index);

    let mut entries = Vec::new();
    for (position, (index, node)) in nodes.iter().enumerate() {
        let slide = &carousel.slides[*index];
        let number = position + 1;

        rasterizer.begin_capture(&slide.id).await?;
        let captured = capture_slide(carousel, slide, node, number, rasterizer).await;
        let restored = rasterizer.end_capture(&slide.id).await;
        entries.extend(captured?);
        restored?;
    }

    let names = entries.iter().map(|e| e.name.clone()).collect();
    Ok(ExportArchive {
        file_name: archive_file_name(&carousel.title),
        bytes: zip_entries(&entries)?,
        entries: names,
    })
}

async fn capture_slide(
    carousel: &Carousel,
    slide: &Slide,
    node: &RenderedSlide,
    number: usize,
    rasterizer: &dyn SlideRasterizer,
) -> CarouselResult<Vec<ArchiveEntry>> {
    let prefs = &carousel.preferences;
    let visual = style::background_image(Some(slide), Some(prefs));

    match (VisualKind::of(visual), visual) {
        (VisualKind::Video, Some(uri)) => {
            let video = DataUri::parse(uri)?;
            let video_entry = ArchiveEntry {
                name: format!("slide-{}.{}", number, video.extension()),
                bytes: video.bytes,
            };

            rasterizer.set_video_visible(&slide.id, false).await?;
            let overlay = rasterizer
                .capture(
                    &slide.id,
                    &CaptureOptions {
                        scale: OVERLAY_SCALE,
                        background: None,
                    },
                )
                .await;
            rasterizer.set_video_visible(&slide.id, true).await?;

            Ok(vec![
                video_entry,
                ArchiveEntry {
                    name: format!("slide-{}_overlay.png", number),
                    bytes: overlay?,
                },
            ])
        }
        _ => {
            if node.width == 0 {
                return Err(CarouselError::export(format!("slide {} has zero width", slide.id)));
            }
            let options = CaptureOptions {
                scale: TARGET_WIDTH as f64 / node.width as f64,
                background: match visual {
                    Some(_) => None,
                    None => Some(style::background_color(Some(slide), Some(prefs))),
                },
            };
            let png = rasterizer.capture(&slide.id, &options).await?;
            Ok(vec![ArchiveEntry {
                name: format!("slide-{}.png", number),
                bytes: png,
            }])
        }
    }
}

fn zip_entries(entries: &[ArchiveEntry]) -> CarouselResult<Vec<u8>> {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));

    for entry in entries {
        let options = zip::write::FileOptions::<()>::default()
            .compression_method(zip::CompressionMethod::Deflated);
        zip.start_file(entry.name.as_str(), options)?;
        zip.write_all(&entry.bytes)?;
    }
    Ok(zip.finish()?.into_inner())
}
