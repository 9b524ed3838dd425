use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use image::{GenericImageView, ImageFormat, ImageOutputFormat};

use crate::{
    extraction::error::{ExtractionError, document_error},
    types::ImageArtifact,
};

/// Folder next to a PDF holding its pages as `<stem>.<page>.png`.
pub const PAGE_CACHE_DIR: &str = "to_image_cache";

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Turns one document into page images, in page order.
pub trait DocumentRasterizer: Send + Sync {
    fn rasterize(&self, document: &Path) -> Result<Vec<ImageArtifact>, ExtractionError>;
}

/// Loads image documents directly. PDFs are served from their pre-rendered
/// page folder; rendering them is left to an external tool.
#[derive(Debug, Default, Clone, Copy)]
pub struct PageImageRasterizer;

impl DocumentRasterizer for PageImageRasterizer {
    fn rasterize(&self, document: &Path) -> Result<Vec<ImageArtifact>, ExtractionError> {
        let bytes = fs::read(document).map_err(|err| {
            document_error(format!("failed to read {}: {err}", document.display()))
        })?;

        let pages = if bytes.starts_with(PDF_MAGIC) {
            let page_paths = pre_rendered_pages(document)?;
            if page_paths.is_empty() {
                return Err(document_error(format!(
                    "{} is a pdf without pre-rendered pages in {}",
                    document.display(),
                    PAGE_CACHE_DIR
                )));
            }
            page_paths
                .iter()
                .map(|page| {
                    let bytes = fs::read(page).map_err(|err| {
                        document_error(format!("failed to read {}: {err}", page.display()))
                    })?;
                    image_artifact(bytes, page)
                })
                .collect::<Result<Vec<_>, _>>()?
        } else {
            vec![image_artifact(bytes, document)?]
        };

        tracing::debug!(
            target: "rasterize",
            document = %document.display(),
            page_count = pages.len(),
            "document_rasterized"
        );
        Ok(pages)
    }
}

/// PNG and JPEG pass through untouched; anything else decodable is re-encoded
/// as PNG so every backend accepts it.
pub fn image_artifact(bytes: Vec<u8>, source: &Path) -> Result<ImageArtifact, ExtractionError> {
    let unsupported = |err: image::ImageError| {
        document_error(format!("unsupported image {}: {err}", source.display()))
    };

    let format = image::guess_format(&bytes).map_err(unsupported)?;
    let decoded = image::load_from_memory(&bytes).map_err(unsupported)?;
    let (width, height) = decoded.dimensions();

    let (bytes, format) = match format {
        ImageFormat::Png => (bytes, "png"),
        ImageFormat::Jpeg => (bytes, "jpeg"),
        _ => {
            let mut buf = Cursor::new(Vec::new());
            decoded
                .write_to(&mut buf, ImageOutputFormat::Png)
                .map_err(unsupported)?;
            (buf.into_inner(), "png")
        }
    };

    Ok(ImageArtifact {
        bytes,
        format: format.to_string(),
        width,
        height,
    })
}

/// Pages sorted by their numeric index, so page 10 follows page 9.
pub fn pre_rendered_pages(document: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    let Some(stem) = document.file_stem().and_then(|stem| stem.to_str()) else {
        return Ok(Vec::new());
    };
    let cache_dir = document
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(PAGE_CACHE_DIR);
    if !cache_dir.is_dir() {
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(&cache_dir).map_err(|err| {
        document_error(format!("failed to list {}: {err}", cache_dir.display()))
    })?;

    let prefix = format!("{stem}.");
    let mut pages = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|err| {
                document_error(format!("failed to list {}: {err}", cache_dir.display()))
            })?
            .path();
        let page_index = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_prefix(&prefix))
            .and_then(|rest| rest.strip_suffix(".png"))
            .and_then(|index| index.parse::<u32>().ok());
        if let Some(page_index) = page_index {
            pages.push((page_index, path));
        }
    }
    pages.sort_by_key(|(page_index, _)| *page_index);

    Ok(pages.into_iter().map(|(_, path)| path).collect())
}
