//! PDF extractor built on lopdf.

use super::{DocumentExtractor, ExtractedDocument, ExtractedImage, ImageFilter};
use crate::error::{IngestError, IngestResult};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::xobject::PdfImage;
use lopdf::{Document, Object, ObjectId};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, warn};

/// Extractor for PDF files: page text plus embedded figures.
pub struct PdfExtractor {
    filter: ImageFilter,
}

impl PdfExtractor {
    pub fn new(filter: ImageFilter) -> Self {
        Self { filter }
    }

    fn page_images(
        &self,
        doc: &Document,
        page_number: u32,
        page_id: lopdf::ObjectId,
        out: &mut Vec<ExtractedImage>,
    ) {
        let images = match doc.get_page_images(page_id) {
            Ok(images) => images,
            Err(e) => {
                debug!(page = page_number, "Could not list images: {}", e);
                return;
            }
        };

        for (index, img) in images.iter().enumerate() {
            let (Ok(width), Ok(height)) = (u32::try_from(img.width), u32::try_from(img.height))
            else {
                continue;
            };

            let Some((bytes, media_type)) = decode_image(doc, img, width, height) else {
                debug!(
                    page = page_number,
                    filters = ?img.filters,
                    color_space = ?img.color_space,
                    "Skipping image with unsupported encoding"
                );
                continue;
            };

            if !self.filter.accepts(bytes.len(), width, height) {
                debug!(
                    page = page_number,
                    bytes = bytes.len(),
                    width,
                    height,
                    "Skipping small image"
                );
                continue;
            }

            out.push(ExtractedImage {
                page: page_number,
                index: index as u32,
                bytes,
                width,
                height,
                media_type,
            });
        }
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new(ImageFilter::default())
    }
}

impl DocumentExtractor for PdfExtractor {
    fn extract(&self, path: &Path, bytes: &[u8]) -> IngestResult<ExtractedDocument> {
        debug!("Extracting PDF: {:?}", path);

        let doc = Document::load_mem(bytes)
            .map_err(|e| IngestError::extraction(path, format!("failed to load PDF: {}", e)))?;

        let mut out = ExtractedDocument::default();
        for (&number, &page_id) in doc.get_pages().iter() {
            match doc.extract_text(&[number]) {
                Ok(text) => out.push_page(number, clean_pdf_text(&text)),
                Err(e) => warn!(path = %path.display(), page = number, "No text extracted: {}", e),
            }

            if self.filter.enabled {
                self.page_images(&doc, number, page_id, &mut out.images);
            }
        }

        debug!(
            "Extracted {} pages and {} images from {:?}",
            out.pages.len(),
            out.images.len(),
            path
        );
        Ok(out)
    }

    fn extensions(&self) -> &[&str] {
        &["pdf"]
    }
}

/// Turn an image XObject into bytes a captioning model accepts.
///
/// A stream whose innermost filter is DCTDecode is JPEG data: any outer
/// filters are undone and the JPEG is passed through. Uncompressed or Flate
/// streams of 8-bit RGB or grayscale samples are re-encoded as PNG. Anything
/// else (CCITT, JBIG2, indexed palettes, ...) yields `None`.
fn decode_image(
    doc: &Document,
    img: &PdfImage<'_>,
    width: u32,
    height: u32,
) -> Option<(Vec<u8>, &'static str)> {
    let filters: &[String] = img.filters.as_deref().unwrap_or(&[]);

    if let Some((last, outer)) = filters.split_last() {
        if last == "DCTDecode" {
            let jpeg = if outer.is_empty() {
                img.content.to_vec()
            } else {
                strip_filters(doc, img.id, outer)?
            };
            return jpeg.starts_with(&[0xFF, 0xD8]).then_some((jpeg, "image/jpeg"));
        }
    }

    if img.bits_per_component != Some(8) || filters.iter().any(|f| f != "FlateDecode") {
        return None;
    }

    let raw = if filters.is_empty() {
        img.content.to_vec()
    } else {
        doc.get_object(img.id)
            .and_then(|obj| obj.as_stream())
            .and_then(|stream| stream.decompressed_content())
            .ok()?
    };

    let png = encode_png(raw, width, height, img.color_space.as_deref()?)?;
    Some((png, "image/png"))
}

/// Decode only the `outer` filters of a stream, leaving its inner encoding.
fn strip_filters(doc: &Document, id: ObjectId, outer: &[String]) -> Option<Vec<u8>> {
    let mut stream = doc
        .get_object(id)
        .and_then(|obj| obj.as_stream())
        .ok()?
        .clone();
    let names = outer
        .iter()
        .map(|name| Object::Name(name.as_bytes().to_vec()))
        .collect::<Vec<_>>();
    stream.dict.set("Filter", Object::Array(names));
    stream.decompressed_content().ok()
}

/// Encode raw 8-bit samples as PNG.
fn encode_png(mut raw: Vec<u8>, width: u32, height: u32, color_space: &str) -> Option<Vec<u8>> {
    let pixels = width as usize * height as usize;
    let image = match color_space {
        "DeviceRGB" => {
            raw.truncate(pixels * 3);
            DynamicImage::ImageRgb8(RgbImage::from_raw(width, height, raw)?)
        }
        "DeviceGray" => {
            raw.truncate(pixels);
            DynamicImage::ImageLuma8(GrayImage::from_raw(width, height, raw)?)
        }
        _ => return None,
    };

    let mut out = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .ok()?;
    Some(out)
}

/// Clean up extracted PDF text.
fn clean_pdf_text(text: &str) -> String {
    text.lines()
        .map(|line| line.trim())
        // Collapse runs of empty lines
        .fold(Vec::new(), |mut acc, line| {
            let last_was_empty = acc.last().map(|s: &String| s.is_empty()).unwrap_or(false);
            if !(line.is_empty() && last_was_empty) {
                acc.push(line.to_string());
            }
            acc
        })
        .join("\n")
        .trim()
        .to_string()
}
