// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader: parse a document with `lopdf` and answer the two questions the
// rasterizer needs: how many pages are there, and how big is page N.

use escbridge_core::error::{PrintError, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::{debug, instrument};

/// Maximum depth followed through `/Parent` links when resolving inherited
/// page attributes. Guards against cyclic page trees in hostile input.
const MAX_TREE_DEPTH: usize = 32;

/// Page size in PDF points (1/72 inch), after `/Rotate` is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f64,
    pub height_pt: f64,
}

/// Read-only view of a parsed PDF.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data).map_err(|err| {
            PrintError::Render(format!("failed to load PDF from memory: {}", err))
        })?;

        debug!(pages = document.get_pages().len(), "PDF loaded from bytes");

        Ok(Self { document })
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.document.get_pages().len()
    }

    /// Size of the page at `page_index` (0-indexed).
    ///
    /// Reads `/MediaBox` (falling back to `/CropBox`) and `/Rotate`, following
    /// the page tree upwards for inherited values. Quarter-turn rotations swap
    /// width and height, matching what a renderer will produce.
    pub fn page_size(&self, page_index: usize) -> Result<PageSize> {
        let page_id = self.page_id(page_index)?;

        let media_box = self
            .inherited(page_id, b"MediaBox")
            .or_else(|| self.inherited(page_id, b"CropBox"))
            .ok_or_else(|| {
                PrintError::Render(format!("page {} has no /MediaBox", page_index + 1))
            })?;
        let rect = self.rect(&media_box)?;

        let rotation = self
            .inherited(page_id, b"Rotate")
            .and_then(|r| r.as_i64().ok())
            .unwrap_or(0)
            .rem_euclid(360);

        let width = (rect[2] - rect[0]).abs();
        let height = (rect[3] - rect[1]).abs();
        if width <= 0.0 || height <= 0.0 {
            return Err(PrintError::Render(format!(
                "page {} has a degenerate /MediaBox",
                page_index + 1
            )));
        }

        let size = if rotation == 90 || rotation == 270 {
            PageSize {
                width_pt: height,
                height_pt: width,
            }
        } else {
            PageSize {
                width_pt: width,
                height_pt: height,
            }
        };
        debug!(page_index, ?size, rotation, "page geometry");
        Ok(size)
    }

    // -- Helpers --------------------------------------------------------------

    fn page_id(&self, page_index: usize) -> Result<ObjectId> {
        let pages = self.document.get_pages();
        if pages.is_empty() {
            return Err(PrintError::EmptyDocument);
        }
        // lopdf pages are keyed by 1-indexed page number.
        let number = page_index
            .checked_add(1)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(u32::MAX);
        pages.get(&number).copied().ok_or_else(|| {
            PrintError::Render(format!(
                "page index {} out of range (document has {} pages)",
                page_index,
                pages.len()
            ))
        })
    }

    /// Look up `key` on the page dictionary or any ancestor `/Pages` node,
    /// resolving indirect references.
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<Object> {
        let mut node = self.dictionary(page_id)?;
        for _ in 0..MAX_TREE_DEPTH {
            if let Ok(value) = node.get(key) {
                return Some(self.resolve(value).clone());
            }
            let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
            node = self.dictionary(parent)?;
        }
        None
    }

    fn dictionary(&self, id: ObjectId) -> Option<&Dictionary> {
        self.document.get_object(id).ok()?.as_dict().ok()
    }

    fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        match object {
            Object::Reference(id) => self.document.get_object(*id).unwrap_or(object),
            other => other,
        }
    }

    fn rect(&self, object: &Object) -> Result<[f64; 4]> {
        let items = object
            .as_array()
            .map_err(|e| PrintError::Render(format!("/MediaBox is not an array: {e}")))?;
        if items.len() != 4 {
            return Err(PrintError::Render(format!(
                "/MediaBox has {} entries, expected 4",
                items.len()
            )));
        }
        let mut rect = [0.0; 4];
        for (slot, item) in rect.iter_mut().zip(items) {
            *slot = self
                .resolve(item)
                .as_float()
                .map_err(|e| PrintError::Render(format!("/MediaBox entry: {e}")))?
                as f64;
        }
        Ok(rect)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{Stream, dictionary};

    /// Build an in-memory PDF with one blank page per `(width, height)` entry.
    /// The first page's size is set on the `/Pages` node (inherited); the rest
    /// carry their own `/MediaBox`.
    pub(crate) fn blank_pdf(sizes: &[(i64, i64)]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::new();
        for (index, &(w, h)) in sizes.iter().enumerate() {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let mut page = dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            };
            if index > 0 {
                let media_box: Vec<Object> = vec![0.into(), 0.into(), w.into(), h.into()];
                page.set("MediaBox", media_box);
            }
            kids.push(Object::Reference(doc.add_object(page)));
        }
        let (w0, h0) = sizes.first().copied().unwrap_or((612, 792));
        let root_box: Vec<Object> = vec![0.into(), 0.into(), w0.into(), h0.into()];
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => sizes.len() as i64,
            "MediaBox" => root_box,
        };
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut out = Vec::new();
        doc.save_to(&mut out).unwrap();
        out
    }

    #[test]
    fn counts_pages() {
        let reader = PdfReader::from_bytes(&blank_pdf(&[(200, 400), (300, 300)])).unwrap();
        assert_eq!(reader.page_count(), 2);
    }

    #[test]
    fn inherits_media_box_from_page_tree() {
        let reader = PdfReader::from_bytes(&blank_pdf(&[(226, 600)])).unwrap();
        let size = reader.page_size(0).unwrap();
        assert_eq!(size.width_pt, 226.0);
        assert_eq!(size.height_pt, 600.0);
    }

    #[test]
    fn page_level_media_box_wins() {
        let reader = PdfReader::from_bytes(&blank_pdf(&[(200, 400), (300, 150)])).unwrap();
        let size = reader.page_size(1).unwrap();
        assert_eq!((size.width_pt, size.height_pt), (300.0, 150.0));
    }

    #[test]
    fn page_index_out_of_range_is_render_error() {
        let reader = PdfReader::from_bytes(&blank_pdf(&[(200, 400)])).unwrap();
        assert!(matches!(reader.page_size(1), Err(PrintError::Render(_))));
    }

    #[test]
    fn zero_pages_is_empty_document() {
        let reader = PdfReader::from_bytes(&blank_pdf(&[])).unwrap();
        assert_eq!(reader.page_count(), 0);
        assert!(matches!(reader.page_size(0), Err(PrintError::EmptyDocument)));
    }

    #[test]
    fn garbage_is_render_error() {
        assert!(matches!(
            PdfReader::from_bytes(b"%PDF-1.4 truncated"),
            Err(PrintError::Render(_))
        ));
    }
}
