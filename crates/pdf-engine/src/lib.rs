use image::{ImageBuffer, Rgba};
use lopdf::{Document, Object, ObjectId};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod page_writer;

pub use page_writer::{LineCap, LineCommand, SinglePageDocument};

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Used when a page carries no usable MediaBox (US Letter).
pub const DEFAULT_PAGE_SIZE: PageSize = PageSize { width_pt: 612.0, height_pt: 792.0 };

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// Pixel dimensions of this page rasterized at `scale`.
    pub fn pixel_dimensions(&self, scale: f32) -> (u32, u32) {
        let scale = if scale <= 0.0 { 1.0 } else { scale };
        let width = (self.width_pt * scale).round().max(1.0) as u32;
        let height = (self.height_pt * scale).round().max(1.0) as u32;
        (width, height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    /// Zero-based page index.
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("invalid line command: {0}")]
    InvalidCommand(String),
    #[error("backend error: {0}")]
    Backend(String),
}

/// Page decoding and rasterization service.
///
/// Implementations must be `Send` so the render worker can own them.
pub trait PdfEngine: Send {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    page_sizes: Vec<PageSize>,
}

/// Default backend: parses page geometry with lopdf and rasterizes a blank
/// page of the right dimensions.
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, page_id) in pages {
            sizes.push(media_box_size(&doc, page_id).unwrap_or(DEFAULT_PAGE_SIZE));
        }

        if sizes.is_empty() {
            return Err(PdfEngineError::Backend("document has no pages".to_owned()));
        }

        Ok(sizes)
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let bytes = match source {
            OpenSource::Path(path) => fs::read(path)?,
            OpenSource::Bytes(bytes) => bytes,
        };

        let page_sizes = Self::parse_sizes(&bytes)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        log::debug!("opened document {} with {} page(s)", handle.raw(), page_sizes.len());
        self.docs.insert(handle, DocumentRecord { page_sizes });

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.page_sizes.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        let record = self.record(handle)?;
        record.page_sizes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: record.page_sizes.len() as u32,
        })
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let page_size = self.page_size(handle, request.page_index)?;
        let (width, height) = page_size.pixel_dimensions(request.scale);

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}

/// Look up a page attribute, following the `/Parent` chain for inheritable
/// keys such as `MediaBox` and `Resources`.
pub(crate) fn inherited_attribute<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = Some(page_id);
    // Page trees are shallow; the bound guards against malformed parent cycles.
    for _ in 0..64 {
        let dict = doc.get_dictionary(current?).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

/// Width and height of a page's MediaBox in points.
pub fn media_box_size(doc: &Document, page_id: ObjectId) -> Option<PageSize> {
    let media_box = inherited_attribute(doc, page_id, b"MediaBox")?;
    let array = resolve(doc, media_box)?.as_array().ok()?;
    if array.len() != 4 {
        return None;
    }

    let mut values = [0.0f32; 4];
    for (slot, entry) in values.iter_mut().zip(array) {
        *slot = resolve(doc, entry)?.as_float().ok()?;
    }

    Some(PageSize {
        width_pt: (values[2] - values[0]).abs(),
        height_pt: (values[3] - values[1]).abs(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_pdf_bytes() -> Vec<u8> {
        fixtures::pdf_with_pages(&[
            PageSize { width_pt: 200.0, height_pt: 300.0 },
            PageSize { width_pt: 612.0, height_pt: 792.0 },
        ])
    }

    #[test]
    fn opens_pdf_and_reads_page_count() {
        let mut engine = LopdfEngine::new();
        let handle =
            engine.open(OpenSource::Bytes(sample_pdf_bytes())).expect("open should succeed");

        assert_eq!(engine.page_count(handle).expect("count should succeed"), 2);
    }

    #[test]
    fn reads_media_box_per_page() {
        let mut engine = LopdfEngine::new();
        let handle =
            engine.open(OpenSource::Bytes(sample_pdf_bytes())).expect("open should succeed");

        let first = engine.page_size(handle, 0).expect("page 0 exists");
        assert_eq!(first, PageSize { width_pt: 200.0, height_pt: 300.0 });

        let err = engine.page_size(handle, 2).expect_err("page 2 does not exist");
        assert!(matches!(err, PdfEngineError::PageOutOfRange { page: 2, page_count: 2 }));
    }

    #[test]
    fn render_page_scales_dimensions() {
        let mut engine = LopdfEngine::new();
        let handle =
            engine.open(OpenSource::Bytes(sample_pdf_bytes())).expect("open should succeed");

        let image = engine
            .render_page(handle, RenderRequest { page_index: 0, scale: 1.5 })
            .expect("render should succeed");

        assert_eq!(image.dimensions(), (300, 450));
    }

    #[test]
    fn pixel_dimensions_fall_back_to_unit_scale() {
        let size = PageSize { width_pt: 100.0, height_pt: 50.0 };
        assert_eq!(size.pixel_dimensions(0.0), (100, 50));
        assert_eq!(size.pixel_dimensions(0.5), (50, 25));
    }

    #[test]
    fn invalid_handle_returns_error() {
        let engine = LopdfEngine::new();
        let err =
            engine.page_count(DocumentHandle(999)).expect_err("should fail for unknown handle");

        assert!(matches!(err, PdfEngineError::InvalidHandle(999)));
    }

    #[test]
    fn garbage_bytes_fail_to_parse() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::Bytes(b"definitely not a pdf".to_vec()))
            .expect_err("garbage should not parse");

        assert!(matches!(err, PdfEngineError::Parse(_)));
    }

    #[test]
    fn encrypted_marker_is_rejected() {
        let mut engine = LopdfEngine::new();
        let err = engine
            .open(OpenSource::Bytes(b"%PDF-1.4 /Encrypt".to_vec()))
            .expect_err("encrypted marker should be rejected");

        assert!(matches!(err, PdfEngineError::EncryptedUnsupported));
    }
}
