use crate::annotation::StrokeError;
use crate::config::ConfigError;
use crate::raster::RasterError;
use pdf_engine::PdfEngineError;

/// Errors surfaced by [`crate::AnnotationEditor`].
#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The document is loading, failed to load, or the editor was closed.
    #[error("document is not ready ({0})")]
    NotReady(String),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("no swatch at index {index} (palette has {palette_len})")]
    UnknownSwatch { index: usize, palette_len: usize },
    #[error("invalid colour {0:?}")]
    InvalidColor(String),
    #[error(transparent)]
    InvalidStroke(#[from] StrokeError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("render failed: {0}")]
    Render(#[from] RasterError),
    #[error("save failed: {0}")]
    Save(#[from] SaveError),
}

/// Why a save produced no file.
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("could not read source document: {0}")]
    Fetch(#[source] std::io::Error),
    #[error("could not write annotated page: {0}")]
    Export(#[source] PdfEngineError),
}

pub type EditorResult<T> = Result<T, EditorError>;
