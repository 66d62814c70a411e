//! PDF Annotation Core Library
//!
//! Stroke model, overlay painting, page rendering and save/export for
//! annotating a single PDF page.

pub mod annotation;
pub mod config;
pub mod editor;
pub mod error;
pub mod export;
pub mod file_list;
pub mod overlay;
pub mod raster;
pub mod session;
pub mod strokes;

pub use annotation::{
    distance_to_segment, segment_distance, Color, Point, Stroke, StrokeError, StrokeKind,
};
pub use config::{ConfigError, EditorConfig, EraseStrategy};
pub use editor::{AnnotationEditor, CloseEvent, EditorState, SaveReport, StoreOutcome};
pub use error::{EditorError, EditorResult, SaveError};
pub use export::{export_annotated_page, export_commands, ExportedPage};
pub use file_list::{FileId, FileList, FileLocation, FileRef, FileStore};
pub use overlay::OverlaySurface;
pub use raster::{FrameTicket, PageRaster, RasterError, RasterFrame};
pub use session::{EditMode, EditSession};
pub use strokes::{StrokeSequence, StrokeSnapshot};
