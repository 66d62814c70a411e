//! Single-page annotation editor
//!
//! Ties the pieces together: pointer events become strokes or erasures, the
//! overlay is repainted after every move, page and zoom changes re-render
//! the raster, and save flattens the strokes into a new one-page PDF that
//! replaces the original in the file list.

use crate::annotation::{Color, Point, Stroke};
use crate::config::{EditorConfig, EraseStrategy};
use crate::error::{EditorError, EditorResult, SaveError};
use crate::export::export_annotated_page;
use crate::file_list::{FileId, FileRef, FileStore};
use crate::overlay::OverlaySurface;
use crate::raster::{PageRaster, RasterFrame};
use crate::session::{EditMode, EditSession};
use crate::strokes::{StrokeSequence, StrokeSnapshot};
use pdf_engine::{OpenSource, PdfEngine, RgbaImage};
use std::fmt;

/// Document lifecycle as seen by the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorState {
    Loading,
    Ready,
    /// Load failed; [`AnnotationEditor::retry_load`] tries again.
    LoadFailed(String),
    Closed,
}

impl fmt::Display for EditorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditorState::Loading => f.write_str("loading"),
            EditorState::Ready => f.write_str("ready"),
            EditorState::LoadFailed(reason) => write!(f, "load failed: {reason}"),
            EditorState::Closed => f.write_str("closed"),
        }
    }
}

/// Where the saved file ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// The original entry was replaced at `index`.
    Replaced { index: usize },
    /// The store did not contain the original file.
    NotInStore,
    /// No store was available.
    StoreUnavailable,
}

/// Result of a successful save.
#[derive(Debug, Clone)]
pub struct SaveReport {
    pub file: FileRef,
    pub outcome: StoreOutcome,
    /// Number of lines drawn onto the page
    pub line_count: usize,
}

/// Passed to the close callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseEvent {
    pub file: FileId,
    /// Strokes dropped by closing
    pub discarded_strokes: usize,
}

type CloseCallback = Box<dyn FnMut(CloseEvent)>;

pub struct AnnotationEditor {
    /// Document the page is copied from on save
    source: FileRef,
    /// Entry the next save replaces in the store
    current: FileRef,
    requested_page: u32,
    state: EditorState,
    session: EditSession,
    raster: PageRaster,
    strokes: StrokeSequence,
    overlay: OverlaySurface,
    frame: Option<RasterFrame>,
    overlay_origin: Point,
    on_close: Option<CloseCallback>,
}

impl AnnotationEditor {
    /// Open `file` on page `page_number`. A document that fails to load
    /// leaves the editor in [`EditorState::LoadFailed`] rather than
    /// returning an error. An inconsistent `config` is rejected up front.
    pub fn open(
        file: FileRef,
        page_number: u32,
        engine: Box<dyn PdfEngine>,
        config: EditorConfig,
    ) -> EditorResult<Self> {
        config.validate()?;
        let raster = PageRaster::new(engine)?;
        let mut editor = Self {
            current: file.clone(),
            source: file,
            requested_page: page_number,
            state: EditorState::Loading,
            session: EditSession::new(config),
            raster,
            strokes: StrokeSequence::new(),
            overlay: OverlaySurface::new(0, 0),
            frame: None,
            overlay_origin: Point::default(),
            on_close: None,
        };

        // Load failures are recorded in the state; only a failed first
        // render of a loaded document is worth reporting here.
        if let Err(err) = editor.load() {
            if editor.is_ready() {
                log::error!("failed to render {}: {err}", editor.source.name);
            }
        }
        Ok(editor)
    }

    /// Register the callback invoked once when the editor closes.
    pub fn on_close<F>(&mut self, callback: F)
    where
        F: FnMut(CloseEvent) + 'static,
    {
        self.on_close = Some(Box::new(callback));
    }

    pub fn state(&self) -> &EditorState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == EditorState::Ready
    }

    pub fn file(&self) -> &FileRef {
        &self.current
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn page_number(&self) -> u32 {
        self.session.page_number()
    }

    pub fn page_count(&self) -> u32 {
        self.session.page_count()
    }

    pub fn zoom(&self) -> f32 {
        self.session.zoom()
    }

    pub fn strokes(&self) -> StrokeSnapshot {
        self.strokes.snapshot()
    }

    pub fn overlay(&self) -> &OverlaySurface {
        &self.overlay
    }

    /// The most recent page raster.
    pub fn frame(&self) -> Option<&RasterFrame> {
        self.frame.as_ref()
    }

    /// Page raster with the annotations blended on top.
    pub fn composite(&self) -> Option<RgbaImage> {
        self.frame.as_ref().map(|frame| self.overlay.composite_onto(&frame.image))
    }

    /// Offset of the overlay's top-left corner in client coordinates.
    pub fn set_overlay_origin(&mut self, origin: Point) {
        self.overlay_origin = origin;
    }

    /// Try loading the document again after a failure.
    pub fn retry_load(&mut self) -> EditorResult<()> {
        if self.state == EditorState::Closed {
            return Err(self.not_ready());
        }
        self.load()
    }

    /// Switch to a different source document. Strokes for the previous one
    /// are discarded.
    pub fn open_file(&mut self, file: FileRef, page_number: u32) -> EditorResult<()> {
        if self.state == EditorState::Closed {
            return Err(self.not_ready());
        }
        self.current = file.clone();
        self.source = file;
        self.requested_page = page_number;
        self.load()
    }

    fn load(&mut self) -> EditorResult<()> {
        self.state = EditorState::Loading;
        self.strokes.clear();
        self.frame = None;

        let loaded = self
            .source
            .read_bytes()
            .map_err(|err| err.to_string())
            .and_then(|bytes| {
                self.raster.load(OpenSource::Bytes(bytes)).map_err(|err| err.to_string())
            });

        match loaded {
            Ok(page_count) => {
                log::info!("loaded {} ({page_count} pages)", self.source.name);
                self.session.attach_document(page_count, self.requested_page);
                self.state = EditorState::Ready;
                self.render()
            }
            Err(reason) => {
                log::warn!("could not load {}: {reason}", self.source.name);
                self.state = EditorState::LoadFailed(reason);
                Err(self.not_ready())
            }
        }
    }

    fn not_ready(&self) -> EditorError {
        EditorError::NotReady(self.state.to_string())
    }

    fn ensure_ready(&self) -> EditorResult<()> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(self.not_ready())
        }
    }

    /// Render the current page at the current zoom and fit the overlay to
    /// the new frame.
    pub fn render(&mut self) -> EditorResult<()> {
        self.ensure_ready()?;
        let frame = self.raster.render(self.session.page_number(), self.session.zoom())?;

        self.overlay.resize(frame.width, frame.height);
        self.overlay.repaint(&self.strokes.snapshot());
        self.frame = Some(frame);
        Ok(())
    }

    /// Go to `page_number`. Pages outside the document are rejected and
    /// leave the editor unchanged. Strokes are cleared on a page change.
    pub fn set_page(&mut self, page_number: u32) -> EditorResult<()> {
        self.ensure_ready()?;
        if page_number == self.session.page_number() {
            return Ok(());
        }
        if !self.session.set_page(page_number) {
            log::warn!("rejected page {page_number}");
            return Err(EditorError::PageOutOfRange {
                page: page_number,
                page_count: self.session.page_count(),
            });
        }
        self.discard_strokes("page change");
        self.render()
    }

    pub fn zoom_in(&mut self) -> EditorResult<f32> {
        self.ensure_ready()?;
        let changed = self.session.zoom_in();
        self.after_zoom(changed)
    }

    pub fn zoom_out(&mut self) -> EditorResult<f32> {
        self.ensure_ready()?;
        let changed = self.session.zoom_out();
        self.after_zoom(changed)
    }

    /// Jump straight to `zoom`, clamped to the configured range.
    pub fn set_zoom(&mut self, zoom: f32) -> EditorResult<f32> {
        self.ensure_ready()?;
        let changed = self.session.set_zoom(zoom);
        self.after_zoom(changed)
    }

    fn after_zoom(&mut self, changed: bool) -> EditorResult<f32> {
        if changed {
            self.discard_strokes("zoom change");
            self.render()?;
        }
        Ok(self.session.zoom())
    }

    fn discard_strokes(&mut self, reason: &str) {
        if !self.strokes.is_empty() {
            log::info!("discarding {} strokes on {reason}", self.strokes.len());
        }
        self.strokes.clear();
        self.session.end_gesture();
    }

    pub fn set_mode(&mut self, mode: EditMode) {
        self.session.set_mode(mode);
    }

    pub fn mode(&self) -> EditMode {
        self.session.mode()
    }

    /// Pick a color from the configured palette.
    pub fn select_swatch(&mut self, index: usize) -> EditorResult<Color> {
        let palette = &self.session.config().palette;
        let color = *palette.get(index).ok_or(EditorError::UnknownSwatch {
            index,
            palette_len: palette.len(),
        })?;
        self.session.set_color(color);
        Ok(color)
    }

    /// Set a free-form color from `#RRGGBB` text.
    pub fn set_color(&mut self, hex: &str) -> EditorResult<Color> {
        let color =
            Color::from_hex(hex).map_err(|_| EditorError::InvalidColor(hex.to_owned()))?;
        self.session.set_color(color);
        Ok(color)
    }

    pub fn color(&self) -> Color {
        self.session.color()
    }

    /// Returns the width actually applied after clamping to the range.
    pub fn set_stroke_width(&mut self, width: f32) -> f32 {
        self.session.set_width(width)
    }

    pub fn stroke_width(&self) -> f32 {
        self.session.width()
    }

    fn to_overlay(&self, client: Point) -> Point {
        Point::new(client.x - self.overlay_origin.x, client.y - self.overlay_origin.y)
    }

    pub fn pointer_down(&mut self, client: Point) -> EditorResult<()> {
        self.ensure_ready()?;
        let position = self.to_overlay(client);
        self.session.begin_gesture(position);
        Ok(())
    }

    /// Extend the active gesture to `client`, then repaint the overlay.
    pub fn pointer_move(&mut self, client: Point) -> EditorResult<()> {
        self.ensure_ready()?;
        let position = self.to_overlay(client);

        if self.session.is_active() {
            let anchor = self.session.anchor();
            match self.session.mode() {
                EditMode::Draw => {
                    let stroke = Stroke::ink(
                        self.session.color(),
                        self.session.width(),
                        anchor,
                        position,
                    )?;
                    self.strokes.push(stroke);
                    self.session.set_anchor(position);
                }
                EditMode::Erase => {
                    let radius = self.session.erase_radius();
                    let removed = match self.session.config().erase_strategy {
                        EraseStrategy::Point => self.strokes.erase_near(&position, radius),
                        EraseStrategy::SweptPath => {
                            self.strokes.erase_along(&anchor, &position, radius)
                        }
                    };
                    if removed > 0 {
                        log::debug!("erased {removed} strokes");
                    }
                    self.session.set_anchor(position);
                }
                EditMode::View => {}
            }
        }

        self.overlay.repaint(&self.strokes.snapshot());
        Ok(())
    }

    pub fn pointer_up(&mut self) -> EditorResult<()> {
        self.ensure_ready()?;
        self.session.end_gesture();
        Ok(())
    }

    /// Flatten the strokes onto a copy of the current page and hand the new
    /// file to `store`. Strokes are kept after saving.
    pub fn save(&mut self, store: Option<&mut dyn FileStore>) -> EditorResult<SaveReport> {
        self.ensure_ready()?;
        let snapshot = self.strokes.snapshot();
        let page_number = self.session.page_number();

        let source = self.source.read_bytes().map_err(SaveError::Fetch)?;
        let exported =
            export_annotated_page(&source, page_number, &snapshot, self.session.zoom())
                .map_err(SaveError::Export)?;
        let file = self.current.with_contents(exported.bytes);

        let outcome = match store {
            None => {
                log::warn!("no file store available, saved file was not stored");
                StoreOutcome::StoreUnavailable
            }
            Some(store) => match store.replace(&self.current, file.clone()) {
                Some(index) => StoreOutcome::Replaced { index },
                None => {
                    log::warn!("{} is no longer in the file store", self.current.name);
                    StoreOutcome::NotInStore
                }
            },
        };
        if matches!(outcome, StoreOutcome::Replaced { .. }) {
            self.current = file.clone();
        }

        log::info!(
            "saved page {page_number} of {} with {} strokes ({} bytes)",
            self.source.name,
            exported.line_count,
            file.size
        );
        Ok(SaveReport { file, outcome, line_count: exported.line_count })
    }

    /// Close the editor, discarding strokes and notifying the close
    /// callback. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.state == EditorState::Closed {
            return;
        }

        let discarded_strokes = self.strokes.len();
        self.strokes.clear();
        self.overlay.clear();
        self.frame = None;
        self.session.end_gesture();
        self.state = EditorState::Closed;

        if let Some(mut callback) = self.on_close.take() {
            callback(CloseEvent { file: self.current.id, discarded_strokes });
        }
    }
}
