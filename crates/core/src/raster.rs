//! Page raster controller
//!
//! The PDF engine lives on a dedicated render worker. Loads and renders are
//! sequenced: at most one runs at a time, they finish in submission order,
//! and nothing is cancelled. A burst of zoom changes therefore renders every
//! intermediate zoom before the last one.

use pdf_editor_scheduler::{RenderSequencer, RenderTicket, SequencerError, SequencerStats};
use pdf_engine::{
    DocumentHandle, OpenSource, PageSize, PdfEngine, PdfEngineError, RenderRequest, RgbaImage,
};

/// One rendered page bitmap.
#[derive(Debug, Clone)]
pub struct RasterFrame {
    /// 1-based page number
    pub page_number: u32,
    pub zoom: f32,
    pub image: RgbaImage,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("no document is loaded")]
    NotLoaded,
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error(transparent)]
    Engine(#[from] PdfEngineError),
    #[error(transparent)]
    Worker(#[from] SequencerError),
}

enum RasterJob {
    Load(OpenSource),
    Render { page_number: u32, zoom: f32 },
}

enum RasterReply {
    Loaded(Result<Vec<PageSize>, PdfEngineError>),
    Frame(Result<RasterFrame, PdfEngineError>),
}

/// Engine state owned by the render worker.
struct RasterWorker {
    engine: Box<dyn PdfEngine>,
    handle: Option<DocumentHandle>,
}

impl RasterWorker {
    fn execute(&mut self, job: RasterJob) -> RasterReply {
        match job {
            RasterJob::Load(source) => RasterReply::Loaded(self.load(source)),
            RasterJob::Render { page_number, zoom } => {
                RasterReply::Frame(self.render(page_number, zoom))
            }
        }
    }

    fn load(&mut self, source: OpenSource) -> Result<Vec<PageSize>, PdfEngineError> {
        if let Some(previous) = self.handle.take() {
            if let Err(err) = self.engine.close(previous) {
                log::warn!("failed to close previous document: {err}");
            }
        }

        let handle = self.engine.open(source)?;
        let page_count = self.engine.page_count(handle)?;
        let sizes = (0..page_count)
            .map(|index| self.engine.page_size(handle, index))
            .collect::<Result<Vec<_>, _>>()?;
        self.handle = Some(handle);
        Ok(sizes)
    }

    fn render(&mut self, page_number: u32, zoom: f32) -> Result<RasterFrame, PdfEngineError> {
        let handle = self.handle.ok_or(PdfEngineError::InvalidHandle(0))?;
        let image = self.engine.render_page(
            handle,
            RenderRequest { page_index: page_number.saturating_sub(1), scale: zoom },
        )?;
        let (width, height) = image.dimensions();
        log::debug!("rendered page {page_number} at zoom {zoom}: {width}x{height}");
        Ok(RasterFrame { page_number, zoom, image, width, height })
    }
}

impl Drop for RasterWorker {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = self.engine.close(handle);
        }
    }
}

/// Pending render; block on [`FrameTicket::wait`] for the frame.
pub struct FrameTicket {
    inner: RenderTicket<RasterReply>,
}

impl FrameTicket {
    pub fn wait(self) -> Result<RasterFrame, RasterError> {
        match self.inner.wait()? {
            RasterReply::Frame(frame) => Ok(frame?),
            RasterReply::Loaded(_) => Err(SequencerError::WorkerStopped.into()),
        }
    }
}

/// Renders pages of one document through a sequenced worker.
pub struct PageRaster {
    sequencer: RenderSequencer<RasterJob, RasterReply>,
    page_sizes: Option<Vec<PageSize>>,
}

impl PageRaster {
    pub fn new(engine: Box<dyn PdfEngine>) -> Result<Self, RasterError> {
        let mut worker = RasterWorker { engine, handle: None };
        let sequencer =
            RenderSequencer::spawn("page-raster", move |job: RasterJob| worker.execute(job))?;
        Ok(Self { sequencer, page_sizes: None })
    }

    /// Open a document, replacing any previously loaded one. Blocks until
    /// the worker has parsed it and returns the page count.
    pub fn load(&mut self, source: OpenSource) -> Result<u32, RasterError> {
        self.page_sizes = None;
        let reply = self.sequencer.submit(RasterJob::Load(source))?.wait()?;
        match reply {
            RasterReply::Loaded(sizes) => {
                let sizes = sizes?;
                let page_count = sizes.len() as u32;
                self.page_sizes = Some(sizes);
                Ok(page_count)
            }
            RasterReply::Frame(_) => Err(SequencerError::WorkerStopped.into()),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.page_sizes.is_some()
    }

    pub fn page_count(&self) -> Option<u32> {
        self.page_sizes.as_ref().map(|sizes| sizes.len() as u32)
    }

    /// Size in points of 1-based page `page_number`.
    pub fn page_size(&self, page_number: u32) -> Result<PageSize, RasterError> {
        let sizes = self.page_sizes.as_ref().ok_or(RasterError::NotLoaded)?;
        page_number
            .checked_sub(1)
            .and_then(|index| sizes.get(index as usize))
            .copied()
            .ok_or(RasterError::PageOutOfRange {
                page: page_number,
                page_count: sizes.len() as u32,
            })
    }

    /// Queue a render of `page_number` at `zoom` behind any pending ones.
    pub fn request(&self, page_number: u32, zoom: f32) -> Result<FrameTicket, RasterError> {
        self.page_size(page_number)?;
        let inner = self.sequencer.submit(RasterJob::Render { page_number, zoom })?;
        Ok(FrameTicket { inner })
    }

    /// Render and wait for the frame.
    pub fn render(&self, page_number: u32, zoom: f32) -> Result<RasterFrame, RasterError> {
        self.request(page_number, zoom)?.wait()
    }

    pub fn stats(&self) -> SequencerStats {
        self.sequencer.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdf_engine::{fixtures, LopdfEngine};

    fn loaded_raster() -> PageRaster {
        let mut raster = PageRaster::new(Box::new(LopdfEngine::new())).unwrap();
        let bytes = fixtures::pdf_with_pages(&[
            PageSize { width_pt: 200.0, height_pt: 300.0 },
            PageSize { width_pt: 400.0, height_pt: 100.0 },
        ]);
        assert_eq!(raster.load(OpenSource::Bytes(bytes)).unwrap(), 2);
        raster
    }

    #[test]
    fn test_render_scales_with_zoom() {
        let raster = loaded_raster();
        let frame = raster.render(1, 1.5).unwrap();
        assert_eq!(frame.page_number, 1);
        assert_eq!((frame.width, frame.height), (300, 450));
        assert_eq!(frame.image.dimensions(), (300, 450));

        let frame = raster.render(2, 1.0).unwrap();
        assert_eq!((frame.width, frame.height), (400, 100));
    }

    #[test]
    fn test_frames_complete_in_request_order() {
        let raster = loaded_raster();
        let zooms = [1.0, 1.1, 1.2, 1.3];
        let tickets: Vec<_> = zooms.iter().map(|zoom| raster.request(1, *zoom).unwrap()).collect();

        let rendered: Vec<f32> = tickets.into_iter().map(|t| t.wait().unwrap().zoom).collect();
        assert_eq!(rendered, zooms);
        assert_eq!(raster.stats().pending(), 0);
    }

    #[test]
    fn test_rejects_pages_outside_document() {
        let raster = loaded_raster();
        assert!(matches!(
            raster.request(0, 1.0),
            Err(RasterError::PageOutOfRange { page: 0, page_count: 2 })
        ));
        assert!(matches!(
            raster.request(3, 1.0),
            Err(RasterError::PageOutOfRange { page: 3, page_count: 2 })
        ));
    }

    #[test]
    fn test_render_before_load() {
        let raster = PageRaster::new(Box::new(LopdfEngine::new())).unwrap();
        assert!(!raster.is_loaded());
        assert!(matches!(raster.request(1, 1.0), Err(RasterError::NotLoaded)));
    }

    #[test]
    fn test_failed_load_leaves_raster_unloaded() {
        let mut raster = loaded_raster();
        let err = raster.load(OpenSource::Bytes(b"not a pdf".to_vec())).unwrap_err();
        assert!(matches!(err, RasterError::Engine(PdfEngineError::Parse(_))));
        assert_eq!(raster.page_count(), None);
    }
}
