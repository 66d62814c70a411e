//! PDF Editor Scheduler Library
//!
//! Sequenced execution of page render requests.
//!
//! Rendering a page is slow relative to pointer input, and the page or zoom
//! can change again before a render finishes. The [`RenderSequencer`] keeps at
//! most one render in flight and completes requests strictly in the order
//! they were submitted. Nothing is cancelled: a newer request waits for the
//! older one, so a stale frame may be shown briefly before the latest one
//! replaces it.
//!
//! # Example
//!
//! ```
//! use pdf_editor_scheduler::RenderSequencer;
//!
//! let sequencer = RenderSequencer::spawn("pages", |(page, zoom): (u32, f32)| {
//!     format!("page {page} at {zoom}x")
//! })
//! .unwrap();
//!
//! let ticket = sequencer.submit((1, 1.5)).unwrap();
//! assert_eq!(ticket.wait().unwrap(), "page 1 at 1.5x");
//! ```

mod sequencer;

pub use sequencer::{JobId, RenderSequencer, RenderTicket, SequencerError, SequencerStats};
