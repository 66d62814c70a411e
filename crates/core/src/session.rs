//! Per-document editing state
//!
//! Tracks the current page, zoom, tool mode, brush and the pointer gesture
//! in progress. All bounds come from [`EditorConfig`].

use crate::annotation::{Color, Point};
use crate::config::EditorConfig;

/// Active tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditMode {
    Draw,
    Erase,
    #[default]
    View,
}

impl EditMode {
    /// Whether pointer gestures in this mode change the stroke sequence.
    pub fn edits(self) -> bool {
        matches!(self, EditMode::Draw | EditMode::Erase)
    }
}

/// Editing state for one open document.
#[derive(Debug, Clone)]
pub struct EditSession {
    config: EditorConfig,
    page_number: u32,
    page_count: u32,
    zoom: f32,
    mode: EditMode,
    color: Color,
    width: f32,
    anchor: Point,
    active: bool,
}

impl EditSession {
    /// Session with no document attached; see [`EditSession::attach_document`].
    pub fn new(config: EditorConfig) -> Self {
        let zoom = quantize_zoom(config.initial_zoom.clamp(config.zoom_min, config.zoom_max));
        let mut session = Self {
            page_number: 1,
            page_count: 0,
            zoom,
            mode: EditMode::default(),
            color: config.default_color,
            width: config.default_width,
            anchor: Point::default(),
            active: false,
            config,
        };
        session.width = session.snap_width(session.width);
        session
    }

    /// Point the session at a freshly loaded document. Zoom returns to its
    /// initial value; the brush and mode are kept. A requested page outside
    /// the document falls back to page 1.
    pub fn attach_document(&mut self, page_count: u32, page_number: u32) {
        self.page_count = page_count;
        self.page_number = 1;
        self.zoom = quantize_zoom(
            self.config.initial_zoom.clamp(self.config.zoom_min, self.config.zoom_max),
        );
        self.active = false;
        if !self.set_page(page_number) {
            log::warn!(
                "requested page {page_number} outside 1..={page_count}, starting on page 1"
            );
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Move to `page_number` if it lies in `1..=page_count`. Returns whether
    /// the page was accepted.
    pub fn set_page(&mut self, page_number: u32) -> bool {
        if page_number == 0 || page_number > self.page_count {
            return false;
        }
        self.page_number = page_number;
        true
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    /// Step the zoom up, capped at the configured maximum. Returns whether
    /// the zoom changed.
    pub fn zoom_in(&mut self) -> bool {
        self.set_zoom(self.zoom + self.config.zoom_step)
    }

    /// Step the zoom down, floored at the configured minimum. Returns whether
    /// the zoom changed.
    pub fn zoom_out(&mut self) -> bool {
        self.set_zoom(self.zoom - self.config.zoom_step)
    }

    pub fn set_zoom(&mut self, zoom: f32) -> bool {
        if !zoom.is_finite() {
            return false;
        }
        let next = quantize_zoom(zoom.clamp(self.config.zoom_min, self.config.zoom_max));
        let changed = next != self.zoom;
        self.zoom = next;
        changed
    }

    pub fn mode(&self) -> EditMode {
        self.mode
    }

    /// Switching tools ends any gesture in progress.
    pub fn set_mode(&mut self, mode: EditMode) {
        self.mode = mode;
        self.active = false;
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
    }

    pub fn width(&self) -> f32 {
        self.width
    }

    /// Set the brush width, clamped to the configured range and snapped to
    /// the nearest step. Returns the width actually applied.
    pub fn set_width(&mut self, width: f32) -> f32 {
        if width.is_finite() {
            self.width = self.snap_width(width);
        }
        self.width
    }

    fn snap_width(&self, width: f32) -> f32 {
        let EditorConfig { width_min, width_max, width_step, .. } = self.config;
        let steps = ((width.clamp(width_min, width_max) - width_min) / width_step).round();
        (width_min + steps * width_step).min(width_max)
    }

    /// Radius around the pointer inside which strokes are erased.
    pub fn erase_radius(&self) -> f32 {
        self.width * self.config.erase_radius_factor
    }

    pub fn anchor(&self) -> Point {
        self.anchor
    }

    pub fn set_anchor(&mut self, point: Point) {
        self.anchor = point;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Record the gesture origin; the gesture only becomes active in a mode
    /// that edits.
    pub fn begin_gesture(&mut self, point: Point) {
        self.anchor = point;
        self.active = self.mode.edits();
    }

    pub fn end_gesture(&mut self) {
        self.active = false;
    }
}

/// Round to two decimals so repeated 0.1 steps land on exact values.
fn quantize_zoom(zoom: f32) -> f32 {
    (zoom * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(page_count: u32) -> EditSession {
        let mut session = EditSession::new(EditorConfig::default());
        session.attach_document(page_count, 1);
        session
    }

    #[test]
    fn test_defaults() {
        let session = session(3);
        assert_eq!(session.page_number(), 1);
        assert_eq!(session.zoom(), 1.0);
        assert_eq!(session.mode(), EditMode::View);
        assert_eq!(session.color(), Color::WHITE);
        assert_eq!(session.width(), 4.0);
        assert!(!session.is_active());
    }

    #[test]
    fn test_three_zoom_steps_land_exactly() {
        let mut session = session(1);
        for _ in 0..3 {
            assert!(session.zoom_in());
        }
        assert_eq!(session.zoom(), 1.3);
        session.zoom_out();
        assert_eq!(session.zoom(), 1.2);
    }

    #[test]
    fn test_zoom_is_bounded() {
        let mut session = session(1);
        for _ in 0..40 {
            session.zoom_in();
        }
        assert_eq!(session.zoom(), 3.0);
        assert!(!session.zoom_in());

        for _ in 0..40 {
            session.zoom_out();
        }
        assert_eq!(session.zoom(), 0.5);
        assert!(!session.zoom_out());
        assert!(!session.set_zoom(f32::NAN));
    }

    #[test]
    fn test_page_bounds() {
        let mut session = session(3);
        assert!(!session.set_page(0));
        assert!(!session.set_page(4));
        assert_eq!(session.page_number(), 1);
        assert!(session.set_page(3));
        assert_eq!(session.page_number(), 3);
    }

    #[test]
    fn test_out_of_range_initial_page_falls_back_to_first() {
        let mut session = EditSession::new(EditorConfig::default());
        session.attach_document(2, 9);
        assert_eq!(session.page_number(), 1);
        session.attach_document(5, 4);
        assert_eq!(session.page_number(), 4);
    }

    #[test]
    fn test_width_clamps_and_snaps() {
        let mut session = session(1);
        assert_eq!(session.set_width(2.0), 4.0);
        assert_eq!(session.set_width(31.0), 20.0);
        assert_eq!(session.set_width(9.2), 10.0);
        assert_eq!(session.set_width(f32::NAN), 10.0);
        assert_eq!(session.erase_radius(), 20.0);
    }

    #[test]
    fn test_gesture_only_activates_in_editing_modes() {
        let mut session = session(1);
        session.begin_gesture(Point::new(3.0, 4.0));
        assert!(!session.is_active());
        assert_eq!(session.anchor(), Point::new(3.0, 4.0));

        session.set_mode(EditMode::Draw);
        session.begin_gesture(Point::new(1.0, 1.0));
        assert!(session.is_active());
        session.set_mode(EditMode::Erase);
        assert!(!session.is_active());
    }
}
