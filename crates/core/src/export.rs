//! Flattening strokes into PDF page content
//!
//! Strokes live in display coordinates of the raster they were drawn on. On
//! export each ink stroke becomes one vector line in PDF page space: the
//! zoom is divided out and the Y axis flipped against the page height.

use crate::annotation::{Point, Stroke};
use crate::strokes::StrokeSnapshot;
use pdf_engine::{LineCap, LineCommand, PdfEngineError, SinglePageDocument};

/// Result of flattening a snapshot onto a page.
#[derive(Debug, Clone)]
pub struct ExportedPage {
    pub bytes: Vec<u8>,
    /// Number of line commands drawn
    pub line_count: usize,
}

fn to_page_space(point: Point, page_height: f32, zoom: f32) -> (f32, f32) {
    (point.x / zoom, page_height - point.y / zoom)
}

/// Line command for one stroke.
pub fn stroke_command(stroke: &Stroke, page_height: f32, zoom: f32) -> LineCommand {
    LineCommand {
        start: to_page_space(stroke.from(), page_height, zoom),
        end: to_page_space(stroke.to(), page_height, zoom),
        color: stroke.color().to_unit(),
        thickness: stroke.width() / zoom,
        opacity: 1.0,
        cap: LineCap::Round,
    }
}

/// Line commands for every ink stroke in `snapshot`, in z-order.
///
/// A zoom that is not positive and finite is treated as 1.
pub fn export_commands(snapshot: &StrokeSnapshot, page_height: f32, zoom: f32) -> Vec<LineCommand> {
    let zoom = if zoom.is_finite() && zoom > 0.0 { zoom } else { 1.0 };
    snapshot
        .ink()
        .map(|stroke| stroke_command(stroke, page_height, zoom))
        .collect()
}

/// Copy page `page_number` (1-based) of `source` into a fresh one-page
/// document, draw the snapshot's strokes on it, and serialize.
pub fn export_annotated_page(
    source: &[u8],
    page_number: u32,
    snapshot: &StrokeSnapshot,
    zoom: f32,
) -> Result<ExportedPage, PdfEngineError> {
    let mut page = SinglePageDocument::extract(source, page_number)?;
    let commands = export_commands(snapshot, page.page_size().height_pt, zoom);

    for command in &commands {
        page.draw_line(command)?;
    }

    let line_count = page.line_count();
    let bytes = page.to_bytes()?;
    log::debug!(
        "flattened {line_count} strokes onto page {page_number} ({} bytes)",
        bytes.len()
    );
    Ok(ExportedPage { bytes, line_count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::{Color, StrokeKind};
    use crate::strokes::StrokeSequence;
    use pdf_engine::fixtures;
    use pdf_engine::PageSize;

    fn ink(color: Color, width: f32, from: (f32, f32), to: (f32, f32)) -> Stroke {
        Stroke::ink(color, width, Point::new(from.0, from.1), Point::new(to.0, to.1)).unwrap()
    }

    #[test]
    fn test_single_red_segment() {
        let mut sequence = StrokeSequence::new();
        sequence.push(ink(Color::from_hex("#FF0000").unwrap(), 4.0, (10.0, 10.0), (50.0, 10.0)));

        let commands = export_commands(&sequence.snapshot(), 800.0, 1.0);
        assert_eq!(
            commands,
            vec![LineCommand {
                start: (10.0, 790.0),
                end: (50.0, 790.0),
                color: [1.0, 0.0, 0.0],
                thickness: 4.0,
                opacity: 1.0,
                cap: LineCap::Round,
            }]
        );
    }

    #[test]
    fn test_y_axis_flip_at_unit_zoom() {
        let mut sequence = StrokeSequence::new();
        sequence.push(ink(Color::BLACK, 6.0, (0.0, 0.0), (100.0, 200.0)));
        sequence.push(ink(Color::WHITE, 4.0, (100.0, 200.0), (300.0, 792.0)));
        let snapshot = sequence.snapshot();

        let commands = export_commands(&snapshot, 792.0, 1.0);
        assert_eq!(commands.len(), snapshot.len());
        for (command, stroke) in commands.iter().zip(snapshot.iter()) {
            assert_eq!(command.start, (stroke.from().x, 792.0 - stroke.from().y));
            assert_eq!(command.end, (stroke.to().x, 792.0 - stroke.to().y));
            assert_eq!(command.thickness, stroke.width());
        }
    }

    #[test]
    fn test_zoom_is_divided_out() {
        let mut sequence = StrokeSequence::new();
        sequence.push(ink(Color::BLACK, 8.0, (20.0, 40.0), (60.0, 40.0)));

        let commands = export_commands(&sequence.snapshot(), 100.0, 2.0);
        assert_eq!(commands[0].start, (10.0, 80.0));
        assert_eq!(commands[0].end, (30.0, 80.0));
        assert_eq!(commands[0].thickness, 4.0);

        let fallback = export_commands(&sequence.snapshot(), 100.0, 0.0);
        assert_eq!(fallback[0].start, (20.0, 60.0));
    }

    #[test]
    fn test_erase_strokes_are_skipped() {
        let mut sequence = StrokeSequence::new();
        sequence.push(
            Stroke::new(StrokeKind::Erase, Color::WHITE, 8.0, Point::new(0.0, 0.0), Point::new(1.0, 1.0))
                .unwrap(),
        );
        sequence.push(ink(Color::BLACK, 4.0, (0.0, 0.0), (1.0, 1.0)));

        assert_eq!(export_commands(&sequence.snapshot(), 10.0, 1.0).len(), 1);
    }

    #[test]
    fn test_export_annotated_page() {
        let source = fixtures::pdf_with_pages(&[
            PageSize { width_pt: 600.0, height_pt: 800.0 },
            PageSize { width_pt: 300.0, height_pt: 400.0 },
        ]);
        let mut sequence = StrokeSequence::new();
        sequence.push(ink(Color::RED, 4.0, (10.0, 10.0), (50.0, 10.0)));
        sequence.push(ink(Color::RED, 4.0, (50.0, 10.0), (50.0, 90.0)));

        let exported = export_annotated_page(&source, 2, &sequence.snapshot(), 1.0).unwrap();
        assert_eq!(exported.line_count, 2);

        let doc = lopdf::Document::load_mem(&exported.bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
        let page_id = pages[&1];
        let content = lopdf::content::Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();

        let moves: Vec<_> = content
            .operations
            .iter()
            .filter(|op| op.operator == "m")
            .map(|op| (op.operands[0].as_float().unwrap(), op.operands[1].as_float().unwrap()))
            .collect();
        assert_eq!(moves, vec![(10.0, 390.0), (50.0, 390.0)]);
    }

    #[test]
    fn test_export_rejects_missing_page() {
        let source = fixtures::letter_pdf();
        let snapshot = StrokeSequence::new().snapshot();
        assert!(matches!(
            export_annotated_page(&source, 2, &snapshot, 1.0),
            Err(PdfEngineError::PageOutOfRange { page: 2, page_count: 1 })
        ));
    }
}
