//! Ordered stroke storage
//!
//! Insertion order is z-order. The sequence is only ever mutated by appending
//! a stroke or by filtering strokes out during an erase; readers such as the
//! overlay and the exporter work from an immutable [`StrokeSnapshot`].

use crate::annotation::{segment_distance, Point, Stroke};
use std::sync::Arc;

/// The live, mutable list of strokes for the current page.
#[derive(Debug, Default)]
pub struct StrokeSequence {
    strokes: Vec<Stroke>,
}

impl StrokeSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stroke: Stroke) {
        self.strokes.push(stroke);
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Stroke> {
        self.strokes.iter()
    }

    /// Remove every ink stroke whose segment lies within `radius` of
    /// `point`. Returns the number of strokes removed.
    pub fn erase_near(&mut self, point: &Point, radius: f32) -> usize {
        self.retain_outside(|stroke| stroke.distance_to(point) <= radius)
    }

    /// Remove every ink stroke within `radius` of the swept segment
    /// `from`–`to`. Returns the number of strokes removed.
    pub fn erase_along(&mut self, from: &Point, to: &Point, radius: f32) -> usize {
        self.retain_outside(|stroke| {
            segment_distance(&stroke.from(), &stroke.to(), from, to) <= radius
        })
    }

    fn retain_outside<F>(&mut self, hit: F) -> usize
    where
        F: Fn(&Stroke) -> bool,
    {
        let before = self.strokes.len();
        self.strokes.retain(|stroke| !(stroke.is_ink() && hit(stroke)));
        before - self.strokes.len()
    }

    pub fn clear(&mut self) {
        self.strokes.clear();
    }

    /// Immutable copy of the current strokes, in order.
    pub fn snapshot(&self) -> StrokeSnapshot {
        StrokeSnapshot {
            strokes: Arc::from(self.strokes.as_slice()),
        }
    }
}

/// Shared read-only view of the strokes at one point in time.
#[derive(Debug, Clone, Default)]
pub struct StrokeSnapshot {
    strokes: Arc<[Stroke]>,
}

impl StrokeSnapshot {
    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Stroke> {
        self.strokes.iter()
    }

    /// Strokes that carry visible ink, in z-order.
    pub fn ink(&self) -> impl Iterator<Item = &Stroke> {
        self.strokes.iter().filter(|stroke| stroke.is_ink())
    }

    pub fn as_slice(&self) -> &[Stroke] {
        &self.strokes
    }
}

impl<'a> IntoIterator for &'a StrokeSnapshot {
    type Item = &'a Stroke;
    type IntoIter = std::slice::Iter<'a, Stroke>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
