//! Island discovery: clusters UV patches of one material into bounding rectangles
//! that stay apart by more than a tolerance.

use crate::error::{AtlasError, Result};
use crate::model::Rect;
use glam::DVec2;
use tracing::warn;

/// Bounding rectangle of one or more UV patches in a material's pixel space,
/// carrying the payload of every patch that contributed to it.
///
/// An island starts without bounds (invalid) and becomes valid after its first point.
#[derive(Debug, Clone)]
pub struct Island<P> {
    bounds: Option<(DVec2, DVec2)>,
    payload: Vec<P>,
    extends: usize,
}

impl<P> Default for Island<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> Island<P> {
    pub fn new() -> Self {
        Self {
            bounds: None,
            payload: Vec::new(),
            extends: 0,
        }
    }

    pub fn from_points<I: IntoIterator<Item = DVec2>>(points: I) -> Self {
        let mut island = Self::new();
        for p in points {
            island.extend_point(p);
        }
        island
    }

    pub fn with_payload(mut self, payload: P) -> Self {
        self.payload.push(payload);
        self
    }

    pub fn is_valid(&self) -> bool {
        self.bounds.is_some()
    }

    pub fn min(&self) -> Option<DVec2> {
        self.bounds.map(|(min, _)| min)
    }

    pub fn max(&self) -> Option<DVec2> {
        self.bounds.map(|(_, max)| max)
    }

    pub fn rect(&self) -> Option<Rect> {
        self.bounds.map(|(min, max)| Rect::from_min_max(min, max))
    }

    pub fn area(&self) -> Option<f64> {
        self.rect().map(|r| r.area())
    }

    pub fn payload(&self) -> &[P] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<P> {
        self.payload
    }

    /// Number of points folded into this island so far (diagnostics only).
    pub fn extends(&self) -> usize {
        self.extends
    }

    pub fn extend_point(&mut self, p: DVec2) {
        self.bounds = Some(match self.bounds {
            None => (p, p),
            Some((min, max)) => (min.min(p), max.max(p)),
        });
        self.extends += 1;
    }

    /// Inclusive point test against the bounds grown by `epsilon`.
    pub fn contains_point(&self, p: DVec2, epsilon: f64) -> bool {
        match self.bounds {
            Some((min, max)) => {
                min.x - epsilon <= p.x
                    && p.x <= max.x + epsilon
                    && min.y - epsilon <= p.y
                    && p.y <= max.y + epsilon
            }
            None => false,
        }
    }

    /// True if the two islands come closer than `epsilon` on both axes.
    ///
    /// Equivalent to "a corner of one lies in the other grown by `epsilon`" for all
    /// configurations except two crossing boxes, which this test also catches.
    pub fn intersects(&self, other: &Island<P>, epsilon: f64) -> bool {
        match (self.bounds, other.bounds) {
            (Some((a0, a1)), Some((b0, b1))) => {
                a0.x - epsilon <= b1.x
                    && b0.x - epsilon <= a1.x
                    && a0.y - epsilon <= b1.y
                    && b0.y - epsilon <= a1.y
            }
            _ => false,
        }
    }

    /// Grows to cover `other` and takes over its payload, own payload first.
    pub fn absorb(&mut self, other: Island<P>) {
        if let Some((min, max)) = other.bounds {
            self.extend_point(min);
            self.extend_point(max);
        }
        self.payload.extend(other.payload);
    }
}

/// Greedy transitive-closure clustering of UV patches for one material.
///
/// Invariant: no two islands in the collection intersect within the epsilon used
/// to insert them.
#[derive(Debug, Clone)]
pub struct IslandMerger<P> {
    islands: Vec<Island<P>>,
    merges: usize,
    rejected: usize,
}

impl<P> Default for IslandMerger<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P> IslandMerger<P> {
    pub fn new() -> Self {
        Self {
            islands: Vec::new(),
            merges: 0,
            rejected: 0,
        }
    }

    /// Folds one UV patch into the collection.
    ///
    /// Returns false when the patch was rejected: it has no points or a point is not finite.
    pub fn add_sequence<I>(&mut self, points: I, epsilon: f64, payload: P) -> bool
    where
        I: IntoIterator<Item = DVec2>,
    {
        let mut island = Island::new();
        let mut finite = true;
        for p in points {
            finite &= p.is_finite();
            island.extend_point(p);
        }
        if !island.is_valid() || !finite {
            warn!(
                points = island.extends(),
                finite, "ignoring degenerate UV patch"
            );
            self.rejected += 1;
            return false;
        }
        island.payload.push(payload);
        self.insert(island, epsilon);
        true
    }

    /// Inserts an already built island, merging it with everything it touches.
    pub fn add_island(&mut self, island: Island<P>, epsilon: f64) -> Result<()> {
        match island.bounds {
            Some((min, max)) if min.is_finite() && max.is_finite() => {
                self.insert(island, epsilon);
                Ok(())
            }
            Some((min, max)) => Err(AtlasError::InvalidIsland(format!(
                "non-finite bounds {min}..{max}"
            ))),
            None => Err(AtlasError::InvalidIsland("island has no bounds".into())),
        }
    }

    fn insert(&mut self, island: Island<P>, epsilon: f64) {
        let mut candidate = island;
        // The enlarged candidate may reach islands it missed before: rescan after every merge.
        while let Some(idx) = self
            .islands
            .iter()
            .position(|existing| existing.intersects(&candidate, epsilon))
        {
            let mut absorbed = self.islands.swap_remove(idx);
            absorbed.absorb(candidate);
            candidate = absorbed;
            self.merges += 1;
        }
        self.islands.push(candidate);
    }

    pub fn islands(&self) -> &[Island<P>] {
        &self.islands
    }

    pub fn into_islands(self) -> Vec<Island<P>> {
        self.islands
    }

    pub fn len(&self) -> usize {
        self.islands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.islands.is_empty()
    }

    /// Number of merge steps performed so far.
    pub fn merges(&self) -> usize {
        self.merges
    }

    /// Number of patches ignored as degenerate.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn total_extends(&self) -> usize {
        self.islands.iter().map(Island::extends).sum()
    }
}
