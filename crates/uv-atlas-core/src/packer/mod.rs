use crate::error::{AtlasError, Result};
use crate::model::{GridRect, Rect};
use glam::DVec2;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub mod grid;
pub mod maxrects;
pub mod skyline;

pub use grid::GridPacker;

/// Output of one call to a rectangle-packing primitive.
#[derive(Debug, Clone, PartialEq)]
pub struct Placements {
    /// Minimum corner of every input size, in input order.
    pub origins: Vec<DVec2>,
    /// Extent of the packed arrangement measured from the origin.
    pub extent: DVec2,
}

/// A rectangle-packing primitive.
///
/// Implementations place every size without overlap and without rotation, or fail.
/// The result may depend on input order.
pub trait RectPacker {
    fn pack(&mut self, sizes: &[DVec2]) -> Result<Placements>;
}

impl<T: RectPacker + ?Sized> RectPacker for Box<T> {
    fn pack(&mut self, sizes: &[DVec2]) -> Result<Placements> {
        (**self).pack(sizes)
    }
}

impl<T: RectPacker + ?Sized> RectPacker for &mut T {
    fn pack(&mut self, sizes: &[DVec2]) -> Result<Placements> {
        (**self).pack(sizes)
    }
}

/// An integer bin that places rectangles one by one.
pub trait GridBin {
    fn insert(&mut self, w: u32, h: u32) -> Option<GridRect>;
}

/// A rectangle handed to [`AtlasPacker`], with the best placement found so far.
#[derive(Debug, Clone)]
pub struct PackingBox<R> {
    pub rect: Rect,
    pub best: Option<Rect>,
    pub reference: R,
}

impl<R> PackingBox<R> {
    pub fn new(rect: Rect, reference: R) -> Self {
        Self {
            rect,
            best: None,
            reference,
        }
    }
}

/// Outcome of a single packing round.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PackRound {
    pub round: usize,
    /// None when the primitive failed or returned a non-finite extent.
    pub score: Option<f64>,
    /// Best score after this round.
    pub best: Option<f64>,
    pub improved: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PackReport {
    pub score: f64,
    pub rounds: Vec<PackRound>,
}

/// Best-of-N packing over randomized box orders.
pub struct AtlasPacker<P> {
    primitive: P,
    rounds: usize,
    rng: StdRng,
}

impl<P: RectPacker> AtlasPacker<P> {
    pub fn new(primitive: P, rounds: usize, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            primitive,
            rounds: rounds.max(1),
            rng,
        }
    }

    /// Packs `boxes` and stores each box's placement, normalized into `0..1`, in `best`.
    pub fn pack<R>(&mut self, boxes: &mut [PackingBox<R>]) -> Result<PackReport> {
        if boxes.is_empty() {
            return Ok(PackReport::default());
        }
        for (i, b) in boxes.iter().enumerate() {
            let r = b.rect;
            if !(r.w.is_finite() && r.h.is_finite() && r.w > 0.0 && r.h > 0.0) {
                return Err(AtlasError::InvalidBox(format!(
                    "box #{i} has size {}x{}",
                    r.w, r.h
                )));
            }
        }

        let mut order: Vec<usize> = (0..boxes.len()).collect();
        let mut best_score: Option<f64> = None;
        let mut report = PackReport::default();
        for round in 0..self.rounds {
            if round > 0 {
                order.shuffle(&mut self.rng);
            }
            let sizes: Vec<DVec2> = order.iter().map(|&i| boxes[i].rect.size()).collect();
            let score = match self.primitive.pack(&sizes) {
                Ok(placements) => {
                    if placements.origins.len() != sizes.len() {
                        return Err(AtlasError::InvalidPlacement(format!(
                            "{} origins for {} boxes",
                            placements.origins.len(),
                            sizes.len()
                        )));
                    }
                    let score = placements.extent.x.max(placements.extent.y);
                    let usable = score.is_finite()
                        && score > 0.0
                        && placements.origins.iter().all(|o| o.is_finite());
                    if usable && best_score.is_none_or(|best| score < best) {
                        for (&i, origin) in order.iter().zip(&placements.origins) {
                            let size = boxes[i].rect.size();
                            boxes[i].best = Some(Rect::new(origin.x, origin.y, size.x, size.y));
                        }
                        best_score = Some(score);
                        report.rounds.push(PackRound {
                            round,
                            score: Some(score),
                            best: best_score,
                            improved: true,
                        });
                        debug!(round, score, "packing round improved");
                        continue;
                    }
                    usable.then_some(score)
                }
                Err(e) => {
                    warn!(round, error = %e, "packing round failed");
                    None
                }
            };
            debug!(round, ?score, best = ?best_score, "packing round discarded");
            report.rounds.push(PackRound {
                round,
                score,
                best: best_score,
                improved: false,
            });
        }

        let Some(score) = best_score else {
            return Err(AtlasError::NoFiniteScore {
                rounds: self.rounds,
            });
        };
        for b in boxes.iter_mut() {
            b.best = b.best.map(|r| r.scale(1.0 / score));
        }
        report.score = score;
        Ok(report)
    }

    pub fn primitive(&self) -> &P {
        &self.primitive
    }
}
