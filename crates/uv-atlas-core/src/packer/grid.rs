use super::maxrects::MaxRectsBin;
use super::skyline::SkylineBin;
use super::{GridBin, Placements, RectPacker};
use crate::config::{AtlasConfig, MaxRectsHeuristic, PackingAlgorithm, SkylineHeuristic};
use crate::error::{AtlasError, Result};
use glam::DVec2;
use tracing::trace;

/// Stretches grid origins slightly so rounding in `size / cell` never lets
/// neighbouring float rectangles overlap.
const SPREAD: f64 = 1.0 + 1e-12;

/// Default packing primitive: snaps float sizes onto an integer grid and packs them
/// into the smallest square bin found by growing the side step by step.
///
/// Sizes are rounded up to whole cells, so the float rectangles placed at the cell
/// origins never overlap.
#[derive(Debug, Clone)]
pub struct GridPacker {
    pub algorithm: PackingAlgorithm,
    pub mr_heuristic: MaxRectsHeuristic,
    pub skyline_heuristic: SkylineHeuristic,
    pub resolution: u32,
    pub grow_factor: f64,
    pub max_attempts: usize,
}

impl Default for GridPacker {
    fn default() -> Self {
        Self::from_config(&AtlasConfig::default())
    }
}

impl GridPacker {
    pub fn from_config(cfg: &AtlasConfig) -> Self {
        Self {
            algorithm: cfg.algorithm.clone(),
            mr_heuristic: cfg.mr_heuristic.clone(),
            skyline_heuristic: cfg.skyline_heuristic.clone(),
            resolution: cfg.grid_resolution,
            grow_factor: cfg.grow_factor,
            max_attempts: 64,
        }
    }

    fn new_bin(&self, side: u32) -> Box<dyn GridBin> {
        match self.algorithm {
            PackingAlgorithm::MaxRects => {
                Box::new(MaxRectsBin::new(side, self.mr_heuristic.clone()))
            }
            PackingAlgorithm::Skyline => {
                Box::new(SkylineBin::new(side, self.skyline_heuristic.clone()))
            }
        }
    }

    fn try_side(&self, side: u32, cells: &[(u32, u32)]) -> Option<Vec<(u32, u32)>> {
        let mut bin = self.new_bin(side);
        let mut origins = Vec::with_capacity(cells.len());
        for &(w, h) in cells {
            let placed = bin.insert(w, h)?;
            origins.push((placed.x, placed.y));
        }
        Some(origins)
    }
}

impl RectPacker for GridPacker {
    fn pack(&mut self, sizes: &[DVec2]) -> Result<Placements> {
        if sizes.is_empty() {
            return Ok(Placements {
                origins: Vec::new(),
                extent: DVec2::ZERO,
            });
        }
        if let Some((i, s)) = sizes
            .iter()
            .enumerate()
            .find(|(_, s)| !(s.is_finite() && s.x > 0.0 && s.y > 0.0))
        {
            return Err(AtlasError::InvalidBox(format!("size #{i} is {s}")));
        }

        let total_area: f64 = sizes.iter().map(|s| s.x * s.y).sum();
        let cell = total_area.sqrt() / self.resolution.max(1) as f64;
        let cells: Vec<(u32, u32)> = sizes
            .iter()
            .map(|s| {
                let w = (s.x / cell).ceil().max(1.0) as u32;
                let h = (s.y / cell).ceil().max(1.0) as u32;
                (w, h)
            })
            .collect();
        let longest = cells.iter().map(|&(w, h)| w.max(h)).max().unwrap_or(1);

        let mut side = self.resolution.max(longest);
        for attempt in 0..self.max_attempts {
            trace!(attempt, side, "trying square grid bin");
            if let Some(origins) = self.try_side(side, &cells) {
                let origins: Vec<DVec2> = origins
                    .into_iter()
                    .map(|(x, y)| DVec2::new(x as f64, y as f64) * (cell * SPREAD))
                    .collect();
                let extent = origins
                    .iter()
                    .zip(sizes)
                    .fold(DVec2::ZERO, |acc, (o, s)| acc.max(*o + *s));
                return Ok(Placements { origins, extent });
            }
            let grown = (side as f64 * self.grow_factor).ceil() as u32;
            side = grown.max(side.saturating_add(1));
        }
        Err(AtlasError::OutOfSpace {
            side,
            attempts: self.max_attempts,
        })
    }
}
