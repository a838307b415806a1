use crate::channel::BakeChannel;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Atlas build configuration.
/// Key notes:
///   - `atlas_width`/`atlas_height` only matter as an aspect ratio; target images must match it
///   - `padding` and `default_epsilon` are in material pixel space
///     (see `AtlasPolicy::material_size`)
///   - `rounds` and `seed` drive the randomized restarts of the packer
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AtlasConfig {
    /// Width of the target atlas images in pixels.
    #[serde(default = "default_atlas_side")]
    pub atlas_width: u32,
    /// Height of the target atlas images in pixels.
    #[serde(default = "default_atlas_side")]
    pub atlas_height: u32,
    /// Pixels added around every island to avoid bleeding between neighbours.
    #[serde(default = "default_padding")]
    pub padding: f64,
    /// Size used for materials whose size cannot be resolved.
    #[serde(default = "default_material_size")]
    pub default_material_size: (f64, f64),
    /// Island merge tolerance used when the policy does not provide one.
    #[serde(default = "default_epsilon")]
    pub default_epsilon: f64,

    // packing
    /// Number of packing passes; every pass after the first shuffles the box order.
    #[serde(default = "default_rounds")]
    pub rounds: usize,
    /// Seed for the shuffle. None seeds from OS entropy.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default = "default_algorithm")]
    pub algorithm: PackingAlgorithm,
    #[serde(default = "default_mr_heuristic")]
    pub mr_heuristic: MaxRectsHeuristic,
    #[serde(default = "default_skyline_heuristic")]
    pub skyline_heuristic: SkylineHeuristic,
    /// Grid cells along the side of a square with the same area as all boxes together.
    #[serde(default = "default_grid_resolution")]
    pub grid_resolution: u32,
    /// Factor applied to the bin side each time the boxes do not fit.
    #[serde(default = "default_grow_factor")]
    pub grow_factor: f64,

    // discovery
    /// Exponent for the fill-ratio importance factor. None disables it.
    #[serde(default)]
    pub area_importance: Option<f64>,
    /// Feed polygons with the largest UV area first, so big islands form early.
    #[serde(default = "default_sort_patches")]
    pub sort_patches_by_area: bool,

    // bake
    #[serde(default)]
    pub channels: Vec<BakeChannel>,

    /// Minimum seconds between progress log lines.
    #[serde(default = "default_report_interval")]
    pub report_interval_secs: f64,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            atlas_width: default_atlas_side(),
            atlas_height: default_atlas_side(),
            padding: default_padding(),
            default_material_size: default_material_size(),
            default_epsilon: default_epsilon(),
            rounds: default_rounds(),
            seed: None,
            algorithm: default_algorithm(),
            mr_heuristic: default_mr_heuristic(),
            skyline_heuristic: default_skyline_heuristic(),
            grid_resolution: default_grid_resolution(),
            grow_factor: default_grow_factor(),
            area_importance: None,
            sort_patches_by_area: default_sort_patches(),
            channels: Vec::new(),
            report_interval_secs: default_report_interval(),
        }
    }
}

impl AtlasConfig {
    /// Validates the configuration parameters.
    ///
    /// Returns an error if:
    /// - Atlas dimensions are zero
    /// - Padding, epsilon or the default material size are not positive finite numbers
    /// - Packing controls (rounds, grid resolution, grow factor) cannot make progress
    /// - A bake channel is malformed
    pub fn validate(&self) -> crate::error::Result<()> {
        use crate::error::AtlasError;

        if self.atlas_width == 0 || self.atlas_height == 0 {
            return Err(AtlasError::InvalidConfig(format!(
                "atlas dimensions must be positive, got {}x{}",
                self.atlas_width, self.atlas_height
            )));
        }
        if !self.padding.is_finite() || self.padding <= 0.0 {
            return Err(AtlasError::InvalidConfig(format!(
                "padding must be a positive number of pixels, got {}",
                self.padding
            )));
        }
        let (mw, mh) = self.default_material_size;
        if !(mw.is_finite() && mh.is_finite() && mw > 0.0 && mh > 0.0) {
            return Err(AtlasError::InvalidConfig(format!(
                "default_material_size must be positive, got {mw}x{mh}"
            )));
        }
        if !self.default_epsilon.is_finite() || self.default_epsilon < 0.0 {
            return Err(AtlasError::InvalidConfig(format!(
                "default_epsilon must be non-negative, got {}",
                self.default_epsilon
            )));
        }
        if self.rounds == 0 {
            return Err(AtlasError::InvalidConfig("rounds must be at least 1".into()));
        }
        if self.grid_resolution < 8 {
            return Err(AtlasError::InvalidConfig(format!(
                "grid_resolution ({}) is too coarse, use at least 8",
                self.grid_resolution
            )));
        }
        if !self.grow_factor.is_finite() || self.grow_factor <= 1.0 {
            return Err(AtlasError::InvalidConfig(format!(
                "grow_factor must be greater than 1, got {}",
                self.grow_factor
            )));
        }
        if let Some(k) = self.area_importance {
            if !k.is_finite() || k < 0.0 {
                return Err(AtlasError::InvalidConfig(format!(
                    "area_importance must be a non-negative exponent, got {k}"
                )));
            }
        }
        if !self.report_interval_secs.is_finite() || self.report_interval_secs < 0.0 {
            return Err(AtlasError::InvalidConfig(format!(
                "report_interval_secs must be non-negative, got {}",
                self.report_interval_secs
            )));
        }
        for channel in &self.channels {
            channel.validate()?;
        }
        Ok(())
    }

    /// Atlas size as floats, used to bring pixel boxes into the atlas aspect ratio.
    pub fn atlas_size(&self) -> glam::DVec2 {
        glam::DVec2::new(self.atlas_width as f64, self.atlas_height as f64)
    }
}

/// Granularity of island discovery for one (object, material) pair.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum IslandMode {
    /// Every polygon is a patch. Slower, finds separated UV regions and packs them densely.
    #[default]
    PerPolygon,
    /// All polygons form one patch. Fast, but may pull large unused areas into the atlas.
    WholeObject,
}

impl FromStr for IslandMode {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "polygon" | "per_polygon" => Ok(Self::PerPolygon),
            "object" | "whole_object" => Ok(Self::WholeObject),
            _ => Err(()),
        }
    }
}

/// Rectangle-packing primitive used by the default grid packer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PackingAlgorithm {
    /// MaxRects free-list (high quality; several heuristics).
    MaxRects,
    /// Skyline (fast; good baseline).
    Skyline,
}

impl FromStr for PackingAlgorithm {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "maxrects" => Ok(Self::MaxRects),
            "skyline" => Ok(Self::Skyline),
            _ => Err(()),
        }
    }
}

/// MaxRects placement heuristics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MaxRectsHeuristic {
    BestAreaFit,
    BestShortSideFit,
    BestLongSideFit,
    BottomLeft,
    ContactPoint,
}

impl FromStr for MaxRectsHeuristic {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "baf" | "bestareafit" => Ok(Self::BestAreaFit),
            "bssf" | "bestshortsidefit" => Ok(Self::BestShortSideFit),
            "blsf" | "bestlongsidefit" => Ok(Self::BestLongSideFit),
            "bl" | "bottomleft" => Ok(Self::BottomLeft),
            "cp" | "contactpoint" => Ok(Self::ContactPoint),
            _ => Err(()),
        }
    }
}

/// Skyline placement heuristics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SkylineHeuristic {
    BottomLeft,
    MinWaste,
}

impl FromStr for SkylineHeuristic {
    type Err = ();
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bl" | "bottomleft" => Ok(Self::BottomLeft),
            "minwaste" | "mw" => Ok(Self::MinWaste),
            _ => Err(()),
        }
    }
}

fn default_atlas_side() -> u32 {
    1024
}
fn default_padding() -> f64 {
    4.0
}
fn default_material_size() -> (f64, f64) {
    (16.0, 16.0)
}
fn default_epsilon() -> f64 {
    1.0
}
fn default_rounds() -> usize {
    15
}
fn default_algorithm() -> PackingAlgorithm {
    PackingAlgorithm::MaxRects
}
fn default_mr_heuristic() -> MaxRectsHeuristic {
    MaxRectsHeuristic::BestAreaFit
}
fn default_skyline_heuristic() -> SkylineHeuristic {
    SkylineHeuristic::BottomLeft
}
fn default_grid_resolution() -> u32 {
    1024
}
fn default_grow_factor() -> f64 {
    1.05
}
fn default_sort_patches() -> bool {
    true
}
fn default_report_interval() -> f64 {
    5.0
}

/// Builder for `AtlasConfig` for ergonomic construction.
#[derive(Debug, Default, Clone)]
pub struct AtlasConfigBuilder {
    cfg: AtlasConfig,
}

impl AtlasConfigBuilder {
    pub fn new() -> Self {
        Self {
            cfg: AtlasConfig::default(),
        }
    }
    pub fn with_atlas_dimensions(mut self, w: u32, h: u32) -> Self {
        self.cfg.atlas_width = w;
        self.cfg.atlas_height = h;
        self
    }
    pub fn padding(mut self, v: f64) -> Self {
        self.cfg.padding = v;
        self
    }
    pub fn default_material_size(mut self, w: f64, h: f64) -> Self {
        self.cfg.default_material_size = (w, h);
        self
    }
    pub fn default_epsilon(mut self, v: f64) -> Self {
        self.cfg.default_epsilon = v;
        self
    }
    pub fn rounds(mut self, v: usize) -> Self {
        self.cfg.rounds = v;
        self
    }
    pub fn seed(mut self, v: Option<u64>) -> Self {
        self.cfg.seed = v;
        self
    }
    pub fn algorithm(mut self, v: PackingAlgorithm) -> Self {
        self.cfg.algorithm = v;
        self
    }
    pub fn mr_heuristic(mut self, v: MaxRectsHeuristic) -> Self {
        self.cfg.mr_heuristic = v;
        self
    }
    pub fn skyline_heuristic(mut self, v: SkylineHeuristic) -> Self {
        self.cfg.skyline_heuristic = v;
        self
    }
    pub fn grid_resolution(mut self, v: u32) -> Self {
        self.cfg.grid_resolution = v;
        self
    }
    pub fn grow_factor(mut self, v: f64) -> Self {
        self.cfg.grow_factor = v;
        self
    }
    pub fn area_importance(mut self, v: Option<f64>) -> Self {
        self.cfg.area_importance = v;
        self
    }
    pub fn sort_patches_by_area(mut self, v: bool) -> Self {
        self.cfg.sort_patches_by_area = v;
        self
    }
    pub fn channel(mut self, v: BakeChannel) -> Self {
        self.cfg.channels.push(v);
        self
    }
    pub fn channels(mut self, v: Vec<BakeChannel>) -> Self {
        self.cfg.channels = v;
        self
    }
    pub fn report_interval_secs(mut self, v: f64) -> Self {
        self.cfg.report_interval_secs = v;
        self
    }
    pub fn build(self) -> AtlasConfig {
        self.cfg
    }
}

impl AtlasConfig {
    /// Create a fluent builder for `AtlasConfig`.
    pub fn builder() -> AtlasConfigBuilder {
        AtlasConfigBuilder::new()
    }
}
