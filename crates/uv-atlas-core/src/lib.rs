//! Core library for consolidating per-material UV islands into one texture atlas.
//!
//! - Discovery: `IslandMerger` clusters UV patches into islands that stay apart by a tolerance
//! - Packing: `AtlasPacker` runs a `RectPacker` primitive (default `GridPacker`, MaxRects/Skyline)
//!   over randomized orders and keeps the tightest result
//! - Remap: `UvTransform` maps island UVs onto their packed place
//! - Pipeline: `AtlasBuildPipeline` drives a `SceneHost` + `AtlasPolicy` through every stage
//!
//! Quick example:
//! ```ignore
//! use uv_atlas_core::prelude::*;
//! # fn main() -> anyhow::Result<()> {
//! let mut scene = MemoryScene::from_json(&std::fs::read_to_string("scene.json")?)?;
//! let policy = scene.policy();
//! let objects = scene.object_names();
//! let cfg = AtlasConfig::builder().rounds(10).seed(Some(7)).build();
//! let outcome = AtlasBuildPipeline::new(&mut scene, &policy, cfg, objects)?.run()?;
//! println!("{}", outcome.stats.summary());
//! # Ok(()) }
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod host;
pub mod island;
pub mod layout;
pub mod model;
pub mod packer;
pub mod pipeline;
pub mod preview;
pub mod remap;
pub mod reporter;
pub mod scene;
pub mod transform;

pub use channel::*;
pub use config::*;
pub use error::*;
pub use host::*;
pub use island::*;
pub use layout::*;
pub use model::*;
pub use packer::*;
pub use pipeline::*;
pub use remap::*;
pub use reporter::*;
pub use transform::*;

/// Convenience prelude for common types and functions.
/// Importing `uv_atlas_core::prelude::*` brings the primary APIs into scope.
pub mod prelude {
    pub use crate::channel::{AovDefault, AovKind, AovSpec, BakeChannel, RenderPass};
    pub use crate::config::{
        AtlasConfig, AtlasConfigBuilder, IslandMode, MaxRectsHeuristic, PackingAlgorithm,
        SkylineHeuristic,
    };
    pub use crate::error::{AtlasError, ErrorKind};
    pub use crate::host::{AtlasPolicy, HostError, HostResult, Polygon, SceneHost};
    pub use crate::island::{Island, IslandMerger};
    pub use crate::layout::{AtlasLayout, LayoutQuad, layout_to_json};
    pub use crate::model::{AtlasStats, Rect};
    pub use crate::packer::{
        AtlasPacker, GridPacker, PackReport, PackingBox, Placements, RectPacker,
    };
    pub use crate::pipeline::{AtlasBuildPipeline, AtlasOutcome, Stage};
    pub use crate::preview::render_layout_preview;
    pub use crate::reporter::{ProgressObserver, ProgressReporter};
    pub use crate::scene::{MemoryScene, SceneDescription, ScenePolicy};
    pub use crate::transform::UvTransform;
}
