//! Bake channels: which images get rendered onto the packed layout.

use crate::error::{AtlasError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One output image of the bake step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum BakeChannel {
    Diffuse,
    Alpha,
    Emit,
    Normal,
    Roughness,
    Metallic,
    /// Arbitrary output variable exposed by the material under a custom name.
    Aov(AovSpec),
}

/// How the renderer should produce a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPass {
    /// The channel value is routed through an emission shader and baked as emitted light.
    Emit,
    /// Tangent-space normal pass.
    Normal,
}

impl BakeChannel {
    /// The built-in channels, in the order they are usually baked.
    pub const STANDARD: [BakeChannel; 6] = [
        BakeChannel::Diffuse,
        BakeChannel::Alpha,
        BakeChannel::Emit,
        BakeChannel::Normal,
        BakeChannel::Roughness,
        BakeChannel::Metallic,
    ];

    pub fn name(&self) -> &str {
        match self {
            BakeChannel::Diffuse => "diffuse",
            BakeChannel::Alpha => "alpha",
            BakeChannel::Emit => "emit",
            BakeChannel::Normal => "normal",
            BakeChannel::Roughness => "roughness",
            BakeChannel::Metallic => "metallic",
            BakeChannel::Aov(aov) => &aov.name,
        }
    }

    pub fn render_pass(&self) -> RenderPass {
        match self {
            BakeChannel::Normal => RenderPass::Normal,
            _ => RenderPass::Emit,
        }
    }

    /// Value baked for a material that has no input for this channel.
    pub fn fallback_rgba(&self) -> [f32; 4] {
        match self {
            BakeChannel::Diffuse => [0.75, 0.75, 0.75, 1.0],
            BakeChannel::Alpha => [1.0, 1.0, 1.0, 1.0],
            BakeChannel::Emit => [0.0, 0.0, 0.0, 1.0],
            BakeChannel::Normal => [0.5, 0.5, 1.0, 1.0],
            BakeChannel::Roughness => [0.9, 0.9, 0.9, 1.0],
            BakeChannel::Metallic => [0.1, 0.1, 0.1, 1.0],
            BakeChannel::Aov(aov) => aov.default_rgba(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            BakeChannel::Aov(aov) => aov.validate(),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for BakeChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BakeChannel {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "diffuse" => Ok(Self::Diffuse),
            "alpha" => Ok(Self::Alpha),
            "emit" | "emission" => Ok(Self::Emit),
            "normal" => Ok(Self::Normal),
            "roughness" => Ok(Self::Roughness),
            "metallic" => Ok(Self::Metallic),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AovKind {
    Value,
    Color,
}

/// Default used when a material does not expose the AOV.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AovDefault {
    Value(f32),
    Color([f32; 3]),
}

/// Named arbitrary output variable baked as its own channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AovSpec {
    pub name: String,
    pub kind: AovKind,
    pub default: AovDefault,
}

impl AovSpec {
    pub fn new(name: impl Into<String>, kind: AovKind, default: AovDefault) -> Result<Self> {
        let spec = Self {
            name: name.into(),
            kind,
            default,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AtlasError::InvalidConfig("AOV name must not be empty".into()));
        }
        if BakeChannel::from_str(&self.name).is_ok() {
            return Err(AtlasError::InvalidConfig(format!(
                "AOV {:?} shadows a built-in channel",
                self.name
            )));
        }
        match (self.kind, self.default) {
            (AovKind::Value, AovDefault::Value(_)) | (AovKind::Color, AovDefault::Color(_)) => {}
            _ => {
                return Err(AtlasError::InvalidConfig(format!(
                    "AOV {:?} default does not match its kind {:?}",
                    self.name, self.kind
                )));
            }
        }
        let finite = match self.default {
            AovDefault::Value(v) => v.is_finite(),
            AovDefault::Color(c) => c.iter().all(|v| v.is_finite()),
        };
        if !finite {
            return Err(AtlasError::InvalidConfig(format!(
                "AOV {:?} has a non-finite default value",
                self.name
            )));
        }
        Ok(())
    }

    pub fn default_rgba(&self) -> [f32; 4] {
        match self.default {
            AovDefault::Value(v) => [v, v, v, 1.0],
            AovDefault::Color([r, g, b]) => [r, g, b, 1.0],
        }
    }
}
