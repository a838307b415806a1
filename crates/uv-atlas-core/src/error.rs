use crate::host::HostError;
use crate::pipeline::Stage;
use thiserror::Error;

/// Coarse classification of a failure, used to decide whether a run may continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A resolvable input is missing or malformed.
    Configuration,
    /// Discovery and remap disagree, or a packing invariant broke. Always fatal.
    GeometryInconsistency,
    /// The host (isolation, renderer, write-back) reported a failure.
    ExternalCollaborator,
}

#[derive(Debug, Error)]
pub enum AtlasError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Nothing to atlas: {0}")]
    Empty(String),
    #[error("Invalid island: {0}")]
    InvalidIsland(String),
    #[error("Invalid box: {0}")]
    InvalidBox(String),
    #[error("Packer produced no finite score in {rounds} round(s)")]
    NoFiniteScore { rounds: usize },
    #[error("Packing primitive returned an unusable placement: {0}")]
    InvalidPlacement(String),
    #[error("Boxes do not fit a square bin of side {side} after {attempts} attempts")]
    OutOfSpace { side: u32, attempts: usize },
    #[error("No UV transform matches polygon #{polygon} with mean UV ({u}, {v})")]
    NoMatchingTransform { polygon: usize, u: f64, v: f64 },
    #[error("{stage} failed for {context}")]
    Stage {
        stage: Stage,
        context: String,
        #[source]
        source: Box<AtlasError>,
    },
    #[error("{stage}: host failed for {context}")]
    External {
        stage: Stage,
        context: String,
        #[source]
        source: HostError,
    },
}

impl AtlasError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AtlasError::InvalidConfig(_) | AtlasError::Empty(_) => ErrorKind::Configuration,
            AtlasError::Stage { source, .. } => source.kind(),
            AtlasError::External { .. } => ErrorKind::ExternalCollaborator,
            AtlasError::InvalidIsland(_)
            | AtlasError::InvalidBox(_)
            | AtlasError::NoFiniteScore { .. }
            | AtlasError::InvalidPlacement(_)
            | AtlasError::OutOfSpace { .. }
            | AtlasError::NoMatchingTransform { .. } => ErrorKind::GeometryInconsistency,
        }
    }

    /// Attaches the active pipeline stage and the material/object being processed.
    pub fn in_stage(self, stage: Stage, context: impl Into<String>) -> Self {
        AtlasError::Stage {
            stage,
            context: context.into(),
            source: Box::new(self),
        }
    }

    pub fn external(stage: Stage, context: impl Into<String>, source: HostError) -> Self {
        AtlasError::External {
            stage,
            context: context.into(),
            source,
        }
    }

    /// The innermost error, with all stage wrappers removed.
    pub fn root(&self) -> &AtlasError {
        match self {
            AtlasError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, AtlasError>;
