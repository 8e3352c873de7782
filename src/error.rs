use std::fmt;

use thiserror::Error;

/// Geometric stage in which a region was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Extract,
    Unclip,
    Map,
    Rectify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Extract => "region extraction",
            Stage::Unclip => "unclip",
            Stage::Map => "coordinate mapping",
            Stage::Rectify => "rectification",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("invalid image: {0}")]
    Image(String),
    #[error("failed to read image: {0}")]
    ImageIo(#[from] image::ImageError),
    #[error("degenerate geometry during {stage}{}: {reason}", region_suffix(.region))]
    DegenerateGeometry {
        stage: Stage,
        region: Option<usize>,
        reason: String,
    },
    #[error("character table: {0}")]
    Dictionary(String),
    #[error(transparent)]
    Inference(#[from] ort::Error),
    #[error("unexpected inference output: {0}")]
    InferenceOutput(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

fn region_suffix(region: &Option<usize>) -> String {
    region
        .map(|index| format!(" (region {index})"))
        .unwrap_or_default()
}

impl Error {
    pub(crate) fn degenerate(stage: Stage, reason: impl Into<String>) -> Self {
        Error::DegenerateGeometry {
            stage,
            region: None,
            reason: reason.into(),
        }
    }

    /// Attaches the index of the region being processed to a geometry error.
    pub fn for_region(self, index: usize) -> Self {
        match self {
            Error::DegenerateGeometry { stage, reason, .. } => Error::DegenerateGeometry {
                stage,
                region: Some(index),
                reason,
            },
            other => other,
        }
    }

    /// Geometry errors only ever drop a single region.
    pub fn is_local(&self) -> bool {
        matches!(self, Error::DegenerateGeometry { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
