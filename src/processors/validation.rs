//! Offline validation of a replay dataset.
//!
//! Every frame file is decoded on its own, in parallel, without touching a
//! reader's cursor. This finds every broken frame in one pass, whereas a
//! [`SceneFlowReplay`](super::replay::SceneFlowReplay) stops at the first.

use std::path::Path;

use rayon::prelude::*;

use crate::config::ReplayConfig;
use crate::core::loaders::load_scene_flow;

use super::replay::{ReplayError, SceneFlowReplay};

/// Outcome of decoding one frame file.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameStatus {
    pub index: usize,
    pub file_name: String,
    /// `(width, height)` of a frame that decoded cleanly.
    pub dimensions: Option<(u32, u32)>,
    /// Error message of a frame that failed.
    pub error: Option<String>,
}

impl FrameStatus {
    #[inline]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Per-frame results for a whole dataset.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    pub frames: Vec<FrameStatus>,
}

impl ValidationReport {
    pub fn total(&self) -> usize {
        self.frames.len()
    }

    pub fn valid(&self) -> usize {
        self.frames.iter().filter(|f| f.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &FrameStatus> {
        self.frames.iter().filter(|f| !f.is_ok())
    }

    /// Whether every frame decodes and all frames share one grid size.
    pub fn is_consistent(&self) -> bool {
        let mut dims = self.frames.iter().map(|f| f.dimensions);
        match dims.next() {
            Some(Some(first)) => dims.all(|d| d == Some(first)),
            Some(None) => false,
            None => true,
        }
    }
}

/// Decode every frame in `directory` and report per-file status.
///
/// # Errors
///
/// Returns the construction errors of [`SceneFlowReplay::open`]; decode
/// failures are reported per frame instead.
pub fn validate_dataset(
    directory: &Path,
    config: &ReplayConfig,
) -> Result<ValidationReport, ReplayError> {
    let replay = SceneFlowReplay::open(directory, config)?;

    let frames = replay
        .frame_names()
        .par_iter()
        .enumerate()
        .map(|(index, name)| match load_scene_flow(directory.join(name)) {
            Ok(frame) => FrameStatus {
                index,
                file_name: name.clone(),
                dimensions: Some((frame.width, frame.height)),
                error: None,
            },
            Err(e) => FrameStatus {
                index,
                file_name: name.clone(),
                dimensions: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    Ok(ValidationReport { frames })
}
