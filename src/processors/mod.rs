//! Dataset-level processing: discovery, replay, validation and generation.

pub mod replay;
pub mod scanner;
pub mod synth;
pub mod validation;

// Re-export key types for convenience
pub use replay::{ErrorKind, ReplayError, SceneFlowAlgorithm, SceneFlowReplay};
pub use scanner::{find_frame_files, ScanError, FRAME_FILE_PATTERN};
pub use synth::{synthetic_frame, write_synthetic_dataset};
pub use validation::{validate_dataset, FrameStatus, ValidationReport};
