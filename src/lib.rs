//! Scene flow replay for motion estimation pipelines.
//!
//! This crate provides tools for:
//! - Discovering `sflow_NNNNN.xml` frame files in a dataset directory
//! - Decoding rigid transforms and dense residual fields from those files
//! - Replaying frames in order through the estimator interface
//! - Validating, generating and visualizing replay datasets
//!
//! # Example
//!
//! ```no_run
//! use sceneflow_replay::SceneFlowReplay;
//!
//! let mut replay = SceneFlowReplay::new("recordings/run_01");
//! while let Ok(frame) = replay.read_next() {
//!     println!("{} x {}: t = {:?}", frame.width, frame.height, frame.translation);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;
pub mod visualization;

pub use config::{AppConfig, OutputConfig, ReplayConfig};
pub use core::loaders::SceneFlowFrame;
pub use processors::replay::{ErrorKind, ReplayError, SceneFlowAlgorithm, SceneFlowReplay};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
