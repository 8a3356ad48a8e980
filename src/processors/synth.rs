//! Synthetic replay datasets.
//!
//! Generates small, deterministic datasets so that pipelines consuming a
//! replay source can be exercised without recorded data. All values are
//! multiples of 1/8, so they survive the text round trip exactly.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::info;
use nalgebra::{Matrix3xX, Vector3};

use crate::core::loaders::SceneFlowFrame;
use crate::core::writers::{frame_file_name, write_scene_flow_xml};

/// Build the synthetic frame at `index` for a `width x height` grid.
///
/// The scene drifts along +x by 1/8 per frame and yaws by 1/64; residuals
/// form a ramp over the grid that grows with the frame index.
pub fn synthetic_frame(index: usize, width: u32, height: u32) -> SceneFlowFrame {
    let step = index as f32;
    let cells = (width as usize) * (height as usize);
    let w = width.max(1) as usize;

    let residuals = Matrix3xX::from_fn(cells, |axis, cell| {
        let col = (cell % w) as f32;
        let row = (cell / w) as f32;
        match axis {
            0 => col * 0.125 * step,
            1 => row * 0.125 * step,
            _ => -0.25 * step,
        }
    });

    SceneFlowFrame {
        translation: Vector3::new(0.125 * step, 0.0, 0.0),
        rotation: Vector3::new(0.0, 0.015625 * step, 0.0),
        residuals,
        width,
        height,
        source_path: None,
    }
}

/// Write `frames` synthetic frames into `directory`.
///
/// # Returns
///
/// Paths of the written files, in frame order.
pub fn write_synthetic_dataset(
    directory: &Path,
    frames: usize,
    width: u32,
    height: u32,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(frames);

    for index in 0..frames {
        let path = directory.join(frame_file_name(index));
        let frame = synthetic_frame(index, width, height);
        write_scene_flow_xml(&path, &frame)
            .with_context(|| format!("Failed to write synthetic frame {}", path.display()))?;
        written.push(path);
    }

    info!(
        "Wrote {} synthetic {}x{} frames to {}",
        frames,
        width,
        height,
        directory.display()
    );

    Ok(written)
}
