//! Visualization tools for scene flow frames.
//!
//! Renders the per-cell residual magnitude of a frame as a PNG heatmap using
//! the plotters library.

use std::path::Path;

use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use thiserror::Error;

use crate::core::loaders::SceneFlowFrame;
use crate::core::transforms::{magnitude_to_colors, residual_magnitudes};

/// Errors that can occur during visualization.
#[derive(Error, Debug)]
pub enum VisualizationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Plotting error: {0}")]
    PlottingError(String),

    #[error("Frame has no residuals")]
    EmptyFrame,

    #[error("Frame grid is {width}x{height} but holds {cells} residuals")]
    ShapeMismatch { width: u32, height: u32, cells: usize },
}

/// Result type for visualization operations.
pub type Result<T> = std::result::Result<T, VisualizationError>;

/// Plot residual magnitudes of a frame as a heatmap and save as PNG.
///
/// Cell `i` is drawn at column `i % width`, row `i / width`. Colors run from
/// blue (no motion) to red (largest motion in the frame).
///
/// # Arguments
///
/// * `output_path` - Path to save the PNG image
/// * `frame` - The frame to visualize
/// * `image_size` - Output size in pixels as `(width, height)`
pub fn plot_residual_magnitude(
    output_path: &Path,
    frame: &SceneFlowFrame,
    image_size: (u32, u32),
) -> Result<()> {
    let cells = frame.num_cells();
    if cells == 0 {
        return Err(VisualizationError::EmptyFrame);
    }
    if (frame.width as usize) * (frame.height as usize) != cells {
        return Err(VisualizationError::ShapeMismatch {
            width: frame.width,
            height: frame.height,
            cells,
        });
    }

    let colors = magnitude_to_colors(&residual_magnitudes(&frame.residuals));
    let grid_width = frame.width as usize;

    let root = BitMapBackend::new(output_path, image_size).into_drawing_area();

    root.fill(&WHITE).map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    let mut chart = ChartBuilder::on(&root)
        .margin(10)
        .build_cartesian_2d(0f32..frame.width as f32, 0f32..frame.height as f32)
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    chart
        .draw_series(colors.iter().enumerate().map(|(i, c)| {
            let x = (i % grid_width) as f32;
            let y = (i / grid_width) as f32;
            Rectangle::new([(x, y), (x + 1.0, y + 1.0)], RGBColor(c[0], c[1], c[2]).filled())
        }))
        .map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    root.present().map_err(|e| VisualizationError::PlottingError(e.to_string()))?;

    Ok(())
}
