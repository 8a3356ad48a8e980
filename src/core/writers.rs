//! Data writers for scene flow records and transform summaries.
//!
//! This module provides functions for writing replay data to disk:
//! - Scene flow XML records in the format read by [`super::loaders`]
//! - CSV summaries of per-frame rigid transforms

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use super::loaders::{SceneFlowFrame, RESIDUAL_TAGS};
use super::transforms::split_residuals;

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },

    /// Residual matrix does not cover the frame's grid.
    #[error("frame grid is {width}x{height} but holds {cells} residuals")]
    ShapeMismatch { width: u32, height: u32, cells: usize },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// File name of the frame at `index`, e.g. `sflow_00042.xml`.
pub fn frame_file_name(index: usize) -> String {
    format!("sflow_{:05}.xml", index)
}

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

/// Creates a buffered writer for the given path.
fn create_buffered_writer(path: &Path) -> Result<BufWriter<File>> {
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(BufWriter::new(file))
}

/// Join values with single spaces.
///
/// `Display` for `f32` prints the shortest text that parses back to the
/// same value, so written records read back bit-for-bit.
fn join_floats(values: &[f32]) -> String {
    let mut out = String::with_capacity(values.len() * 8);
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&v.to_string());
    }
    out
}

/// Write a frame as a scene flow XML record.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `frame` - Frame to write; `width` is written as `rows`, `height` as `cols`
///
/// # Errors
///
/// Returns an error if the residual matrix does not have `width * height`
/// columns, or if the file cannot be created or written to.
pub fn write_scene_flow_xml(path: &Path, frame: &SceneFlowFrame) -> Result<()> {
    let cells = frame.num_cells();
    if (frame.width as usize) * (frame.height as usize) != cells {
        return Err(WriteError::ShapeMismatch {
            width: frame.width,
            height: frame.height,
            cells,
        });
    }

    ensure_parent_dirs(path)?;
    let mut writer = create_buffered_writer(path)?;
    let path_str = path.display().to_string();
    let write_err = |e| WriteError::WriteFile {
        path: path_str.clone(),
        source: e,
    };

    let t = frame.translation;
    let r = frame.rotation;
    let (x, y, z) = split_residuals(&frame.residuals);

    writeln!(writer, "<?xml version=\"1.0\" ?>").map_err(write_err)?;
    writeln!(writer, "<Root>").map_err(write_err)?;
    writeln!(
        writer,
        "  <Translation><data>{}</data></Translation>",
        join_floats(&[t.x, t.y, t.z])
    )
    .map_err(write_err)?;
    writeln!(
        writer,
        "  <Rotation><data>{}</data></Rotation>",
        join_floats(&[r.x, r.y, r.z])
    )
    .map_err(write_err)?;

    for (tag, values) in RESIDUAL_TAGS.iter().zip([&x, &y, &z]) {
        writeln!(writer, "  <{}>", tag).map_err(write_err)?;
        writeln!(writer, "    <rows>{}</rows>", frame.width).map_err(write_err)?;
        writeln!(writer, "    <cols>{}</cols>", frame.height).map_err(write_err)?;
        writeln!(writer, "    <data>{}</data>", join_floats(values)).map_err(write_err)?;
        writeln!(writer, "  </{}>", tag).map_err(write_err)?;
    }

    writeln!(writer, "</Root>").map_err(write_err)?;
    writer.flush().map_err(write_err)?;

    Ok(())
}

/// One row of a transform summary.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformRecord {
    pub file: String,
    pub translation: [f32; 3],
    pub rotation: [f32; 3],
    pub width: u32,
    pub height: u32,
}

impl TransformRecord {
    /// Summarise a decoded frame under the given file name.
    pub fn from_frame(file: impl Into<String>, frame: &SceneFlowFrame) -> Self {
        Self {
            file: file.into(),
            translation: [frame.translation.x, frame.translation.y, frame.translation.z],
            rotation: [frame.rotation.x, frame.rotation.y, frame.rotation.z],
            width: frame.width,
            height: frame.height,
        }
    }
}

/// Write per-frame rigid transforms to CSV.
///
/// Columns: file, tx, ty, tz, rx, ry, rz, width, height.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_transforms_csv(path: &Path, records: &[TransformRecord]) -> Result<()> {
    ensure_parent_dirs(path)?;

    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    let buf_writer = BufWriter::new(file);
    let mut csv_writer = csv::Writer::from_writer(buf_writer);

    let path_str = path.display().to_string();

    csv_writer
        .write_record(["file", "tx", "ty", "tz", "rx", "ry", "rz", "width", "height"])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for record in records {
        let [tx, ty, tz] = record.translation;
        let [rx, ry, rz] = record.rotation;
        csv_writer
            .write_record(&[
                record.file.clone(),
                tx.to_string(),
                ty.to_string(),
                tz.to_string(),
                rx.to_string(),
                ry.to_string(),
                rz.to_string(),
                record.width.to_string(),
                record.height.to_string(),
            ])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    csv_writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::loaders::load_scene_flow;
    use crate::core::transforms::interleave_residuals;
    use nalgebra::Vector3;
    use tempfile::TempDir;

    fn sample_frame() -> SceneFlowFrame {
        SceneFlowFrame {
            translation: Vector3::new(1.0, 2.0, 3.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            residuals: interleave_residuals(
                &[1.0, -2.0, 3.5, 0.1],
                &[0.0, 4.0, -0.25, 1e-7],
                &[7.0, 8.0, 9.0, 10.0],
            ),
            width: 2,
            height: 2,
            source_path: None,
        }
    }

    #[test]
    fn test_frame_file_name() {
        assert_eq!(frame_file_name(0), "sflow_00000.xml");
        assert_eq!(frame_file_name(42), "sflow_00042.xml");
    }

    #[test]
    fn test_write_then_load_is_exact() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join(frame_file_name(0));
        let frame = sample_frame();

        write_scene_flow_xml(&path, &frame).unwrap();
        let loaded = load_scene_flow(&path).unwrap();

        assert_eq!(loaded.translation, frame.translation);
        assert_eq!(loaded.rotation, frame.rotation);
        assert_eq!((loaded.width, loaded.height), (2, 2));
        for (a, b) in loaded.residuals.iter().zip(frame.residuals.iter()) {
            assert_eq!(a.to_bits(), b.to_bits());
        }
    }

    #[test]
    fn test_write_rejects_shape_mismatch() {
        let temp_dir = TempDir::new().unwrap();
        let mut frame = sample_frame();
        frame.width = 3;

        let result = write_scene_flow_xml(&temp_dir.path().join("bad.xml"), &frame);
        assert!(matches!(result, Err(WriteError::ShapeMismatch { cells: 4, .. })));
    }

    #[test]
    fn test_write_transforms_csv() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("transforms.csv");
        let records = vec![TransformRecord::from_frame("sflow_00000.xml", &sample_frame())];

        write_transforms_csv(&path, &records).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "file,tx,ty,tz,rx,ry,rz,width,height");
        assert_eq!(lines[1], "sflow_00000.xml,1,2,3,0,0,0,2,2");
    }
}
