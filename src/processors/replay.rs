//! Sequential replay of pre-computed scene flow.
//!
//! [`SceneFlowReplay`] stands in for a live scene flow estimator. It is
//! pointed at a directory of `sflow_NNNNN.xml` records and hands out one
//! decoded frame per call, in file name order.
//!
//! A failed read never moves the cursor, so the same frame is attempted again
//! on the next call. There is no skip-ahead.

use std::path::{Path, PathBuf};

use log::{debug, error, info, trace};
use thiserror::Error;

use crate::config::ReplayConfig;
use crate::core::loaders::{load_scene_flow, DecodeError, LoaderError, SceneFlowFrame};

use super::scanner::{self, ScanError};

/// Errors that can occur while constructing or advancing a replay.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Couldn't find directory {0}")]
    InvalidDirectory(PathBuf),

    #[error("Invalid frame filename pattern '{pattern}': {source}")]
    PatternCompile {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("Failed to list directory {path}: {source}")]
    Listing {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No more scene flow frames ({count} available)")]
    NoMoreFrames { count: usize },

    #[error(transparent)]
    Load(#[from] LoaderError),
}

impl From<ScanError> for ReplayError {
    fn from(err: ScanError) -> Self {
        match err {
            ScanError::DirectoryNotFound(path) | ScanError::NotADirectory(path) => {
                ReplayError::InvalidDirectory(path)
            }
            ScanError::InvalidPattern { pattern, source } => {
                ReplayError::PatternCompile { pattern, source }
            }
            ScanError::Listing { path, source } => ReplayError::Listing { path, source },
        }
    }
}

/// Flat classification of [`ReplayError`] for callers that only need to
/// branch on what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidDirectory,
    PatternCompile,
    Listing,
    NoMoreFrames,
    DocumentLoad,
    MissingField,
    MissingText,
    ShortNumericParse,
    EmptyField,
    DimensionMismatch,
    AllocationFailure,
}

impl ReplayError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReplayError::InvalidDirectory(_) => ErrorKind::InvalidDirectory,
            ReplayError::PatternCompile { .. } => ErrorKind::PatternCompile,
            ReplayError::Listing { .. } => ErrorKind::Listing,
            ReplayError::NoMoreFrames { .. } => ErrorKind::NoMoreFrames,
            ReplayError::Load(LoaderError::Document { .. }) => ErrorKind::DocumentLoad,
            ReplayError::Load(LoaderError::DimensionMismatch { .. }) => {
                ErrorKind::DimensionMismatch
            }
            ReplayError::Load(LoaderError::Field { source, .. }) => match source {
                DecodeError::MissingField { .. } => ErrorKind::MissingField,
                DecodeError::MissingText { .. } => ErrorKind::MissingText,
                DecodeError::ShortNumericParse { .. } => ErrorKind::ShortNumericParse,
                DecodeError::EmptyField { .. } => ErrorKind::EmptyField,
                DecodeError::AllocationFailure { .. } => ErrorKind::AllocationFailure,
            },
        }
    }
}

/// Result type for replay operations.
pub type Result<T> = std::result::Result<T, ReplayError>;

/// Interface shared with live scene flow estimators.
///
/// Estimators compute flow from the current depth and colour images; a
/// replay source ignores both and returns the next recorded frame.
pub trait SceneFlowAlgorithm {
    type Error;

    fn compute_scene_flow(
        &mut self,
        depth: Option<&[u16]>,
        colour: Option<&[u8]>,
    ) -> std::result::Result<SceneFlowFrame, Self::Error>;
}

/// File-backed sequential reader over a directory of scene flow records.
#[derive(Debug, Clone)]
pub struct SceneFlowReplay {
    directory: PathBuf,
    frame_names: Vec<String>,
    cursor: usize,
    enabled: bool,
    log_nonzero_residuals: bool,
}

impl SceneFlowReplay {
    /// Create a replay over `directory` with the default configuration.
    ///
    /// If the directory is missing or cannot be scanned, the error is logged
    /// and a disabled replay is returned; every read on it fails with
    /// `NoMoreFrames`. Use [`SceneFlowReplay::open`] to get the error instead.
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self::with_config(directory, &ReplayConfig::default())
    }

    /// Like [`SceneFlowReplay::new`], with an explicit configuration.
    pub fn with_config<P: AsRef<Path>>(directory: P, config: &ReplayConfig) -> Self {
        let directory = directory.as_ref();
        match Self::open(directory, config) {
            Ok(replay) => replay,
            Err(e) => {
                error!("{}", e);
                Self {
                    directory: directory.to_path_buf(),
                    frame_names: Vec::new(),
                    cursor: 0,
                    enabled: false,
                    log_nonzero_residuals: config.log_nonzero_residuals,
                }
            }
        }
    }

    /// Create a replay, returning construction errors to the caller.
    ///
    /// # Errors
    ///
    /// `InvalidDirectory` if `directory` does not exist or is not a
    /// directory, `PatternCompile` if the configured file pattern is not a
    /// valid regex, and `Listing` if the directory cannot be read.
    pub fn open<P: AsRef<Path>>(directory: P, config: &ReplayConfig) -> Result<Self> {
        let directory = directory.as_ref();
        let frame_names = scanner::find_frame_files(directory, &config.file_pattern)?;

        info!(
            "Found {} scene flow frames in {}",
            frame_names.len(),
            directory.display()
        );

        Ok(Self {
            directory: directory.to_path_buf(),
            frame_names,
            cursor: 0,
            enabled: true,
            log_nonzero_residuals: config.log_nonzero_residuals,
        })
    }

    /// Directory this replay reads from.
    #[inline]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Ordered frame file names.
    #[inline]
    pub fn frame_names(&self) -> &[String] {
        &self.frame_names
    }

    /// Index of the next frame to read.
    #[inline]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Total number of frames.
    #[inline]
    pub fn len(&self) -> usize {
        self.frame_names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frame_names.is_empty()
    }

    /// Number of frames not yet read.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.len() - self.cursor
    }

    /// Whether construction succeeded.
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Path of the frame the next read will decode.
    pub fn current_path(&self) -> Option<PathBuf> {
        self.frame_names
            .get(self.cursor)
            .map(|name| self.directory.join(name))
    }

    /// Decode the frame at the cursor and advance by one.
    ///
    /// # Errors
    ///
    /// `NoMoreFrames` once every frame has been read; otherwise any load or
    /// decode error for the current file. The cursor is left unchanged on
    /// every error.
    pub fn read_next(&mut self) -> Result<SceneFlowFrame> {
        let path = match self.current_path() {
            Some(path) => path,
            None => {
                error!("Tried to read scene flow file that doesn't exist");
                return Err(ReplayError::NoMoreFrames { count: self.len() });
            }
        };

        let frame = load_scene_flow(&path).map_err(|e| {
            error!("Failed to read scene flow from file {}: {}", path.display(), e);
            ReplayError::from(e)
        })?;

        debug!(
            "Frame {} translation ({}, {}, {})",
            self.cursor, frame.translation.x, frame.translation.y, frame.translation.z
        );
        if self.log_nonzero_residuals {
            trace_nonzero_residuals(&frame);
        }

        self.cursor += 1;
        Ok(frame)
    }
}

impl SceneFlowAlgorithm for SceneFlowReplay {
    type Error = ReplayError;

    fn compute_scene_flow(
        &mut self,
        _depth: Option<&[u16]>,
        _colour: Option<&[u8]>,
    ) -> Result<SceneFlowFrame> {
        self.read_next()
    }
}

fn trace_nonzero_residuals(frame: &SceneFlowFrame) {
    for (i, c) in frame.residuals.column_iter().enumerate() {
        if c[0] != 0.0 || c[1] != 0.0 || c[2] != 0.0 {
            trace!("residual[{}] = ({}, {}, {})", i, c[0], c[1], c[2]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::transforms::interleave_residuals;
    use crate::core::writers::{frame_file_name, write_scene_flow_xml};
    use nalgebra::Vector3;
    use std::fs;
    use tempfile::TempDir;

    fn frame(index: usize, width: u32, height: u32) -> SceneFlowFrame {
        let n = (width * height) as usize;
        let x: Vec<f32> = (0..n).map(|i| i as f32).collect();
        let y: Vec<f32> = (0..n).map(|i| -(i as f32)).collect();
        let z: Vec<f32> = (0..n).map(|_| index as f32).collect();
        SceneFlowFrame {
            translation: Vector3::new(index as f32, 0.0, 0.0),
            rotation: Vector3::zeros(),
            residuals: interleave_residuals(&x, &y, &z),
            width,
            height,
            source_path: None,
        }
    }

    fn dataset(frames: usize) -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        for i in 0..frames {
            let path = temp_dir.path().join(frame_file_name(i));
            write_scene_flow_xml(&path, &frame(i, 2, 2)).unwrap();
        }
        temp_dir
    }

    const MISMATCHED: &str = "<Root>\
        <Translation><data>1 2 3</data></Translation>\
        <Rotation><data>0 0 0</data></Rotation>\
        <SFx><rows>2</rows><cols>2</cols><data>1 2 3 4</data></SFx>\
        <SFy><rows>4</rows><cols>1</cols><data>1 2 3 4</data></SFy>\
        <SFz><rows>2</rows><cols>2</cols><data>1 2 3 4</data></SFz>\
        </Root>";

    #[test]
    fn test_three_frames_then_exhausted() {
        let temp_dir = dataset(3);
        let mut replay = SceneFlowReplay::new(temp_dir.path());

        assert!(replay.is_enabled());
        assert_eq!(replay.len(), 3);
        assert_eq!(replay.cursor(), 0);

        for expected in 0..3 {
            let frame = replay.read_next().unwrap();
            assert_eq!(frame.translation.x, expected as f32);
            assert_eq!(replay.cursor(), expected + 1);
        }
        assert_eq!(replay.remaining(), 0);

        for _ in 0..2 {
            let err = replay.read_next().unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NoMoreFrames);
            assert_eq!(replay.cursor(), 3);
        }
    }

    #[test]
    fn test_frames_read_in_name_order() {
        let temp_dir = TempDir::new().unwrap();
        for i in [2usize, 0, 1] {
            write_scene_flow_xml(&temp_dir.path().join(frame_file_name(i)), &frame(i, 1, 1))
                .unwrap();
        }
        fs::write(temp_dir.path().join("sflow_1.xml"), "garbage").unwrap();
        fs::write(temp_dir.path().join("readme.txt"), "notes").unwrap();

        let mut replay = SceneFlowReplay::new(temp_dir.path());
        assert_eq!(
            replay.frame_names(),
            &["sflow_00000.xml", "sflow_00001.xml", "sflow_00002.xml"]
        );

        let order: Vec<f32> = (0..3)
            .map(|_| replay.read_next().unwrap().translation.x)
            .collect();
        assert_eq!(order, vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_round_trip_values() {
        let temp_dir = TempDir::new().unwrap();
        let written = SceneFlowFrame {
            translation: Vector3::new(1.0, 2.0, 3.0),
            rotation: Vector3::new(0.0, 0.0, 0.0),
            residuals: interleave_residuals(
                &[1.0, 2.0, 3.0, 4.0],
                &[5.0, 6.0, 7.0, 8.0],
                &[9.0, 10.0, 11.0, 12.0],
            ),
            width: 2,
            height: 2,
            source_path: None,
        };
        write_scene_flow_xml(&temp_dir.path().join(frame_file_name(0)), &written).unwrap();

        let mut replay = SceneFlowReplay::new(temp_dir.path());
        let read = replay.read_next().unwrap();

        assert_eq!(read.translation, written.translation);
        assert_eq!(read.rotation, written.rotation);
        assert_eq!(read.residuals, written.residuals);
        assert_eq!((read.width, read.height), (2, 2));
        assert_eq!(
            read.source_path,
            Some(temp_dir.path().join("sflow_00000.xml"))
        );
    }

    #[test]
    fn test_dimension_mismatch_keeps_cursor() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("sflow_00000.xml"), MISMATCHED).unwrap();

        let mut replay = SceneFlowReplay::new(temp_dir.path());
        let err = replay.read_next().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
        assert_eq!(replay.cursor(), 0);

        let err = replay.read_next().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DimensionMismatch);
        assert_eq!(replay.cursor(), 0);

        let mut fresh = SceneFlowReplay::new(temp_dir.path());
        assert_eq!(
            fresh.read_next().unwrap_err().kind(),
            ErrorKind::DimensionMismatch
        );
    }

    #[test]
    fn test_failed_frame_is_not_skipped() {
        let temp_dir = dataset(2);
        fs::write(temp_dir.path().join("sflow_00000.xml"), "<Root><Translation>").unwrap();

        let mut replay = SceneFlowReplay::new(temp_dir.path());
        let err = replay.read_next().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DocumentLoad);
        assert_eq!(replay.cursor(), 0);

        // Repairing the file lets the same frame through.
        write_scene_flow_xml(&temp_dir.path().join("sflow_00000.xml"), &frame(0, 2, 2)).unwrap();
        assert!(replay.read_next().is_ok());
        assert_eq!(replay.cursor(), 1);
    }

    #[test]
    fn test_missing_rotation() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("sflow_00000.xml"),
            "<Root><Translation><data>1 2 3</data></Translation></Root>",
        )
        .unwrap();

        let mut replay = SceneFlowReplay::new(temp_dir.path());
        let err = replay.read_next().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingField);
        assert_eq!(replay.cursor(), 0);
    }

    #[test]
    fn test_short_translation() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(
            temp_dir.path().join("sflow_00000.xml"),
            "<Root><Translation><data>1 2</data></Translation></Root>",
        )
        .unwrap();

        let mut replay = SceneFlowReplay::new(temp_dir.path());
        let err = replay.read_next().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShortNumericParse);
        assert!(err.to_string().contains("read 2 of 3"));
    }

    #[test]
    fn test_missing_directory_disables_reader() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing");

        let mut replay = SceneFlowReplay::new(&missing);
        assert!(!replay.is_enabled());
        assert!(replay.is_empty());
        assert_eq!(replay.read_next().unwrap_err().kind(), ErrorKind::NoMoreFrames);

        let err = SceneFlowReplay::open(&missing, &ReplayConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDirectory);
    }

    #[test]
    fn test_file_instead_of_directory() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("sflow_00000.xml");
        fs::write(&file, MISMATCHED).unwrap();

        let err = SceneFlowReplay::open(&file, &ReplayConfig::default()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidDirectory);
        assert!(!SceneFlowReplay::new(&file).is_enabled());
    }

    #[test]
    fn test_bad_pattern_disables_reader() {
        let temp_dir = dataset(1);
        let config = ReplayConfig {
            file_pattern: "sflow_([0-9]{5}".to_string(),
            ..ReplayConfig::default()
        };

        let err = SceneFlowReplay::open(temp_dir.path(), &config).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PatternCompile);

        let replay = SceneFlowReplay::with_config(temp_dir.path(), &config);
        assert!(!replay.is_enabled());
        assert_eq!(replay.len(), 0);
    }

    #[test]
    fn test_independent_cursors() {
        let temp_dir = dataset(2);
        let mut a = SceneFlowReplay::new(temp_dir.path());
        let mut b = SceneFlowReplay::new(temp_dir.path());

        a.read_next().unwrap();
        a.read_next().unwrap();
        assert_eq!(a.cursor(), 2);
        assert_eq!(b.cursor(), 0);

        let frame = b.read_next().unwrap();
        assert_eq!(frame.translation.x, 0.0);
    }

    #[test]
    fn test_compute_scene_flow_ignores_images() {
        let temp_dir = dataset(1);
        let mut replay = SceneFlowReplay::new(temp_dir.path());

        let depth = vec![0u16; 4];
        let frame = replay.compute_scene_flow(Some(depth.as_slice()), None).unwrap();
        assert_eq!(frame.num_cells(), 4);
        assert_eq!(replay.cursor(), 1);
    }
}
