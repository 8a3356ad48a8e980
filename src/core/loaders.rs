//! Decoders for scene flow XML records.
//!
//! Each record file holds a rigid transform and three dense residual fields:
//!
//! ```text
//! <Root>
//!   <Translation><data>tx ty tz</data></Translation>
//!   <Rotation><data>rx ry rz</data></Rotation>
//!   <SFx><rows>R</rows><cols>C</cols><data>v_0 ... v_{R*C-1}</data></SFx>
//!   <SFy>...</SFy>
//!   <SFz>...</SFz>
//! </Root>
//! ```
//!
//! `rows` is decoded as the field width and `cols` as its height. Existing
//! datasets and their consumers rely on this mapping.

use std::path::{Path, PathBuf};

use log::{debug, error, warn};
use nalgebra::{Matrix3xX, Vector3};
use thiserror::Error;

use super::transforms::interleave_residuals;
use super::xml::{XmlDocument, XmlError};

/// Tag names of the three residual fields, in decode order.
pub const RESIDUAL_TAGS: [&str; 3] = ["SFx", "SFy", "SFz"];

/// Errors raised while decoding one element of a record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("missing '{field}' node")]
    MissingField { field: String },

    #[error("no text content in '{field}'")]
    MissingText { field: String },

    #[error("not enough float entries in '{field}': read {read} of {expected}")]
    ShortNumericParse {
        field: String,
        expected: usize,
        read: usize,
    },

    #[error("number of entries in residuals node '{field}' is zero")]
    EmptyField { field: String },

    #[error("cannot allocate storage for {count} entries in residuals node '{field}'")]
    AllocationFailure { field: String, count: usize },
}

/// Errors that can occur while loading a whole record.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("error reading scene flow file {path}: {source}")]
    Document {
        path: PathBuf,
        #[source]
        source: XmlError,
    },

    #[error("{source} in {file}")]
    Field {
        file: String,
        #[source]
        source: DecodeError,
    },

    #[error(
        "{field} residuals in {file} are {found_width}x{found_height}, expected {width}x{height}"
    )]
    DimensionMismatch {
        file: String,
        field: String,
        width: u32,
        height: u32,
        found_width: u32,
        found_height: u32,
    },
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// One dense residual component over a `width x height` grid.
#[derive(Debug, Clone, PartialEq)]
pub struct ResidualField {
    pub width: u32,
    pub height: u32,
    pub values: Vec<f32>,
}

impl ResidualField {
    /// Number of grid cells.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[inline]
    fn same_shape(&self, other: &ResidualField) -> bool {
        self.width == other.width && self.height == other.height
    }
}

/// A decoded scene flow record.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneFlowFrame {
    /// Global translation of the scene.
    pub translation: Vector3<f32>,
    /// Global rotation of the scene.
    pub rotation: Vector3<f32>,
    /// Per-cell residual motion. Column `i` holds `(x, y, z)` for cell `i`.
    pub residuals: Matrix3xX<f32>,
    /// Grid width, read from the `rows` element.
    pub width: u32,
    /// Grid height, read from the `cols` element.
    pub height: u32,
    /// File the frame was decoded from.
    pub source_path: Option<PathBuf>,
}

impl SceneFlowFrame {
    /// Number of grid cells (`width * height`).
    #[inline]
    pub fn num_cells(&self) -> usize {
        self.residuals.ncols()
    }

    /// Residual vector for one grid cell.
    pub fn residual(&self, index: usize) -> Option<Vector3<f32>> {
        if index < self.num_cells() {
            Some(self.residuals.column(index).into_owned())
        } else {
            None
        }
    }

    /// Number of cells with any non-zero residual component.
    pub fn nonzero_residuals(&self) -> usize {
        self.residuals
            .column_iter()
            .filter(|c| c[0] != 0.0 || c[1] != 0.0 || c[2] != 0.0)
            .count()
    }
}

/// Parse `num_floats` whitespace-separated floats from `text`.
///
/// Values are stored into `out` in order when a buffer is given; without one
/// they are only counted. Tokens beyond `num_floats` are ignored, and parsing
/// stops at the first token that is not a float.
///
/// # Arguments
///
/// * `field` - Name of the element being parsed, used in diagnostics
/// * `text` - Source text, `None` when the element has no text
/// * `num_floats` - Number of values required
/// * `out` - Optional destination buffer
///
/// # Returns
///
/// The number of values read, which equals `num_floats` on success.
///
/// # Errors
///
/// `MissingText` if `text` is `None`, `ShortNumericParse` if fewer than
/// `num_floats` values could be read.
pub fn read_floats(
    field: &str,
    text: Option<&str>,
    num_floats: usize,
    mut out: Option<&mut [f32]>,
) -> std::result::Result<usize, DecodeError> {
    if out.is_none() {
        warn!(
            "No output buffer for '{}'; values will be counted but not returned",
            field
        );
    }

    scan_floats(field, text, num_floats, |index, value| {
        if let Some(slot) = out.as_deref_mut().and_then(|buf| buf.get_mut(index)) {
            *slot = value;
        }
    })
}

/// Parse `num_floats` whitespace-separated floats from `text`, appending them
/// to `out`.
///
/// Behaves like [`read_floats`], but grows `out` one value at a time instead
/// of filling a pre-sized buffer. Reserve capacity up front to avoid
/// reallocation; only the part that is actually parsed gets written. On error
/// `out` holds the values read before the failure.
pub fn read_floats_into(
    field: &str,
    text: Option<&str>,
    num_floats: usize,
    out: &mut Vec<f32>,
) -> std::result::Result<usize, DecodeError> {
    scan_floats(field, text, num_floats, |_, value| out.push(value))
}

fn scan_floats<F>(
    field: &str,
    text: Option<&str>,
    num_floats: usize,
    mut store: F,
) -> std::result::Result<usize, DecodeError>
where
    F: FnMut(usize, f32),
{
    if num_floats == 0 {
        warn!(
            "Asked to read 0 floats from '{}'; this is valid but probably an error",
            field
        );
        return Ok(0);
    }

    let text = text.ok_or_else(|| DecodeError::MissingText {
        field: field.to_string(),
    })?;

    let mut read = 0;
    for token in text.split_whitespace().take(num_floats) {
        let value: f32 = match token.parse() {
            Ok(v) => v,
            Err(_) => {
                debug!("Stopped parsing '{}' at non-numeric token '{}'", field, token);
                break;
            }
        };

        store(read, value);
        read += 1;
    }

    if read < num_floats {
        error!(
            "Not enough float entries in '{}'. Expected {}, read {}",
            field, num_floats, read
        );
        return Err(DecodeError::ShortNumericParse {
            field: field.to_string(),
            expected: num_floats,
            read,
        });
    }

    Ok(read)
}

/// Parse a grid dimension the way C's `atoi` would, restricted to
/// non-negative values: leading whitespace is skipped, leading digits are
/// taken, and anything unparsable yields 0.
pub fn parse_dimension(text: Option<&str>) -> u32 {
    let trimmed = text.unwrap_or_default().trim_start();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits_end = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());

    trimmed[..digits_end].parse().unwrap_or(0)
}

/// Read one residual field (`SFx`, `SFy`, `SFz` or any other tag with the same
/// layout) from a document.
///
/// # Errors
///
/// Returns an error if the tag or any of its `rows`, `cols` or `data`
/// children is missing, if the grid is empty, if the buffer cannot be
/// allocated, or if `data` holds fewer than `width * height` values. No
/// partially filled buffer is ever returned.
pub fn read_residual_field(
    doc: &XmlDocument,
    tag: &str,
) -> std::result::Result<ResidualField, DecodeError> {
    let node = doc
        .root()
        .first_child(tag)
        .ok_or_else(|| missing(tag.to_string()))?;

    let rows = node
        .first_child("rows")
        .ok_or_else(|| missing(format!("{}/rows", tag)))?;
    let cols = node
        .first_child("cols")
        .ok_or_else(|| missing(format!("{}/cols", tag)))?;

    let width = parse_dimension(rows.text());
    let height = parse_dimension(cols.text());

    let count = (width as usize)
        .checked_mul(height as usize)
        .ok_or_else(|| DecodeError::AllocationFailure {
            field: tag.to_string(),
            count: usize::MAX,
        })?;

    if count == 0 {
        error!("Number of entries in residuals node {} is zero", tag);
        return Err(DecodeError::EmptyField {
            field: tag.to_string(),
        });
    }

    let data = node
        .first_child("data")
        .ok_or_else(|| missing(format!("{}/data", tag)))?;

    // Every value takes at least one character plus a separator, so the text
    // length bounds how many can actually be parsed.
    let max_tokens = data.text().map_or(0, |text| text.len() / 2 + 1);
    let mut values: Vec<f32> = Vec::new();
    values
        .try_reserve_exact(count.min(max_tokens))
        .map_err(|_| DecodeError::AllocationFailure {
            field: tag.to_string(),
            count,
        })?;

    read_floats_into(tag, data.text(), count, &mut values)?;

    Ok(ResidualField {
        width,
        height,
        values,
    })
}

/// Read a three-component vector from `<name><data>a b c</data></name>`.
pub fn read_vector3(
    doc: &XmlDocument,
    name: &str,
) -> std::result::Result<Vector3<f32>, DecodeError> {
    let data = doc
        .root()
        .first_child(name)
        .ok_or_else(|| missing(name.to_string()))?
        .first_child("data")
        .ok_or_else(|| missing(format!("{}/data", name)))?;

    let mut v = [0.0f32; 3];
    read_floats(name, data.text(), 3, Some(&mut v[..]))?;
    Ok(Vector3::new(v[0], v[1], v[2]))
}

/// Decode a complete scene flow record from a parsed document.
///
/// # Arguments
///
/// * `doc` - The parsed record
/// * `file` - File name used in error messages
///
/// # Errors
///
/// Returns an error if any required element is missing or malformed, or if
/// the `SFy`/`SFz` dimensions differ from those of `SFx`.
pub fn decode_scene_flow(doc: &XmlDocument, file: &str) -> Result<SceneFlowFrame> {
    let in_file = |source: DecodeError| LoaderError::Field {
        file: file.to_string(),
        source,
    };

    let translation = read_vector3(doc, "Translation").map_err(in_file)?;
    let rotation = read_vector3(doc, "Rotation").map_err(in_file)?;

    let [x_tag, y_tag, z_tag] = RESIDUAL_TAGS;
    let x = read_residual_field(doc, x_tag).map_err(in_file)?;
    let y = read_residual_field(doc, y_tag).map_err(in_file)?;
    check_shape(file, y_tag, &x, &y)?;
    let z = read_residual_field(doc, z_tag).map_err(in_file)?;
    check_shape(file, z_tag, &x, &z)?;

    let residuals = interleave_residuals(&x.values, &y.values, &z.values);

    Ok(SceneFlowFrame {
        translation,
        rotation,
        residuals,
        width: x.width,
        height: x.height,
        source_path: None,
    })
}

/// Load and decode a single scene flow file.
///
/// # Errors
///
/// Returns `LoaderError::Document` if the file cannot be read or is not
/// well-formed XML, and the errors of [`decode_scene_flow`] otherwise.
pub fn load_scene_flow<P: AsRef<Path>>(path: P) -> Result<SceneFlowFrame> {
    let path = path.as_ref();
    let doc = XmlDocument::load(path).map_err(|source| LoaderError::Document {
        path: path.to_path_buf(),
        source,
    })?;

    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut frame = decode_scene_flow(&doc, &file)?;
    frame.source_path = Some(path.to_path_buf());
    Ok(frame)
}

fn missing(field: String) -> DecodeError {
    error!("Couldn't find '{}' node", field);
    DecodeError::MissingField { field }
}

fn check_shape(file: &str, tag: &str, x: &ResidualField, other: &ResidualField) -> Result<()> {
    if x.same_shape(other) {
        return Ok(());
    }
    Err(LoaderError::DimensionMismatch {
        file: file.to_string(),
        field: tag.to_string(),
        width: x.width,
        height: x.height,
        found_width: other.width,
        found_height: other.height,
    })
}
