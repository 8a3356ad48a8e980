//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod writers;
pub mod xml;

pub use loaders::{
    decode_scene_flow, load_scene_flow, read_floats, read_floats_into, read_residual_field,
    DecodeError, LoaderError, ResidualField, SceneFlowFrame,
};
pub use writers::{frame_file_name, write_scene_flow_xml, write_transforms_csv, WriteError};
pub use xml::{XmlDocument, XmlElement, XmlError};
