//! Parse and validate `trellis.toml` and `trellis-graph.toml`.

pub mod graph;
pub mod manifest;

pub use graph::GraphFile;
pub use manifest::Manifest;
