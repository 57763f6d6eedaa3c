pub mod board;
pub mod config;
pub mod error;
pub mod features;
pub mod geometry;
pub mod gerber;
pub mod layers;
pub mod output;
pub mod queue;

pub use board::{render, Board, BoardSettings, HeaderMode, LayerSet};
pub use config::{BlockConfig, BoardConfig, OutlineConfig};
pub use error::GerberError;
pub use layers::Layer;
pub use output::{bundle_zip, check_file, generate, GeneratedBoard, OutputPaths};
