//! Gerber X2 output: the command model, the per-layer writer and a
//! read-back path used for continuation and output checks.

pub mod apertures;
pub mod commands;
pub mod coord;
pub mod interpreter;
pub mod lexer;
pub mod writer;

use crate::error::GerberError;

use self::interpreter::LayerReport;

pub use self::commands::{BoardSide, CopperSide, FileFunction, FilePolarity, Polarity};
pub use self::writer::{FileAttribute, GerberWriter};

/// Parse Gerber source and check it the way a plotter would.
pub fn check(source: &str) -> Result<LayerReport, GerberError> {
    // Quick sanity check: Gerber files contain at least one * terminator
    if !source.contains('*') {
        return Err(GerberError::Parse("not a Gerber file (no * terminator)".into()));
    }
    let tokens = lexer::tokenize(source);
    let commands = commands::parse_commands(&tokens)?;
    Ok(interpreter::interpret(&commands))
}
