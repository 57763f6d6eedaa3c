//! Footprints placed on every protoboard cell.
//!
//! Each generator cuts its clearances immediately and defers the copper and
//! mask it adds back, so no neighbour's keep-out can land on top of it.

pub mod jumper;
pub mod pad;
pub mod via;

pub use self::jumper::{
    CircularSolderJumper, Jumper, JumperOrientation, RectangularSolderJumper, SolderJumper,
};
pub use self::pad::Pad;
pub use self::via::Via;

use crate::error::GerberError;

pub(crate) fn require_positive(what: &str, value: f64) -> Result<(), GerberError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(GerberError::Config(format!(
            "{what} must be positive, got {value}"
        )))
    }
}
