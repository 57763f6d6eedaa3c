use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::GerberError;
use crate::geometry::{vector, Vector};

use super::require_positive;

/// Square solder pad filling one raster cell minus `gap`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pad {
    pub gap: f64,
}

impl Pad {
    pub fn new(gap: f64) -> Self {
        Self { gap }
    }

    pub fn validate(&self, raster: f64) -> Result<(), GerberError> {
        require_positive("pad gap", self.gap)?;
        require_positive("pad size (raster - gap)", raster - self.gap)
    }

    /// Flash the pad of the cell whose lower-left corner is `corner`,
    /// optionally with its soldermask opening.
    pub fn place<W: Write>(
        &self,
        board: &mut Board<W>,
        copper: usize,
        corner: Vector,
        with_mask: bool,
    ) -> Result<(), GerberError> {
        let raster = board.settings().raster;
        let expansion = board.settings().soldermask_expansion;
        let size = raster - self.gap;
        let center = corner + vector(raster / 2.0, raster / 2.0);

        board
            .copper(copper)?
            .dark()?
            .rectangle_aperture(size, size)?
            .flash(center)?;

        if with_mask {
            let opening = size + 2.0 * expansion;
            board
                .mask(copper)?
                .dark()?
                .rectangle_aperture(opening, opening)?
                .flash(center)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::testing::{memory_board, render_layers};
    use crate::gerber::interpreter::OperationKind;
    use crate::gerber::Polarity;
    use crate::layers::Layer;

    #[test]
    fn test_pad_flash_and_mask() {
        let mut board = memory_board();
        Pad::new(0.3)
            .place(&mut board, 0, vector(0.0, 0.0), true)
            .unwrap();
        let layers = render_layers(board);

        let top = &layers[&Layer::TopCopper];
        assert_eq!(
            top.count_at(OperationKind::Flash, Polarity::Dark, [1.27, 1.27]),
            1
        );
        let code = top.operations[0].aperture.unwrap();
        assert_eq!(
            top.apertures[&code].template,
            crate::gerber::commands::ApertureTemplate::Rectangle {
                x_size: 2.24,
                y_size: 2.24
            }
        );

        let mask = &layers[&Layer::TopMask];
        assert_eq!(
            mask.count_at(OperationKind::Flash, Polarity::Dark, [1.27, 1.27]),
            1
        );
    }

    #[test]
    fn test_pad_without_mask() {
        let mut board = memory_board();
        Pad::new(0.5)
            .place(&mut board, 3, vector(2.54, 0.0), false)
            .unwrap();
        let layers = render_layers(board);
        assert_eq!(layers[&Layer::BottomCopper].operations.len(), 1);
        assert!(layers[&Layer::BottomMask].operations.is_empty());
    }

    #[test]
    fn test_mask_on_inner_layer_is_rejected() {
        let mut board = memory_board();
        let err = Pad::new(0.3).place(&mut board, 1, vector(0.0, 0.0), true);
        assert!(matches!(err, Err(GerberError::Config(_))));
    }

    #[test]
    fn test_validate() {
        assert!(Pad::new(0.3).validate(2.54).is_ok());
        assert!(Pad::new(0.0).validate(2.54).is_err());
        assert!(Pad::new(3.0).validate(2.54).is_err());
    }
}
