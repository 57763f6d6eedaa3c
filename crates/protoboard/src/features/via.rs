use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::GerberError;
use crate::geometry::{vector, Vector};
use crate::layers::Layer;

use super::require_positive;

/// Aperture function tag for via drill flashes.
pub const VIA_DRILL_FUNCTION: &str = "ViaDrill";

/// Plated through-hole tying the bottom layer to one other copper layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Via {
    pub diameter: f64,
    pub hole_size: f64,
    pub connection_width: f64,
    /// Clearance between the via pad and surrounding copper.
    pub gap: f64,
    /// Clearance around the bottom connection trace.
    pub connection_gap: f64,
}

impl Via {
    pub fn new(
        diameter: f64,
        hole_size: f64,
        connection_width: f64,
        gap: f64,
        connection_gap: f64,
    ) -> Self {
        Self {
            diameter,
            hole_size,
            connection_width,
            gap,
            connection_gap,
        }
    }

    pub fn outer_diameter(&self) -> f64 {
        self.diameter + 2.0 * self.gap
    }

    pub fn validate(&self) -> Result<(), GerberError> {
        require_positive("via diameter", self.diameter)?;
        require_positive("via hole size", self.hole_size)?;
        require_positive("via connection width", self.connection_width)?;
        require_positive("via gap", self.gap)?;
        require_positive("via connection gap", self.connection_gap)?;
        if self.hole_size >= self.diameter {
            return Err(GerberError::Config(format!(
                "via hole {} does not fit in pad {}",
                self.hole_size, self.diameter
            )));
        }
        Ok(())
    }

    /// Place a via at `at` connected to copper layer `assigned`.
    ///
    /// The bottom connection runs `connection_length` from the via at
    /// `angle` degrees. The via stays connected to `assigned`; every other
    /// layer, and always the outer ones, gets a clearance ring.
    pub fn place<W: Write>(
        &self,
        board: &mut Board<W>,
        assigned: usize,
        at: Vector,
        connection_length: f64,
        angle: f64,
    ) -> Result<(), GerberError> {
        let settings = *board.settings();
        let bottom = settings.bottom_copper();
        if assigned > bottom {
            return Err(GerberError::Config(format!(
                "via assigned to copper layer {assigned}, board has {}",
                settings.copper_layers
            )));
        }

        let via = *self;
        let outer = self.outer_diameter();
        let connection_end = at + vector(connection_length, 0.0).rotate(angle);
        let trace_clearance = self.connection_width + 2.0 * self.connection_gap;

        for i in 0..settings.copper_layers {
            if i == 0 || i == bottom || i != assigned {
                board.copper(i)?.clear()?.circle(outer)?.flash(at)?;
            }
        }

        for layer in [Layer::BottomCopper, Layer::BottomMask] {
            board
                .layer(layer)
                .clear()?
                .circle(trace_clearance)?
                .linear_interpolation()?
                .line(at, connection_end)?;
        }

        board.defer(move |layers| {
            for i in 0..settings.copper_layers {
                layers.copper(i)?.dark()?.circle(via.diameter)?.flash(at)?;
            }
            Ok(())
        });

        board.defer(move |layers| {
            layers
                .get(Layer::BottomCopper)
                .dark()?
                .circle(via.connection_width)?
                .linear_interpolation()?
                .line(at, connection_end)?;
            Ok(())
        });

        if assigned == 0 {
            let stub_end = at + vector(via.diameter / 2.0 + via.gap, 0.0).rotate(angle);
            board.defer(move |layers| {
                layers
                    .get(Layer::TopCopper)
                    .dark()?
                    .circle(via.connection_width)?
                    .linear_interpolation()?
                    .line(at, stub_end)?;
                Ok(())
            });
        }

        let mask_opening = outer - 2.0 * settings.soldermask_expansion;
        for layer in [Layer::TopMask, Layer::BottomMask] {
            board.layer(layer).clear()?.circle(mask_opening)?.flash(at)?;
        }

        board
            .layer(Layer::PlatedHoles)
            .dark()?
            .circle_with_function(self.hole_size, VIA_DRILL_FUNCTION)?
            .flash(at)?;

        // Silkscreen marks which inner layer the via belongs to
        for layer in [Layer::TopSilk, Layer::BottomSilk] {
            match assigned {
                1 => {
                    board.layer(layer).dark()?.circle(self.diameter)?.flash(at)?;
                }
                2 => {
                    board
                        .layer(layer)
                        .dark()?
                        .circle(outer)?
                        .flash(at)?
                        .clear()?
                        .circle(self.diameter)?
                        .flash(at)?;
                }
                _ => {}
            }
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

    fn via() -> Via {
        Via::new(0.5, 0.3, 0.2, 0.2, 0.3)
    }

    fn first_index(
        report: &crate::gerber::interpreter::LayerReport,
        kind: OperationKind,
        polarity: Polarity,
        at: [f64; 2],
    ) -> Option<usize> {
        report.operations.iter().position(|op| {
            op.kind == kind
                && op.polarity == polarity
                && (op.at[0] - at[0]).abs() < 1e-3
                && (op.at[1] - at[1]).abs() < 1e-3
        })
    }

    #[test]
    fn test_clearance_on_every_other_layer() {
        let mut board = memory_board();
        via()
            .place(&mut board, 1, vector(1.27, 3.81), 1.0, -45.0)
            .unwrap();
        board.flush().unwrap();
        let layers = render_layers(board);
        let at = [1.27, 3.81];

        for (i, layer) in [
            Layer::TopCopper,
            Layer::InnerCopper1,
            Layer::InnerCopper2,
            Layer::BottomCopper,
        ]
        .into_iter()
        .enumerate()
        {
            let report = &layers[&layer];
            let clearances = report.count_at(OperationKind::Flash, Polarity::Clear, at);
            assert_eq!(clearances, usize::from(i != 1), "{layer}");
            assert_eq!(
                report.count_at(OperationKind::Flash, Polarity::Dark, at),
                1,
                "{layer}"
            );
            if clearances == 1 {
                let cut = first_index(report, OperationKind::Flash, Polarity::Clear, at);
                let fill = first_index(report, OperationKind::Flash, Polarity::Dark, at);
                assert!(cut < fill, "{layer}");
            }
        }
    }

    #[test]
    fn test_outer_layers_always_cleared() {
        let mut board = memory_board();
        via()
            .place(&mut board, 0, vector(0.0, 0.0), 1.0, 0.0)
            .unwrap();
        board.flush().unwrap();
        let layers = render_layers(board);
        for layer in [
            Layer::TopCopper,
            Layer::InnerCopper1,
            Layer::InnerCopper2,
            Layer::BottomCopper,
        ] {
            assert_eq!(
                layers[&layer].count_at(OperationKind::Flash, Polarity::Clear, [0.0, 0.0]),
                1,
                "{layer}"
            );
        }
        // top stub reaches the edge of the clearance
        let top = &layers[&Layer::TopCopper];
        assert_eq!(
            top.count_at(OperationKind::Draw, Polarity::Dark, [0.45, 0.0]),
            1
        );
    }

    #[test]
    fn test_bottom_connection_and_drill() {
        let mut board = memory_board();
        via()
            .place(&mut board, 2, vector(0.0, 0.0), 1.0, 90.0)
            .unwrap();
        board.flush().unwrap();
        let layers = render_layers(board);

        let bottom = &layers[&Layer::BottomCopper];
        assert_eq!(bottom.count_at(OperationKind::Draw, Polarity::Clear, [0.0, 1.0]), 1);
        assert_eq!(bottom.count_at(OperationKind::Draw, Polarity::Dark, [0.0, 1.0]), 1);
        assert!(layers[&Layer::TopCopper]
            .operations
            .iter()
            .all(|op| op.kind != OperationKind::Draw));

        let mask = &layers[&Layer::BottomMask];
        assert_eq!(mask.count_at(OperationKind::Draw, Polarity::Clear, [0.0, 1.0]), 1);
        assert_eq!(mask.count_at(OperationKind::Flash, Polarity::Clear, [0.0, 0.0]), 1);

        let pth = &layers[&Layer::PlatedHoles];
        assert_eq!(pth.operations.len(), 1);
        let code = pth.operations[0].aperture.unwrap();
        assert_eq!(pth.function_of(code), Some(VIA_DRILL_FUNCTION));

        // inner layer 2 marks a ring on both silkscreens
        for layer in [Layer::TopSilk, Layer::BottomSilk] {
            let silk = &layers[&layer];
            assert_eq!(silk.count_at(OperationKind::Flash, Polarity::Dark, [0.0, 0.0]), 1);
            assert_eq!(silk.count_at(OperationKind::Flash, Polarity::Clear, [0.0, 0.0]), 1);
        }
    }

    #[test]
    fn test_unassigned_via_has_no_silk() {
        let mut board = memory_board();
        via()
            .place(&mut board, 3, vector(0.0, 0.0), 1.0, 0.0)
            .unwrap();
        board.flush().unwrap();
        let layers = render_layers(board);
        assert!(layers[&Layer::TopSilk].operations.is_empty());
        assert!(layers[&Layer::BottomSilk].operations.is_empty());
    }

    #[test]
    fn test_rejects_unknown_layer() {
        let mut board = memory_board();
        let err = via().place(&mut board, 4, vector(0.0, 0.0), 1.0, 0.0);
        assert!(matches!(err, Err(GerberError::Config(_))));
    }

    #[test]
    fn test_validate() {
        assert!(via().validate().is_ok());
        assert!(Via::new(0.3, 0.5, 0.2, 0.2, 0.3).validate().is_err());
        assert!(Via::new(0.5, 0.3, 0.2, f64::NAN, 0.3).validate().is_err());
    }
}
