use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::board::Board;
use crate::error::GerberError;
use crate::geometry::{vector, Vector};
use crate::layers::Layer;

use super::require_positive;

/// Which way a jumper bridges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JumperOrientation {
    /// Between two horizontally adjacent pads.
    Horizontal,
    /// Between two vertically adjacent pads.
    Vertical,
    /// Diagonally under a pad, towards its via.
    Center,
}

/// A solder jumper footprint.
pub trait SolderJumper {
    /// Cut the clearance for a jumper centered on `at` now and defer its
    /// copper, mask and split gap.
    fn place<W: Write>(
        &self,
        board: &mut Board<W>,
        copper: usize,
        at: Vector,
        orientation: JumperOrientation,
    ) -> Result<(), GerberError>;

    /// Center-to-center span a trace into this jumper has to bridge.
    fn connection_distance(&self) -> f64;

    fn validate(&self) -> Result<(), GerberError>;
}

/// Round jumper: a copper disc split by a straight gap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CircularSolderJumper {
    pub copper_diameter: f64,
    pub outer_gap: f64,
    pub inner_gap: f64,
    pub connection_width: f64,
}

impl CircularSolderJumper {
    pub fn new(copper_diameter: f64, outer_gap: f64, inner_gap: f64, connection_width: f64) -> Self {
        Self {
            copper_diameter,
            outer_gap,
            inner_gap,
            connection_width,
        }
    }

    pub fn outer_diameter(&self) -> f64 {
        self.copper_diameter + 2.0 * self.outer_gap
    }

    fn place_rotated<W: Write>(
        &self,
        board: &mut Board<W>,
        copper: usize,
        at: Vector,
        angle: f64,
    ) -> Result<(), GerberError> {
        let outer = self.outer_diameter();
        let expansion = board.settings().soldermask_expansion;
        let copper_layer = Layer::copper(copper)?;
        let mask_layer = Layer::mask(copper)?;

        board.layer(copper_layer).clear()?.circle(outer)?.flash(at)?;

        let jumper = *self;
        board.defer(move |layers| {
            let d = jumper.copper_diameter;
            let mask = layers.get(mask_layer);
            mask.clear()?.circle(outer)?.flash(at)?;
            mask.dark()?.circle(d + 2.0 * expansion)?.flash(at)?;

            let g = layers.get(copper_layer);
            g.dark()?.circle(d)?.flash(at)?;
            g.linear_interpolation()?;

            // connection
            let half = vector(outer / 2.0, 0.0);
            g.circle(jumper.connection_width)?
                .line(at - half.rotate(angle), at + half.rotate(angle))?;

            // gap
            let half = vector(0.0, d / 2.0);
            let (from, to) = (at - half.rotate(angle), at + half.rotate(angle));
            g.clear()?.circle(jumper.inner_gap)?.line(from, to)?.dark()?;

            let mask = layers.get(mask_layer);
            mask.clear()?
                .circle(jumper.inner_gap)?
                .linear_interpolation()?
                .line(from, to)?
                .dark()?;
            Ok(())
        });
        Ok(())
    }
}

impl SolderJumper for CircularSolderJumper {
    fn place<W: Write>(
        &self,
        board: &mut Board<W>,
        copper: usize,
        at: Vector,
        orientation: JumperOrientation,
    ) -> Result<(), GerberError> {
        let settings = *board.settings();
        if copper == settings.bottom_copper() {
            // Bottom jumpers all run diagonally; the center one sits in the
            // corner of the pad pointing at the via
            let at = match orientation {
                JumperOrientation::Center => {
                    let outer = self.outer_diameter();
                    let half = settings.raster / 2.0;
                    at + vector(-half + outer - 0.05, half - outer + 0.05)
                }
                _ => at,
            };
            return self.place_rotated(board, copper, at, -45.0);
        }

        let angle = match orientation {
            JumperOrientation::Vertical => 90.0,
            _ => 0.0,
        };
        self.place_rotated(board, copper, at, angle)
    }

    fn connection_distance(&self) -> f64 {
        self.outer_diameter()
    }

    fn validate(&self) -> Result<(), GerberError> {
        require_positive("jumper copper diameter", self.copper_diameter)?;
        require_positive("jumper outer gap", self.outer_gap)?;
        require_positive("jumper inner gap", self.inner_gap)?;
        require_positive("jumper connection width", self.connection_width)
    }
}

/// Rectangular jumper: two copper fingers separated by `inner_gap`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RectangularSolderJumper {
    pub width: f64,
    pub length: f64,
    pub outer_gap: f64,
    pub inner_gap: f64,
    pub connection_width: f64,
}

impl RectangularSolderJumper {
    pub fn new(
        width: f64,
        length: f64,
        outer_gap: f64,
        inner_gap: f64,
        connection_width: f64,
    ) -> Self {
        Self {
            width,
            length,
            outer_gap,
            inner_gap,
            connection_width,
        }
    }

    fn place_rotated<W: Write>(
        &self,
        board: &mut Board<W>,
        copper: usize,
        at: Vector,
        angle: f64,
    ) -> Result<(), GerberError> {
        let j = *self;
        let opening_x = 2.0 * (j.width + j.outer_gap) + j.inner_gap;
        let opening_y = j.length + 2.0 * j.outer_gap;
        let copper_layer = Layer::copper(copper)?;
        let mask_layer = Layer::mask(copper)?;

        // opening in surrounding copper
        board
            .layer(copper_layer)
            .clear()?
            .rectangle(at, opening_x, opening_y, angle)?;

        board.defer(move |layers| {
            let pad_x = 2.0 * j.width + j.inner_gap;

            // mask over the outer gap, none over the jumper itself
            let mask = layers.get(mask_layer);
            mask.clear()?.rectangle(at, opening_x, opening_y, angle)?;
            mask.dark()?.rectangle(at, pad_x, j.length, angle)?;

            let g = layers.get(copper_layer);
            g.dark()?.rectangle(at, pad_x, j.length, angle)?;
            g.linear_interpolation()?;

            // connection
            let half = vector(j.width + j.outer_gap + j.inner_gap / 2.0, 0.0);
            g.circle(j.connection_width)?
                .line(at - half.rotate(angle), at + half.rotate(angle))?;

            // gap
            let half = vector(0.0, j.length / 2.0);
            let (from, to) = (at - half.rotate(angle), at + half.rotate(angle));
            g.clear()?.circle(j.inner_gap)?.line(from, to)?.dark()?;

            let mask = layers.get(mask_layer);
            mask.clear()?
                .circle(j.inner_gap)?
                .linear_interpolation()?
                .line(from, to)?
                .dark()?;
            Ok(())
        });
        Ok(())
    }
}

impl SolderJumper for RectangularSolderJumper {
    fn place<W: Write>(
        &self,
        board: &mut Board<W>,
        copper: usize,
        at: Vector,
        orientation: JumperOrientation,
    ) -> Result<(), GerberError> {
        let angle = match orientation {
            JumperOrientation::Horizontal => 0.0,
            JumperOrientation::Vertical => 90.0,
            JumperOrientation::Center => -45.0,
        };
        self.place_rotated(board, copper, at, angle)
    }

    fn connection_distance(&self) -> f64 {
        self.inner_gap + self.width
    }

    fn validate(&self) -> Result<(), GerberError> {
        require_positive("jumper width", self.width)?;
        require_positive("jumper length", self.length)?;
        require_positive("jumper outer gap", self.outer_gap)?;
        require_positive("jumper inner gap", self.inner_gap)?;
        require_positive("jumper connection width", self.connection_width)
    }
}

/// Jumper style chosen by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum Jumper {
    Circular(CircularSolderJumper),
    Rectangular(RectangularSolderJumper),
}

impl SolderJumper for Jumper {
    fn place<W: Write>(
        &self,
        board: &mut Board<W>,
        copper: usize,
        at: Vector,
        orientation: JumperOrientation,
    ) -> Result<(), GerberError> {
        match self {
            Jumper::Circular(j) => j.place(board, copper, at, orientation),
            Jumper::Rectangular(j) => j.place(board, copper, at, orientation),
        }
    }

    fn connection_distance(&self) -> f64 {
        match self {
            Jumper::Circular(j) => j.connection_distance(),
            Jumper::Rectangular(j) => j.connection_distance(),
        }
    }

    fn validate(&self) -> Result<(), GerberError> {
        match self {
            Jumper::Circular(j) => j.validate(),
            Jumper::Rectangular(j) => j.validate(),
        }
    }
}
