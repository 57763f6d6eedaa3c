use serde::{Deserialize, Serialize};

use crate::board::BoardSettings;
use crate::error::GerberError;
use crate::features::{CircularSolderJumper, Jumper, Pad, SolderJumper, Via};
use crate::gerber::coord::MAX_COORDINATE_MM;
use crate::layers::COPPER_LAYERS;

/// Everything needed to generate one protoboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// File name prefix, e.g. `protoboard-` gives `protoboard-F_Cu.gbr`.
    pub prefix: String,
    /// Grid pitch in mm.
    pub raster: f64,
    pub soldermask_expansion: f64,
    pub copper_layers: usize,
    pub via: Via,
    pub blocks: Vec<BlockConfig>,
    pub outline: Option<OutlineConfig>,
}

/// A rectangular patch of identical cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockConfig {
    /// Lower-left cell, in raster units.
    pub origin: [usize; 2],
    pub width: usize,
    pub height: usize,
    pub pad: Pad,
    pub jumper: Jumper,
}

/// Board outline drawn on the edge cuts layer around all blocks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OutlineConfig {
    pub margin: f64,
    pub line_width: f64,
}

impl Default for OutlineConfig {
    fn default() -> Self {
        Self {
            margin: 1.0,
            line_width: 0.1,
        }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        let connection_width = 0.2;
        let pads = [Pad::new(0.3), Pad::new(0.5)];

        // 2x2 blocks of 4x4 cells sweeping outer and inner jumper gaps
        let mut blocks = Vec::new();
        for (row, outer_gap) in [0.2, 0.3].into_iter().enumerate() {
            for (col, inner_gap) in [0.15, 0.25].into_iter().enumerate() {
                blocks.push(BlockConfig {
                    origin: [col * 4, row * 4],
                    width: 4,
                    height: 4,
                    pad: pads[blocks.len() % pads.len()],
                    jumper: Jumper::Circular(CircularSolderJumper::new(
                        0.75,
                        outer_gap,
                        inner_gap,
                        connection_width,
                    )),
                });
            }
        }

        Self {
            prefix: "protoboard-".to_string(),
            raster: 2.54,
            soldermask_expansion: 0.038,
            copper_layers: COPPER_LAYERS,
            via: Via::new(0.5, 0.3, connection_width, 0.2, 0.3),
            blocks,
            outline: None,
        }
    }
}

impl BoardConfig {
    pub fn from_json(json: &str) -> Result<Self, GerberError> {
        let config: BoardConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn settings(&self) -> BoardSettings {
        BoardSettings {
            raster: self.raster,
            soldermask_expansion: self.soldermask_expansion,
            copper_layers: self.copper_layers,
        }
    }

    /// Reject configurations that would produce invalid apertures or
    /// address layers that do not exist.
    pub fn validate(&self) -> Result<(), GerberError> {
        self.settings().validate()?;
        self.via.validate()?;
        if let Some(outline) = &self.outline {
            if !(outline.margin.is_finite() && outline.margin >= 0.0) {
                return Err(GerberError::Config(format!(
                    "outline margin must not be negative, got {}",
                    outline.margin
                )));
            }
            crate::features::require_positive("outline line width", outline.line_width)?;
        }
        for (i, block) in self.blocks.iter().enumerate() {
            if block.width == 0 || block.height == 0 {
                return Err(GerberError::Config(format!(
                    "block {i} has no cells ({}x{})",
                    block.width, block.height
                )));
            }
            block.pad.validate(self.raster)?;
            block.jumper.validate()?;
        }
        if let Some((min, max)) = self.extent() {
            // One raster of slack for features reaching past the cell edge
            let margin = self.outline.as_ref().map_or(0.0, |o| o.margin) + self.raster;
            let reach = min
                .iter()
                .chain(&max)
                .map(|v| v.abs() + margin)
                .fold(0.0, f64::max);
            if reach > MAX_COORDINATE_MM {
                return Err(GerberError::Config(format!(
                    "board reaches {reach} mm, beyond the {MAX_COORDINATE_MM} mm the coordinate format holds"
                )));
            }
        }
        Ok(())
    }

    /// Extent of all blocks in mm as (min, max) corners.
    pub fn extent(&self) -> Option<([f64; 2], [f64; 2])> {
        let r = self.raster;
        self.blocks.iter().fold(None, |acc, b| {
            let min = [b.origin[0] as f64 * r, b.origin[1] as f64 * r];
            let max = [
                (b.origin[0] as f64 + b.width as f64) * r,
                (b.origin[1] as f64 + b.height as f64) * r,
            ];
            Some(match acc {
                None => (min, max),
                Some((lo, hi)) => (
                    [f64::min(lo[0], min[0]), f64::min(lo[1], min[1])],
                    [f64::max(hi[0], max[0]), f64::max(hi[1], max[1])],
                ),
            })
        })
    }
}
