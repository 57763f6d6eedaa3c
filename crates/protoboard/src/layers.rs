use std::fmt;

use crate::error::GerberError;
use crate::gerber::{BoardSide, CopperSide, FileAttribute, FileFunction, FilePolarity};

/// Number of copper layers the layer roles are laid out for.
pub const COPPER_LAYERS: usize = 4;

/// What role a Gerber file plays in the board stackup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Layer {
    TopCopper,
    InnerCopper1,
    InnerCopper2,
    BottomCopper,
    TopMask,
    BottomMask,
    TopSilk,
    BottomSilk,
    PlatedHoles,
    EdgeCuts,
}

impl Layer {
    /// Every layer in declaration order, so `layer as usize` indexes it.
    pub const ALL: [Layer; 10] = [
        Layer::TopCopper,
        Layer::InnerCopper1,
        Layer::InnerCopper2,
        Layer::BottomCopper,
        Layer::TopMask,
        Layer::BottomMask,
        Layer::TopSilk,
        Layer::BottomSilk,
        Layer::PlatedHoles,
        Layer::EdgeCuts,
    ];

    /// Copper layer by stackup index, 0 = top.
    pub fn copper(index: usize) -> Result<Layer, GerberError> {
        match index {
            0 => Ok(Layer::TopCopper),
            1 => Ok(Layer::InnerCopper1),
            2 => Ok(Layer::InnerCopper2),
            3 => Ok(Layer::BottomCopper),
            _ => Err(GerberError::Config(format!(
                "copper layer index {index} out of range 0..{COPPER_LAYERS}"
            ))),
        }
    }

    /// Soldermask for an outer copper index.
    pub fn mask(index: usize) -> Result<Layer, GerberError> {
        match index {
            0 => Ok(Layer::TopMask),
            3 => Ok(Layer::BottomMask),
            _ => Err(GerberError::Config(format!(
                "no soldermask for copper layer {index}"
            ))),
        }
    }

    /// Silkscreen for an outer copper index.
    pub fn silk(index: usize) -> Result<Layer, GerberError> {
        match index {
            0 => Ok(Layer::TopSilk),
            3 => Ok(Layer::BottomSilk),
            _ => Err(GerberError::Config(format!(
                "no silkscreen for copper layer {index}"
            ))),
        }
    }

    /// KiCad-style file name suffix.
    pub fn file_suffix(self) -> &'static str {
        match self {
            Layer::TopCopper => "F_Cu.gbr",
            Layer::InnerCopper1 => "In1_Cu.gbr",
            Layer::InnerCopper2 => "In2_Cu.gbr",
            Layer::BottomCopper => "B_Cu.gbr",
            Layer::TopMask => "F_Mask.gbr",
            Layer::BottomMask => "B_Mask.gbr",
            Layer::TopSilk => "F_Silkscreen.gbr",
            Layer::BottomSilk => "B_Silkscreen.gbr",
            Layer::PlatedHoles => "PTH-drl.gbr",
            Layer::EdgeCuts => "Edge_Cuts.gbr",
        }
    }

    /// Header attributes written when a file is started fresh.
    pub fn file_attributes(self) -> Vec<FileAttribute> {
        use FileAttribute::{Function, Polarity};

        let copper = |layer_num: u32, side| Function(FileFunction::Copper { layer_num, side });
        let (function, polarity) = match self {
            Layer::TopCopper => (copper(1, CopperSide::Top), FilePolarity::Positive),
            Layer::InnerCopper1 => (copper(2, CopperSide::Inner), FilePolarity::Positive),
            Layer::InnerCopper2 => (copper(3, CopperSide::Inner), FilePolarity::Positive),
            Layer::BottomCopper => (copper(4, CopperSide::Bottom), FilePolarity::Positive),
            Layer::TopMask => (
                Function(FileFunction::SolderMask {
                    side: BoardSide::Top,
                }),
                FilePolarity::Negative,
            ),
            Layer::BottomMask => (
                Function(FileFunction::SolderMask {
                    side: BoardSide::Bottom,
                }),
                FilePolarity::Negative,
            ),
            Layer::TopSilk => (
                Function(FileFunction::Legend {
                    side: BoardSide::Top,
                }),
                FilePolarity::Positive,
            ),
            Layer::BottomSilk => (
                Function(FileFunction::Legend {
                    side: BoardSide::Bottom,
                }),
                FilePolarity::Positive,
            ),
            Layer::PlatedHoles => (
                Function(FileFunction::Plated {
                    from: 1,
                    to: COPPER_LAYERS as u32,
                }),
                FilePolarity::Positive,
            ),
            Layer::EdgeCuts => (Function(FileFunction::Profile), FilePolarity::Positive),
        };
        vec![function, Polarity(polarity)]
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let suffix = self.file_suffix();
        write!(f, "{}", suffix.strip_suffix(".gbr").unwrap_or(suffix))
    }
}

/// Identify a layer from a file name produced by this crate.
pub fn identify_from_filename(filename: &str) -> Option<Layer> {
    // Strip directory path
    let name = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    Layer::ALL
        .into_iter()
        .find(|layer| name.ends_with(layer.file_suffix()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copper_roles() {
        assert_eq!(Layer::copper(0).unwrap(), Layer::TopCopper);
        assert_eq!(Layer::copper(1).unwrap(), Layer::InnerCopper1);
        assert_eq!(Layer::copper(2).unwrap(), Layer::InnerCopper2);
        assert_eq!(Layer::copper(3).unwrap(), Layer::BottomCopper);
        assert!(matches!(Layer::copper(4), Err(GerberError::Config(_))));
    }

    #[test]
    fn test_mask_and_silk_only_outer() {
        assert_eq!(Layer::mask(0).unwrap(), Layer::TopMask);
        assert_eq!(Layer::mask(3).unwrap(), Layer::BottomMask);
        assert!(Layer::mask(1).is_err());
        assert_eq!(Layer::silk(3).unwrap(), Layer::BottomSilk);
        assert!(Layer::silk(2).is_err());
    }

    #[test]
    fn test_identify_round_trip() {
        for layer in Layer::ALL {
            let path = format!("out/protoboard-{}", layer.file_suffix());
            assert_eq!(identify_from_filename(&path), Some(layer));
        }
        assert_eq!(identify_from_filename("readme.txt"), None);
    }

    #[test]
    fn test_mask_files_are_negative() {
        let attrs = Layer::TopMask.file_attributes();
        assert_eq!(
            attrs[1],
            FileAttribute::Polarity(FilePolarity::Negative)
        );
        let attrs = Layer::PlatedHoles.file_attributes();
        assert_eq!(
            attrs[0],
            FileAttribute::Function(FileFunction::Plated { from: 1, to: 4 })
        );
    }

    #[test]
    fn test_display() {
        assert_eq!(Layer::InnerCopper2.to_string(), "In2_Cu");
        assert_eq!(Layer::PlatedHoles.to_string(), "PTH-drl");
    }
}
