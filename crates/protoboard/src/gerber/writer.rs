use std::io::Write;

use log::{debug, warn};

use crate::error::GerberError;
use crate::geometry::{vector, Vector};

use super::apertures::{
    ApertureKey, ApertureTable, CONTINUATION_APERTURE_BASE, FRESH_APERTURE_BASE,
};
use super::commands::{
    parse_commands, FileFunction, FilePolarity, GerberCommand, Polarity,
};
use super::coord::{encode, CoordinateFormat, MAX_COORDINATE_MM};
use super::lexer::tokenize;

/// X2 attribute allowed in a file header.
#[derive(Debug, Clone, PartialEq)]
pub enum FileAttribute {
    Function(FileFunction),
    Polarity(FilePolarity),
}

impl From<FileAttribute> for GerberCommand {
    fn from(attr: FileAttribute) -> Self {
        match attr {
            FileAttribute::Function(f) => GerberCommand::FileFunction(f),
            FileAttribute::Polarity(p) => GerberCommand::FilePolarity(p),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Header {
    Open,
    Closed,
}

/// Stateful Gerber serializer for one layer.
///
/// Aperture definitions are deduplicated per stream, and polarity or aperture
/// selections are only written when they change. Every drawing method returns
/// `&mut Self` so calls chain with `?`.
#[derive(Debug)]
pub struct GerberWriter<W: Write> {
    out: W,
    apertures: ApertureTable,
    polarity: Polarity,
    aperture: Option<u32>,
    header: Header,
}

impl<W: Write> GerberWriter<W> {
    /// Start a new file carrying the run's shared coordinate identifier.
    pub fn fresh(out: W, ident: &str) -> Result<Self, GerberError> {
        let mut writer = Self::with_table(out, ApertureTable::new(FRESH_APERTURE_BASE), Header::Open);
        writer.emit(GerberCommand::SameCoordinates(ident.to_string()))?;
        Ok(writer)
    }

    /// Copy `base` up to its `M02*` line and continue drawing after it.
    ///
    /// Aperture codes start at [`CONTINUATION_APERTURE_BASE`], or above the
    /// highest code the base defines if that is larger.
    pub fn continue_from(mut out: W, base: &str) -> Result<Self, GerberError> {
        for line in base.lines() {
            if line.trim_end() == "M02*" {
                break;
            }
            writeln!(out, "{line}")?;
        }

        let first_code = match highest_aperture_code(base) {
            Ok(Some(highest)) if highest >= CONTINUATION_APERTURE_BASE => highest + 1,
            Ok(_) => CONTINUATION_APERTURE_BASE,
            Err(e) => {
                warn!("could not scan base content for aperture codes ({e}), assuming none above {CONTINUATION_APERTURE_BASE}");
                CONTINUATION_APERTURE_BASE
            }
        };
        debug!("continuing base content, apertures from D{first_code}");

        Ok(Self::with_table(out, ApertureTable::new(first_code), Header::Closed))
    }

    fn with_table(out: W, apertures: ApertureTable, header: Header) -> Self {
        Self {
            out,
            apertures,
            // Forces the first dark request to be written
            polarity: Polarity::Clear,
            aperture: None,
            header,
        }
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    pub fn current_aperture(&self) -> Option<u32> {
        self.aperture
    }

    pub fn next_aperture_code(&self) -> u32 {
        self.apertures.next_code()
    }

    /// The stream written so far.
    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn emit(&mut self, cmd: GerberCommand) -> Result<(), GerberError> {
        writeln!(self.out, "{cmd}")?;
        Ok(())
    }

    fn emit_xy(
        &mut self,
        p: Vector,
        make: fn(Option<i64>, Option<i64>) -> GerberCommand,
    ) -> Result<&mut Self, GerberError> {
        if !(p.x.abs() <= MAX_COORDINATE_MM && p.y.abs() <= MAX_COORDINATE_MM) {
            return Err(GerberError::Config(format!(
                "coordinate ({}, {}) outside the 4.6 format",
                p.x, p.y
            )));
        }
        self.header = Header::Closed;
        self.emit(make(Some(encode(p.x)), Some(encode(p.y))))?;
        Ok(self)
    }

    /// Write one X2 file attribute. Only valid before [`Self::finish_header`].
    pub fn file_attribute(&mut self, attr: FileAttribute) -> Result<&mut Self, GerberError> {
        if self.header == Header::Closed {
            return Err(GerberError::HeaderClosed);
        }
        self.emit(attr.into())?;
        Ok(self)
    }

    /// Declare the coordinate format and units, then start in dark polarity.
    pub fn finish_header(&mut self) -> Result<&mut Self, GerberError> {
        self.emit(GerberCommand::FormatSpec(CoordinateFormat::default()))?;
        self.emit(GerberCommand::Millimeters)?;
        self.header = Header::Closed;
        self.polarity = Polarity::Clear;
        self.dark()
    }

    pub fn set_polarity(&mut self, polarity: Polarity) -> Result<&mut Self, GerberError> {
        if self.polarity != polarity {
            self.emit(GerberCommand::Polarity(polarity))?;
            self.polarity = polarity;
        }
        Ok(self)
    }

    pub fn dark(&mut self) -> Result<&mut Self, GerberError> {
        self.set_polarity(Polarity::Dark)
    }

    pub fn clear(&mut self) -> Result<&mut Self, GerberError> {
        self.set_polarity(Polarity::Clear)
    }

    /// Define (once) and select an aperture.
    pub fn aperture(&mut self, key: &ApertureKey) -> Result<&mut Self, GerberError> {
        key.shape.validate()?;
        let out = &mut self.out;
        let code = self.apertures.resolve(key, |code| {
            if let Some(function) = &key.function {
                writeln!(out, "{}", GerberCommand::ApertureFunction(function.clone()))?;
            }
            writeln!(
                out,
                "{}",
                GerberCommand::ApertureDefine {
                    code,
                    template: key.shape.template(),
                }
            )?;
            if key.function.is_some() {
                writeln!(out, "{}", GerberCommand::DeleteAttributes)?;
            }
            Ok(())
        })?;
        self.select(code)
    }

    pub fn circle(&mut self, diameter: f64) -> Result<&mut Self, GerberError> {
        self.aperture(&ApertureKey::circle(diameter, None))
    }

    pub fn circle_with_function(
        &mut self,
        diameter: f64,
        function: &str,
    ) -> Result<&mut Self, GerberError> {
        self.aperture(&ApertureKey::circle(diameter, Some(function)))
    }

    pub fn rectangle_aperture(&mut self, x_size: f64, y_size: f64) -> Result<&mut Self, GerberError> {
        self.aperture(&ApertureKey::rectangle(x_size, y_size, None))
    }

    fn select(&mut self, code: u32) -> Result<&mut Self, GerberError> {
        if self.aperture != Some(code) {
            self.emit(GerberCommand::SelectAperture(code))?;
            self.aperture = Some(code);
        }
        Ok(self)
    }

    pub fn linear_interpolation(&mut self) -> Result<&mut Self, GerberError> {
        self.emit(GerberCommand::LinearMode)?;
        Ok(self)
    }

    pub fn move_to(&mut self, p: Vector) -> Result<&mut Self, GerberError> {
        self.emit_xy(p, |x, y| GerberCommand::Move { x, y })
    }

    pub fn interpolate(&mut self, p: Vector) -> Result<&mut Self, GerberError> {
        self.emit_xy(p, |x, y| GerberCommand::Interpolate { x, y })
    }

    pub fn flash(&mut self, p: Vector) -> Result<&mut Self, GerberError> {
        self.emit_xy(p, |x, y| GerberCommand::Flash { x, y })
    }

    /// Straight trace from `from` to `to` with the selected aperture.
    pub fn line(&mut self, from: Vector, to: Vector) -> Result<&mut Self, GerberError> {
        self.move_to(from)?.interpolate(to)
    }

    /// Filled region. `body` issues a move and the interpolations; the
    /// region closes itself, so `body` must not return to the start point.
    pub fn contour<F>(&mut self, body: F) -> Result<&mut Self, GerberError>
    where
        F: FnOnce(&mut Self) -> Result<(), GerberError>,
    {
        self.emit(GerberCommand::RegionBegin)?;
        body(self)?;
        self.emit(GerberCommand::RegionEnd)?;
        Ok(self)
    }

    /// Filled rectangle centered on `center`, rotated by `angle` degrees.
    pub fn rectangle(
        &mut self,
        center: Vector,
        x_size: f64,
        y_size: f64,
        angle: f64,
    ) -> Result<&mut Self, GerberError> {
        let corner = |sx: f64, sy: f64| vector(sx * x_size / 2.0, sy * y_size / 2.0).rotate(angle) + center;
        self.contour(|g| {
            g.move_to(corner(-1.0, -1.0))?.linear_interpolation()?;
            g.interpolate(corner(1.0, -1.0))?;
            g.interpolate(corner(1.0, 1.0))?;
            g.interpolate(corner(-1.0, 1.0))?;
            Ok(())
        })
    }

    /// Write `M02*` and hand back the underlying stream.
    pub fn finish(mut self) -> Result<W, GerberError> {
        self.emit(GerberCommand::EndOfFile)?;
        self.out.flush()?;
        Ok(self.out)
    }

    /// Flush what was written so far without terminating the file.
    pub fn abandon(mut self) -> Result<W, GerberError> {
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Highest aperture code defined in Gerber source, if any.
pub fn highest_aperture_code(source: &str) -> Result<Option<u32>, GerberError> {
    let commands = parse_commands(&tokenize(source))?;
    Ok(commands
        .iter()
        .filter_map(|cmd| match cmd {
            GerberCommand::ApertureDefine { code, .. } => Some(*code),
            _ => None,
        })
        .max())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gerber::commands::CopperSide;

    fn fresh() -> GerberWriter<Vec<u8>> {
        let mut g = GerberWriter::fresh(Vec::new(), "run-1").unwrap();
        g.finish_header().unwrap();
        g
    }

    fn body_lines(g: GerberWriter<Vec<u8>>) -> Vec<String> {
        let out = String::from_utf8(g.abandon().unwrap()).unwrap();
        out.lines()
            .skip_while(|l| *l != "%LPD*%")
            .skip(1)
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_fresh_header() {
        let mut g = GerberWriter::fresh(Vec::new(), "abc").unwrap();
        g.file_attribute(FileAttribute::Function(FileFunction::Copper {
            layer_num: 1,
            side: CopperSide::Top,
        }))
        .unwrap()
        .file_attribute(FileAttribute::Polarity(FilePolarity::Positive))
        .unwrap()
        .finish_header()
        .unwrap();
        let out = String::from_utf8(g.finish().unwrap()).unwrap();
        assert_eq!(
            out,
            "%TF.SameCoordinates,abc*%\n\
             %TF.FileFunction,Copper,L1,Top*%\n\
             %TF.FilePolarity,Positive*%\n\
             %FSLAX46Y46*%\n\
             %MOMM*%\n\
             %LPD*%\n\
             M02*\n"
        );
    }

    #[test]
    fn test_attribute_after_drawing_is_rejected() {
        let mut g = fresh();
        g.circle(0.5).unwrap().flash(vector(0.0, 0.0)).unwrap();
        let err = g.file_attribute(FileAttribute::Polarity(FilePolarity::Positive));
        assert!(matches!(err, Err(GerberError::HeaderClosed)));
    }

    #[test]
    fn test_aperture_defined_once_and_selected_once() {
        let mut g = fresh();
        g.circle(0.75).unwrap().flash(vector(1.0, 1.0)).unwrap();
        g.circle(0.75).unwrap().flash(vector(2.0, 1.0)).unwrap();
        assert_eq!(
            body_lines(g),
            vec![
                "%ADD10C,0.750000*%",
                "D10*",
                "X001000000Y001000000D03*",
                "X002000000Y001000000D03*",
            ]
        );
    }

    #[test]
    fn test_reselect_after_switching() {
        let mut g = fresh();
        g.circle(0.5).unwrap();
        g.rectangle_aperture(2.24, 2.24).unwrap();
        g.circle(0.5).unwrap();
        assert_eq!(
            body_lines(g),
            vec![
                "%ADD10C,0.500000*%",
                "D10*",
                "%ADD11R,2.240000X2.240000*%",
                "D11*",
                "D10*",
            ]
        );
    }

    #[test]
    fn test_function_tag_emits_attribute_and_delete() {
        let mut g = fresh();
        g.circle_with_function(0.3, "ViaDrill").unwrap();
        g.circle(0.3).unwrap();
        assert_eq!(
            body_lines(g),
            vec![
                "%TA.AperFunction,ViaDrill*%",
                "%ADD10C,0.300000*%",
                "%TD*%",
                "D10*",
                "%ADD11C,0.300000*%",
                "D11*",
            ]
        );
    }

    #[test]
    fn test_polarity_only_written_on_change() {
        let mut g = fresh();
        g.dark().unwrap();
        g.clear().unwrap();
        g.clear().unwrap();
        g.dark().unwrap();
        g.set_polarity(Polarity::Dark).unwrap();
        assert_eq!(g.polarity(), Polarity::Dark);
        assert_eq!(body_lines(g), vec!["%LPC*%", "%LPD*%"]);
    }

    #[test]
    fn test_invalid_aperture_rejected_without_output() {
        let mut g = fresh();
        assert!(matches!(
            g.circle(0.0),
            Err(GerberError::InvalidAperture(_))
        ));
        assert!(g.circle(f64::INFINITY).is_err());
        assert!(g.current_aperture().is_none());
        assert!(body_lines(g).is_empty());
    }

    #[test]
    fn test_contour_wraps_body() {
        let mut g = fresh();
        g.contour(|g| {
            g.move_to(vector(0.0, 0.0))?.linear_interpolation()?;
            g.interpolate(vector(1.0, 0.0))?;
            g.interpolate(vector(1.0, 1.0))?;
            Ok(())
        })
        .unwrap();
        assert_eq!(
            body_lines(g),
            vec![
                "G36*",
                "X000000000Y000000000D02*",
                "G01*",
                "X001000000Y000000000D01*",
                "X001000000Y001000000D01*",
                "G37*",
            ]
        );
    }

    #[test]
    fn test_rotated_rectangle_corners() {
        let mut g = fresh();
        g.rectangle(vector(1.0, 1.0), 2.0, 1.0, 90.0).unwrap();
        let lines = body_lines(g);
        assert_eq!(lines.first().map(String::as_str), Some("G36*"));
        assert_eq!(lines.last().map(String::as_str), Some("G37*"));
        // (-1, -0.5) rotated a quarter turn is (0.5, -1), shifted by the center
        assert_eq!(lines[1], "X001500000Y000000000D02*");
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn test_negative_coordinates() {
        let mut g = fresh();
        g.move_to(vector(-0.75, -1.5)).unwrap();
        assert_eq!(body_lines(g), vec!["X-00750000Y-01500000D02*"]);
    }

    #[test]
    fn test_out_of_range_coordinate_rejected_without_output() {
        let mut g = fresh();
        assert!(matches!(
            g.move_to(vector(10_000.0, 0.0)),
            Err(GerberError::Config(_))
        ));
        assert!(g.flash(vector(0.0, f64::NAN)).is_err());
        g.move_to(vector(-MAX_COORDINATE_MM, MAX_COORDINATE_MM)).unwrap();
        assert_eq!(body_lines(g), vec!["X-9999999999Y9999999999D02*"]);
    }

    #[test]
    fn test_continue_from_base() {
        let base = "%TF.SameCoordinates,old*%\n%FSLAX46Y46*%\n%MOMM*%\n%ADD10C,0.100000*%\n%ADD37R,1.000000X1.000000*%\nD37*\nX0Y0D03*\nM02*\n";
        let mut g = GerberWriter::continue_from(Vec::new(), base).unwrap();
        assert_eq!(g.next_aperture_code(), CONTINUATION_APERTURE_BASE);
        assert!(g.file_attribute(FileAttribute::Polarity(FilePolarity::Positive)).is_err());
        g.dark().unwrap().circle(0.5).unwrap();
        let out = String::from_utf8(g.finish().unwrap()).unwrap();
        assert!(out.starts_with("%TF.SameCoordinates,old*%\n"));
        assert!(out.contains("X0Y0D03*\n%LPD*%\n%ADD1000C,0.500000*%\nD1000*\nM02*\n"));
        assert_eq!(out.matches("M02*").count(), 1);
    }

    #[test]
    fn test_continue_above_high_base_codes() {
        let base = "%ADD1004C,0.100000*%\nM02*\n";
        let g = GerberWriter::continue_from(Vec::new(), base).unwrap();
        assert_eq!(g.next_aperture_code(), 1005);
    }

    #[test]
    fn test_continue_from_unparseable_base() {
        for base in ["%FSLAY46X46*%\nM02*\n", "D10\u{e9}*\nM02*\n"] {
            let g = GerberWriter::continue_from(Vec::new(), base).unwrap();
            assert_eq!(g.next_aperture_code(), CONTINUATION_APERTURE_BASE, "{base}");
        }
    }

    #[test]
    fn test_highest_aperture_code() {
        assert_eq!(highest_aperture_code("G04 empty*\n").unwrap(), None);
        assert_eq!(
            highest_aperture_code("%ADD12C,0.1*%\n%ADD37C,0.2*%\n%ADD11C,0.3*%\n").unwrap(),
            Some(37)
        );
    }
}
