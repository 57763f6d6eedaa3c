use std::fmt;

use crate::error::GerberError;

use super::coord::{format_coordinate, CoordinateFormat};
use super::lexer::GerberToken;

/// Aperture shape template from an %AD command.
#[derive(Debug, Clone, PartialEq)]
pub enum ApertureTemplate {
    Circle {
        diameter: f64,
    },
    Rectangle {
        x_size: f64,
        y_size: f64,
    },
    /// Reference to an aperture macro, or any template this crate does not
    /// write itself. Kept so foreign base files still parse.
    Macro {
        name: String,
        params: Vec<f64>,
    },
}

/// Layer polarity from %LP command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    Dark,
    Clear,
}

/// Board side for non-copper layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardSide {
    Top,
    Bottom,
}

impl BoardSide {
    fn code(self) -> &'static str {
        match self {
            BoardSide::Top => "Top",
            BoardSide::Bottom => "Bot",
        }
    }
}

/// Copper layer side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopperSide {
    Top,
    Bottom,
    Inner,
}

impl CopperSide {
    fn code(self) -> &'static str {
        match self {
            CopperSide::Top => "Top",
            CopperSide::Inner => "Inr",
            CopperSide::Bottom => "Bot",
        }
    }
}

/// Gerber X2 FileFunction attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum FileFunction {
    Copper { layer_num: u32, side: CopperSide },
    Plated { from: u32, to: u32 },
    Legend { side: BoardSide },
    SolderMask { side: BoardSide },
    Profile,
    Other(String),
}

/// Gerber X2 FilePolarity attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePolarity {
    Positive,
    Negative,
}

/// A Gerber command, either parsed from a file or about to be written.
///
/// `Display` renders the exact wire form, one command per line.
#[derive(Debug, Clone, PartialEq)]
pub enum GerberCommand {
    /// %FS - Format specification
    FormatSpec(CoordinateFormat),
    /// %MOMM - Millimeter units, the only unit this crate writes
    Millimeters,
    /// %AD - Aperture definition
    ApertureDefine {
        code: u32,
        template: ApertureTemplate,
    },
    /// Dnn (n >= 10) - Select aperture
    SelectAperture(u32),
    /// D01 - Interpolate (draw)
    Interpolate { x: Option<i64>, y: Option<i64> },
    /// D02 - Move
    Move { x: Option<i64>, y: Option<i64> },
    /// D03 - Flash
    Flash { x: Option<i64>, y: Option<i64> },
    /// G01 - Linear interpolation mode
    LinearMode,
    /// G36 - Begin region
    RegionBegin,
    /// G37 - End region
    RegionEnd,
    /// %LP - Layer polarity
    Polarity(Polarity),
    /// %TF.FileFunction - Gerber X2 file function attribute
    FileFunction(FileFunction),
    /// %TF.FilePolarity
    FilePolarity(FilePolarity),
    /// %TF.SameCoordinates - shared identifier across one board's files
    SameCoordinates(String),
    /// %TA.AperFunction - attached to the next aperture definition
    ApertureFunction(String),
    /// %TD - delete attributes
    DeleteAttributes,
    /// M02 - End of file
    EndOfFile,
}

fn write_xy(f: &mut fmt::Formatter<'_>, x: Option<i64>, y: Option<i64>) -> fmt::Result {
    if let Some(x) = x {
        write!(f, "X{}", format_coordinate(x))?;
    }
    if let Some(y) = y {
        write!(f, "Y{}", format_coordinate(y))?;
    }
    Ok(())
}

impl fmt::Display for ApertureTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApertureTemplate::Circle { diameter } => write!(f, "C,{diameter:.6}"),
            ApertureTemplate::Rectangle { x_size, y_size } => {
                write!(f, "R,{x_size:.6}X{y_size:.6}")
            }
            ApertureTemplate::Macro { name, params } => {
                write!(f, "{name}")?;
                for (i, p) in params.iter().enumerate() {
                    let sep = if i == 0 { ',' } else { 'X' };
                    write!(f, "{sep}{p}")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for FileFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFunction::Copper { layer_num, side } => {
                write!(f, "Copper,L{layer_num},{}", side.code())
            }
            FileFunction::Plated { from, to } => write!(f, "Plated,{from},{to},PTH,Drill"),
            FileFunction::Legend { side } => write!(f, "Legend,{}", side.code()),
            FileFunction::SolderMask { side } => write!(f, "Soldermask,{}", side.code()),
            FileFunction::Profile => write!(f, "Profile,NP"),
            FileFunction::Other(s) => write!(f, "{s}"),
        }
    }
}

impl fmt::Display for GerberCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GerberCommand::FormatSpec(fs) => write!(
                f,
                "%FSLAX{}{}Y{}{}*%",
                fs.x_integer, fs.x_decimal, fs.y_integer, fs.y_decimal
            ),
            GerberCommand::Millimeters => write!(f, "%MOMM*%"),
            GerberCommand::ApertureDefine { code, template } => {
                write!(f, "%ADD{code}{template}*%")
            }
            GerberCommand::SelectAperture(code) => write!(f, "D{code}*"),
            GerberCommand::Interpolate { x, y } => {
                write_xy(f, *x, *y)?;
                write!(f, "D01*")
            }
            GerberCommand::Move { x, y } => {
                write_xy(f, *x, *y)?;
                write!(f, "D02*")
            }
            GerberCommand::Flash { x, y } => {
                write_xy(f, *x, *y)?;
                write!(f, "D03*")
            }
            GerberCommand::LinearMode => write!(f, "G01*"),
            GerberCommand::RegionBegin => write!(f, "G36*"),
            GerberCommand::RegionEnd => write!(f, "G37*"),
            GerberCommand::Polarity(Polarity::Dark) => write!(f, "%LPD*%"),
            GerberCommand::Polarity(Polarity::Clear) => write!(f, "%LPC*%"),
            GerberCommand::FileFunction(func) => write!(f, "%TF.FileFunction,{func}*%"),
            GerberCommand::FilePolarity(FilePolarity::Positive) => {
                write!(f, "%TF.FilePolarity,Positive*%")
            }
            GerberCommand::FilePolarity(FilePolarity::Negative) => {
                write!(f, "%TF.FilePolarity,Negative*%")
            }
            GerberCommand::SameCoordinates(ident) => write!(f, "%TF.SameCoordinates,{ident}*%"),
            GerberCommand::ApertureFunction(tag) => write!(f, "%TA.AperFunction,{tag}*%"),
            GerberCommand::DeleteAttributes => write!(f, "%TD*%"),
            GerberCommand::EndOfFile => write!(f, "M02*"),
        }
    }
}

/// Parse a token stream into a sequence of Gerber commands.
///
/// Aperture macro bodies and attributes this crate has no use for are
/// skipped rather than rejected.
pub fn parse_commands(tokens: &[GerberToken]) -> Result<Vec<GerberCommand>, GerberError> {
    let mut commands = Vec::new();

    for token in tokens {
        match token {
            GerberToken::Extended(content) => {
                if let Some(cmd) = parse_extended(content)? {
                    commands.push(cmd);
                }
            }
            GerberToken::Word(word) => {
                commands.extend(parse_word(word)?);
            }
        }
    }

    Ok(commands)
}

/// Parse an extended command (content between % delimiters).
fn parse_extended(content: &str) -> Result<Option<GerberCommand>, GerberError> {
    if content.starts_with("FS") {
        return Ok(Some(parse_format_spec(content)?));
    }
    if content == "MOMM" {
        return Ok(Some(GerberCommand::Millimeters));
    }
    if content.starts_with("MO") {
        return Err(GerberError::Parse(format!("unsupported units: {content}")));
    }
    if content.starts_with("ADD") {
        return Ok(Some(parse_aperture_define(content)?));
    }
    if content == "LPD" {
        return Ok(Some(GerberCommand::Polarity(Polarity::Dark)));
    }
    if content == "LPC" {
        return Ok(Some(GerberCommand::Polarity(Polarity::Clear)));
    }
    if content == "TD" || content.starts_with("TD.") {
        return Ok(Some(GerberCommand::DeleteAttributes));
    }
    if let Some(rest) = content.strip_prefix("TF.FileFunction,") {
        return Ok(Some(GerberCommand::FileFunction(parse_file_function(rest))));
    }
    if let Some(rest) = content.strip_prefix("TF.FilePolarity,") {
        let polarity = match rest {
            "Negative" => FilePolarity::Negative,
            _ => FilePolarity::Positive,
        };
        return Ok(Some(GerberCommand::FilePolarity(polarity)));
    }
    if let Some(rest) = content.strip_prefix("TF.SameCoordinates") {
        let ident = rest.strip_prefix(',').unwrap_or(rest);
        return Ok(Some(GerberCommand::SameCoordinates(ident.to_string())));
    }
    if let Some(rest) = content.strip_prefix("TA.AperFunction,") {
        return Ok(Some(GerberCommand::ApertureFunction(rest.to_string())));
    }
    // Skip other extended commands (AM bodies, AB, LR, TO, other TF/TA, etc.)
    Ok(None)
}

/// Parse %FS command. Example: `FSLAX46Y46`
fn parse_format_spec(content: &str) -> Result<GerberCommand, GerberError> {
    // Expected format: FS[LA|LT|TA|TI]X<n><m>Y<n><m>
    let s = &content[2..]; // skip "FS"

    // Skip L/T (zero suppression) and A/I (absolute/incremental) chars
    let s = s.trim_start_matches(['L', 'T', 'A', 'I']);

    let x_pos = s
        .find('X')
        .ok_or_else(|| GerberError::Parse("FS: missing X".into()))?;
    let y_pos = s
        .find('Y')
        .ok_or_else(|| GerberError::Parse("FS: missing Y".into()))?;

    if y_pos < x_pos {
        return Err(GerberError::Parse(format!("FS: Y before X in: {content}")));
    }
    let x_part = &s[x_pos + 1..y_pos];
    let y_part = &s[y_pos + 1..];

    if x_part.len() < 2
        || y_part.len() < 2
        || !x_part.is_ascii()
        || !y_part.is_ascii()
    {
        return Err(GerberError::Parse(format!(
            "FS: invalid format digits: X={x_part} Y={y_part}"
        )));
    }

    let digit = |part: &str, range: std::ops::Range<usize>| {
        part[range]
            .parse::<u8>()
            .map_err(|_| GerberError::Parse(format!("FS: bad digits: {part}")))
    };

    Ok(GerberCommand::FormatSpec(CoordinateFormat {
        x_integer: digit(x_part, 0..x_part.len() - 1)?,
        x_decimal: digit(x_part, x_part.len() - 1..x_part.len())?,
        y_integer: digit(y_part, 0..y_part.len() - 1)?,
        y_decimal: digit(y_part, y_part.len() - 1..y_part.len())?,
    }))
}

/// Parse %AD command. Example: `ADD10C,0.750000` or `ADD11R,2.240000X2.240000`
fn parse_aperture_define(content: &str) -> Result<GerberCommand, GerberError> {
    let s = &content[3..]; // skip "ADD"

    // Find where the code ends and the template type begins
    let type_pos = s
        .find(|c: char| c.is_ascii_alphabetic())
        .ok_or_else(|| GerberError::Parse(format!("AD: no template type in: {s}")))?;

    let code: u32 = s[..type_pos]
        .parse()
        .map_err(|_| GerberError::Parse(format!("AD: bad aperture code: {s}")))?;

    let template = parse_aperture_template(&s[type_pos..])?;

    Ok(GerberCommand::ApertureDefine { code, template })
}

/// Parse aperture template. Example: `C,0.020` or `R,0.040X0.020`
fn parse_aperture_template(s: &str) -> Result<ApertureTemplate, GerberError> {
    let (type_name, params_str) = match s.split_once(',') {
        Some((t, p)) => (t, p),
        None => (s, ""),
    };

    let params: Vec<f64> = if params_str.is_empty() {
        Vec::new()
    } else {
        params_str
            .split('X')
            .map(|p| {
                p.parse::<f64>()
                    .map_err(|_| GerberError::Parse(format!("AD: bad param: {p}")))
            })
            .collect::<Result<Vec<_>, _>>()?
    };

    match (type_name, params.as_slice()) {
        ("C", [diameter, ..]) => Ok(ApertureTemplate::Circle {
            diameter: *diameter,
        }),
        ("C", []) => Err(GerberError::Parse("AD C: missing diameter".into())),
        ("R", [x_size, y_size, ..]) => Ok(ApertureTemplate::Rectangle {
            x_size: *x_size,
            y_size: *y_size,
        }),
        ("R", _) => Err(GerberError::Parse(format!(
            "AD {type_name}: need x_size and y_size"
        ))),
        _ => Ok(ApertureTemplate::Macro {
            name: type_name.to_string(),
            params,
        }),
    }
}

/// Parse the value list of a %TF.FileFunction attribute.
fn parse_file_function(rest: &str) -> FileFunction {
    let parts: Vec<&str> = rest.split(',').collect();

    match parts.first().copied() {
        Some("Copper") => {
            let layer_num = parts
                .get(1)
                .and_then(|s| s.strip_prefix('L'))
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(1);
            let side = match parts.get(2).copied() {
                Some("Top") => CopperSide::Top,
                Some("Bot") | Some("Bottom") => CopperSide::Bottom,
                Some("Inr") | Some("Inner") => CopperSide::Inner,
                _ if layer_num == 1 => CopperSide::Top,
                _ => CopperSide::Inner,
            };
            FileFunction::Copper { layer_num, side }
        }
        Some("Plated") => {
            let from = parts.get(1).and_then(|s| s.parse().ok()).unwrap_or(1);
            let to = parts.get(2).and_then(|s| s.parse().ok()).unwrap_or(from);
            FileFunction::Plated { from, to }
        }
        Some("Legend") => FileFunction::Legend {
            side: parse_board_side(parts.get(1).copied()),
        },
        Some("Soldermask") => FileFunction::SolderMask {
            side: parse_board_side(parts.get(1).copied()),
        },
        Some("Profile") => FileFunction::Profile,
        _ => FileFunction::Other(rest.to_string()),
    }
}

fn parse_board_side(s: Option<&str>) -> BoardSide {
    match s {
        Some("Bot") | Some("Bottom") => BoardSide::Bottom,
        _ => BoardSide::Top,
    }
}

/// Parse a word command (e.g., "D10", "X100Y200D01", "G01", "M02").
///
/// A single word may contain an embedded G-code prefix (e.g., "G01X100Y200D01").
fn parse_word(word: &str) -> Result<Vec<GerberCommand>, GerberError> {
    let mut commands = Vec::new();
    let mut remaining = word;

    // Handle leading G-code if present
    if remaining.starts_with('G') || remaining.starts_with('g') {
        let g_end = remaining[1..]
            .find(|c: char| !c.is_ascii_digit())
            .map(|i| i + 1)
            .unwrap_or(remaining.len());
        match remaining[1..g_end].parse::<u32>().ok() {
            Some(1) => commands.push(GerberCommand::LinearMode),
            Some(36) => commands.push(GerberCommand::RegionBegin),
            Some(37) => commands.push(GerberCommand::RegionEnd),
            _ => {} // arc modes, deprecated codes: not produced here
        }
        remaining = &remaining[g_end..];
        if remaining.is_empty() {
            return Ok(commands);
        }
    }

    // Handle M-code
    if remaining.starts_with('M') || remaining.starts_with('m') {
        if remaining[1..].parse::<u32>().ok() == Some(2) {
            commands.push(GerberCommand::EndOfFile);
        }
        return Ok(commands);
    }

    // Coordinate/D-code word: optional X, Y values followed by a D code
    let mut x: Option<i64> = None;
    let mut y: Option<i64> = None;
    let mut d_code: Option<u32> = None;

    let bytes = remaining.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        if !bytes[pos].is_ascii() {
            return Err(GerberError::Parse(format!("non-ASCII character in: {word}")));
        }
        let key = (bytes[pos] as char).to_ascii_uppercase();
        pos += 1;
        let start = pos;
        if matches!(key, 'X' | 'Y' | 'I' | 'J')
            && pos < bytes.len()
            && (bytes[pos] == b'+' || bytes[pos] == b'-')
        {
            pos += 1;
        }
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        let digits = &remaining[start..pos];

        match key {
            'X' | 'Y' | 'I' | 'J' => {
                let val: i64 = digits
                    .parse()
                    .map_err(|_| GerberError::Parse(format!("bad coord in: {word}")))?;
                match key {
                    'X' => x = Some(val),
                    'Y' => y = Some(val),
                    _ => {} // arc offsets are never written by this crate
                }
            }
            'D' => {
                d_code = Some(
                    digits
                        .parse()
                        .map_err(|_| GerberError::Parse(format!("bad D-code in: {word}")))?,
                );
            }
            _ => {}
        }
    }

    match d_code {
        Some(1) => commands.push(GerberCommand::Interpolate { x, y }),
        Some(2) => commands.push(GerberCommand::Move { x, y }),
        Some(3) => commands.push(GerberCommand::Flash { x, y }),
        Some(code) if code >= 10 => commands.push(GerberCommand::SelectAperture(code)),
        _ => {
            // Bare coordinates: the previous D-code persists, which for
            // anything this crate cares about means D01
            if x.is_some() || y.is_some() {
                commands.push(GerberCommand::Interpolate { x, y });
            }
        }
    }

    Ok(commands)
}
