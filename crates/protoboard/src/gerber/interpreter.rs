use std::collections::HashMap;

use log::warn;

use super::commands::{ApertureTemplate, GerberCommand, Polarity};
use super::coord::CoordinateConverter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Flash,
    Draw,
    Region,
}

/// One piece of geometry found while walking a layer.
#[derive(Debug, Clone, PartialEq)]
pub struct Operation {
    pub kind: OperationKind,
    pub polarity: Polarity,
    /// Selected aperture; regions don't use one.
    pub aperture: Option<u32>,
    /// Flash position, draw end point or region start point, in mm.
    pub at: [f64; 2],
}

/// An aperture definition together with the function tag in force.
#[derive(Debug, Clone, PartialEq)]
pub struct DefinedAperture {
    pub template: ApertureTemplate,
    pub function: Option<String>,
}

/// What a layer contains, plus everything a plotter would reject.
#[derive(Debug, Default)]
pub struct LayerReport {
    pub operations: Vec<Operation>,
    pub apertures: HashMap<u32, DefinedAperture>,
    pub violations: Vec<String>,
    pub terminated: bool,
}

impl LayerReport {
    pub fn is_well_formed(&self) -> bool {
        self.terminated && self.violations.is_empty()
    }

    /// Operations matching `kind` and `polarity` located at `at` (±1 µm).
    pub fn count_at(&self, kind: OperationKind, polarity: Polarity, at: [f64; 2]) -> usize {
        self.operations
            .iter()
            .filter(|op| {
                op.kind == kind
                    && op.polarity == polarity
                    && (op.at[0] - at[0]).abs() < 1e-3
                    && (op.at[1] - at[1]).abs() < 1e-3
            })
            .count()
    }

    pub fn function_of(&self, code: u32) -> Option<&str> {
        self.apertures.get(&code)?.function.as_deref()
    }
}

#[derive(Debug, Default)]
struct Region {
    moves: usize,
    draws: usize,
    start: Option<[f64; 2]>,
}

/// Gerber state machine. Walks commands and records operations.
struct Interpreter {
    x: i64,
    y: i64,
    aperture: Option<u32>,
    polarity: Polarity,
    converter: CoordinateConverter,
    pending_function: Option<String>,
    region: Option<Region>,
    report: LayerReport,
}

impl Interpreter {
    fn new() -> Self {
        Self {
            x: 0,
            y: 0,
            aperture: None,
            polarity: Polarity::Dark,
            converter: CoordinateConverter::default(),
            pending_function: None,
            region: None,
            report: LayerReport::default(),
        }
    }

    fn position(&self) -> [f64; 2] {
        [
            self.converter.to_mm(self.x, true),
            self.converter.to_mm(self.y, false),
        ]
    }

    fn update(&mut self, x: Option<i64>, y: Option<i64>) {
        if let Some(nx) = x {
            self.x = nx;
        }
        if let Some(ny) = y {
            self.y = ny;
        }
    }

    fn violation(&mut self, msg: String) {
        warn!("Gerber: {msg}");
        self.report.violations.push(msg);
    }

    fn record(&mut self, kind: OperationKind) {
        if self.aperture.is_none() {
            self.violation(format!("{kind:?} with no aperture selected"));
        }
        let at = self.position();
        self.report.operations.push(Operation {
            kind,
            polarity: self.polarity,
            aperture: self.aperture,
            at,
        });
    }

    fn process(&mut self, cmd: &GerberCommand) {
        if self.report.terminated {
            self.violation(format!("{cmd} after M02*"));
            return;
        }
        match cmd {
            GerberCommand::FormatSpec(fmt) => {
                self.converter.format = fmt.clone();
            }
            GerberCommand::ApertureFunction(tag) => {
                self.pending_function = Some(tag.clone());
            }
            GerberCommand::DeleteAttributes => {
                self.pending_function = None;
            }
            GerberCommand::ApertureDefine { code, template } => {
                let defined = DefinedAperture {
                    template: template.clone(),
                    function: self.pending_function.clone(),
                };
                if self.report.apertures.insert(*code, defined).is_some() {
                    self.violation(format!("aperture D{code} defined twice"));
                }
            }
            GerberCommand::SelectAperture(code) => {
                if !self.report.apertures.contains_key(code) {
                    self.violation(format!("D{code} selected before it was defined"));
                }
                self.aperture = Some(*code);
            }
            GerberCommand::Polarity(p) => {
                self.polarity = *p;
            }
            GerberCommand::RegionBegin => {
                if self.region.is_some() {
                    self.violation("G36* inside an open region".into());
                }
                self.region = Some(Region::default());
            }
            GerberCommand::RegionEnd => match self.region.take() {
                Some(region) => {
                    if region.moves < 1 || region.draws < 2 {
                        self.violation(format!(
                            "region with {} move(s) and {} interpolation(s)",
                            region.moves, region.draws
                        ));
                    }
                    let at = region.start.unwrap_or_else(|| self.position());
                    self.report.operations.push(Operation {
                        kind: OperationKind::Region,
                        polarity: self.polarity,
                        aperture: None,
                        at,
                    });
                }
                None => self.violation("G37* without G36*".into()),
            },
            GerberCommand::Move { x, y } => {
                self.update(*x, *y);
                let at = self.position();
                if let Some(region) = self.region.as_mut() {
                    region.moves += 1;
                    region.start.get_or_insert(at);
                }
            }
            GerberCommand::Interpolate { x, y } => {
                self.update(*x, *y);
                match self.region.as_mut() {
                    Some(region) => region.draws += 1,
                    None => self.record(OperationKind::Draw),
                }
            }
            GerberCommand::Flash { x, y } => {
                self.update(*x, *y);
                if self.region.is_some() {
                    self.violation("D03 inside a region".into());
                }
                self.record(OperationKind::Flash);
            }
            GerberCommand::EndOfFile => {
                if self.region.is_some() {
                    self.violation("M02* inside an open region".into());
                }
                self.report.terminated = true;
            }
            GerberCommand::LinearMode
            | GerberCommand::Millimeters
            | GerberCommand::FileFunction(_)
            | GerberCommand::FilePolarity(_)
            | GerberCommand::SameCoordinates(_) => {}
        }
    }
}

/// Walk a parsed layer and report its geometry and any plotter-level errors.
pub fn interpret(commands: &[GerberCommand]) -> LayerReport {
    let mut interp = Interpreter::new();
    for cmd in commands {
        interp.process(cmd);
    }
    if !interp.report.terminated {
        interp.violation("missing M02*".into());
    }
    interp.report
}
