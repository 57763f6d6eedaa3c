use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use crate::error::GerberError;

use super::commands::ApertureTemplate;

/// First aperture code in a freshly started file.
pub const FRESH_APERTURE_BASE: u32 = 10;

/// First aperture code when appending to copied base content. High enough
/// to stay clear of whatever the base file already defines.
pub const CONTINUATION_APERTURE_BASE: u32 = 1000;

/// Tool shape, dimensions in millimeters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ApertureShape {
    Circle { diameter: f64 },
    Rectangle { x_size: f64, y_size: f64 },
}

impl ApertureShape {
    fn dimensions(&self) -> Vec<f64> {
        match *self {
            ApertureShape::Circle { diameter } => vec![diameter],
            ApertureShape::Rectangle { x_size, y_size } => vec![x_size, y_size],
        }
    }

    /// Reject dimensions a plotter cannot represent.
    pub fn validate(&self) -> Result<(), GerberError> {
        for d in self.dimensions() {
            if !d.is_finite() || d <= 0.0 {
                return Err(GerberError::InvalidAperture(format!(
                    "{self:?} has non-positive or non-finite dimension {d}"
                )));
            }
        }
        Ok(())
    }

    pub fn template(&self) -> ApertureTemplate {
        match *self {
            ApertureShape::Circle { diameter } => ApertureTemplate::Circle { diameter },
            ApertureShape::Rectangle { x_size, y_size } => {
                ApertureTemplate::Rectangle { x_size, y_size }
            }
        }
    }
}

/// Lookup key of the aperture table: shape plus optional `.AperFunction`.
///
/// Floats compare and hash by bit pattern, so only geometry written with
/// identical values shares an aperture.
#[derive(Debug, Clone)]
pub struct ApertureKey {
    pub shape: ApertureShape,
    pub function: Option<String>,
}

impl ApertureKey {
    pub fn circle(diameter: f64, function: Option<&str>) -> Self {
        Self {
            shape: ApertureShape::Circle { diameter },
            function: function.map(str::to_string),
        }
    }

    pub fn rectangle(x_size: f64, y_size: f64, function: Option<&str>) -> Self {
        Self {
            shape: ApertureShape::Rectangle { x_size, y_size },
            function: function.map(str::to_string),
        }
    }

    fn identity(&self) -> (u8, Vec<u64>, Option<&str>) {
        let kind = match self.shape {
            ApertureShape::Circle { .. } => 0,
            ApertureShape::Rectangle { .. } => 1,
        };
        let bits = self
            .shape
            .dimensions()
            .into_iter()
            .map(f64::to_bits)
            .collect();
        (kind, bits, self.function.as_deref())
    }
}

impl PartialEq for ApertureKey {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for ApertureKey {}

impl Hash for ApertureKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

/// Aperture codes issued for one output stream.
#[derive(Debug)]
pub struct ApertureTable {
    apertures: HashMap<ApertureKey, u32>,
    next_code: u32,
}

impl Default for ApertureTable {
    fn default() -> Self {
        Self::new(FRESH_APERTURE_BASE)
    }
}

impl ApertureTable {
    pub fn new(first_code: u32) -> Self {
        Self {
            apertures: HashMap::new(),
            next_code: first_code,
        }
    }

    pub fn next_code(&self) -> u32 {
        self.next_code
    }

    pub fn len(&self) -> usize {
        self.apertures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.apertures.is_empty()
    }

    pub fn get(&self, key: &ApertureKey) -> Option<u32> {
        self.apertures.get(key).copied()
    }

    /// Return the code for `key`, allocating the next free one on a miss.
    ///
    /// `define` runs only on a miss, with the fresh code, and is expected to
    /// write the definition. If it fails nothing is cached and the code is
    /// reused by the next allocation.
    pub fn resolve<F>(&mut self, key: &ApertureKey, define: F) -> Result<u32, GerberError>
    where
        F: FnOnce(u32) -> Result<(), GerberError>,
    {
        if let Some(code) = self.get(key) {
            return Ok(code);
        }
        let code = self.next_code;
        define(code)?;
        self.next_code += 1;
        self.apertures.insert(key.clone(), code);
        Ok(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_counting(table: &mut ApertureTable, key: &ApertureKey, defs: &mut Vec<u32>) -> u32 {
        table
            .resolve(key, |code| {
                defs.push(code);
                Ok(())
            })
            .unwrap()
    }

    #[test]
    fn test_equal_keys_share_one_definition() {
        let mut table = ApertureTable::default();
        let mut defs = Vec::new();
        let key = ApertureKey::circle(0.75, None);
        let a = resolve_counting(&mut table, &key, &mut defs);
        let b = resolve_counting(&mut table, &ApertureKey::circle(0.75, None), &mut defs);
        assert_eq!(a, b);
        assert_eq!(defs, vec![FRESH_APERTURE_BASE]);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_codes_increase_in_first_seen_order() {
        let mut table = ApertureTable::default();
        let mut defs = Vec::new();
        let keys = [
            ApertureKey::circle(0.5, None),
            ApertureKey::rectangle(2.24, 2.24, None),
            ApertureKey::circle(0.5, None),
            ApertureKey::circle(0.2, None),
            ApertureKey::rectangle(2.24, 2.24, None),
        ];
        let codes: Vec<u32> = keys
            .iter()
            .map(|k| resolve_counting(&mut table, k, &mut defs))
            .collect();
        assert_eq!(codes, vec![10, 11, 10, 12, 11]);
        assert_eq!(defs, vec![10, 11, 12]);
        assert_eq!(table.next_code(), 13);
    }

    #[test]
    fn test_function_tag_separates_apertures() {
        let mut table = ApertureTable::default();
        let mut defs = Vec::new();
        let plain = resolve_counting(&mut table, &ApertureKey::circle(0.3, None), &mut defs);
        let drill = resolve_counting(
            &mut table,
            &ApertureKey::circle(0.3, Some("ViaDrill")),
            &mut defs,
        );
        assert_ne!(plain, drill);
        assert_eq!(defs.len(), 2);
    }

    #[test]
    fn test_rectangle_orientation_matters() {
        assert_ne!(
            ApertureKey::rectangle(1.0, 2.0, None),
            ApertureKey::rectangle(2.0, 1.0, None)
        );
        assert_ne!(
            ApertureKey::circle(1.0, None),
            ApertureKey::rectangle(1.0, 1.0, None)
        );
    }

    #[test]
    fn test_continuation_base() {
        let mut table = ApertureTable::new(CONTINUATION_APERTURE_BASE);
        let code = table
            .resolve(&ApertureKey::circle(0.5, None), |_| Ok(()))
            .unwrap();
        assert_eq!(code, 1000);
    }

    #[test]
    fn test_failed_definition_is_not_cached() {
        let mut table = ApertureTable::default();
        let key = ApertureKey::circle(0.5, None);
        let err = table.resolve(&key, |_| Err(GerberError::Parse("boom".into())));
        assert!(err.is_err());
        assert!(table.get(&key).is_none());
        assert_eq!(table.resolve(&key, |_| Ok(())).unwrap(), FRESH_APERTURE_BASE);
    }

    #[test]
    fn test_validate() {
        assert!(ApertureShape::Circle { diameter: 0.3 }.validate().is_ok());
        assert!(ApertureShape::Circle { diameter: 0.0 }.validate().is_err());
        assert!(ApertureShape::Circle {
            diameter: f64::NAN
        }
        .validate()
        .is_err());
        assert!(ApertureShape::Rectangle {
            x_size: 1.0,
            y_size: -1.0
        }
        .validate()
        .is_err());
    }
}
