use std::ops::{Add, Sub};

/// A point or offset in board millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector {
    pub x: f64,
    pub y: f64,
}

pub const fn vector(x: f64, y: f64) -> Vector {
    Vector { x, y }
}

impl Vector {
    pub fn minus(self, other: Vector) -> Vector {
        vector(self.x - other.x, self.y - other.y)
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }

    /// Rotate counter-clockwise about the origin.
    pub fn rotate(self, degrees: f64) -> Vector {
        let (sin, cos) = degrees.to_radians().sin_cos();
        vector(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }
}

impl Add for Vector {
    type Output = Vector;

    fn add(self, rhs: Vector) -> Vector {
        vector(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector {
    type Output = Vector;

    fn sub(self, rhs: Vector) -> Vector {
        self.minus(rhs)
    }
}
