use crate::error::ConfigError;
use crate::vecmath::Vec2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle a city's agents are confined to. Immutable once built.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    lower_left: Vec2,
    upper_right: Vec2,
}

impl Bounds {
    /// Creates a rectangle, rejecting non-finite corners or a lower corner that is
    /// not strictly below the upper one on both axes.
    pub fn new(lower_left: Vec2, upper_right: Vec2) -> Result<Self, ConfigError> {
        let ordered = lower_left.x < upper_right.x && lower_left.y < upper_right.y;
        if !lower_left.is_finite() || !upper_right.is_finite() || !ordered {
            return Err(ConfigError::DegenerateBounds {
                lx: lower_left.x,
                ly: lower_left.y,
                ux: upper_right.x,
                uy: upper_right.y,
            });
        }
        Ok(Bounds { lower_left, upper_right })
    }

    /// Square of side `size` centered on `center`.
    pub fn centered(center: Vec2, size: f32) -> Result<Self, ConfigError> {
        let half = Vec2::new(size / 2.0, size / 2.0);
        Self::new(center - half, center + half)
    }

    pub fn lower_left(&self) -> Vec2 {
        self.lower_left
    }

    pub fn upper_right(&self) -> Vec2 {
        self.upper_right
    }

    #[inline(always)]
    pub fn lower(&self, axis: usize) -> f32 {
        self.lower_left.axis(axis)
    }

    #[inline(always)]
    pub fn upper(&self, axis: usize) -> f32 {
        self.upper_right.axis(axis)
    }

    pub fn width(&self) -> f32 {
        self.upper_right.x - self.lower_left.x
    }

    pub fn height(&self) -> f32 {
        self.upper_right.y - self.lower_left.y
    }

    pub fn center(&self) -> Vec2 {
        (self.lower_left + self.upper_right).scale(0.5)
    }

    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.lower_left.x
            && point.x <= self.upper_right.x
            && point.y >= self.lower_left.y
            && point.y <= self.upper_right.y
    }

    /// Whether an agent of this radius has room to move (the hard floor of one wall
    /// stays strictly below the hard ceiling of the opposite one).
    pub fn fits(&self, radius: f32) -> bool {
        radius < self.width() && radius < self.height()
    }

    /// Checks [`Bounds::fits`], reporting the offending sizes on failure.
    pub fn check_fits(&self, radius: f32) -> Result<(), ConfigError> {
        if self.fits(radius) {
            Ok(())
        } else {
            Err(ConfigError::AgentDoesNotFit {
                radius,
                width: self.width(),
                height: self.height(),
            })
        }
    }

    /// Uniformly random point inside the rectangle.
    pub fn sample_point<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec2 {
        Vec2::new(
            rng.random_range(self.lower_left.x..self.upper_right.x),
            rng.random_range(self.lower_left.y..self.upper_right.y),
        )
    }
}
