//! Validation errors raised while building cities and agents from configuration.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("degenerate bounds: lower-left ({lx}, {ly}) must be strictly below upper-right ({ux}, {uy})")]
    DegenerateBounds { lx: f32, ly: f32, ux: f32, uy: f32 },

    #[error("invalid parameter `{name}` = {value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("agent at ({x}, {y}) starts outside its city")]
    AgentOutsideBounds { x: f32, y: f32 },

    #[error("agent radius {radius} does not fit inside a {width} x {height} city")]
    AgentDoesNotFit { radius: f32, width: f32, height: f32 },
}

impl ConfigError {
    pub(crate) fn param(name: &'static str, value: impl Into<f64>, reason: &'static str) -> Self {
        ConfigError::InvalidParameter { name, value: value.into(), reason }
    }
}
