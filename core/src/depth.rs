//! Depth parameterizations for landmark depth estimation
//!
//! The filter never stores metric depth directly. Each landmark slot carries a scalar
//! parameter `p` and a [DepthMap] converts it into metric depth `d` together with the
//! derivatives needed to propagate uncertainty through the nonlinear parameterization:
//!
//! $$
//! p \mapsto \left( d, \frac{\partial d}{\partial p}, \frac{\partial p}{\partial d}, \frac{\partial}{\partial p}\frac{\partial p}{\partial d} \right)
//! $$
//!
//! | Type       | p          | d          | d_p        | p_d               | p_d_p                      |
//! |------------|------------|------------|------------|-------------------|----------------------------|
//! | Regular    | d          | p          | 1          | 1                 | 0                          |
//! | Inverse    | 1/d        | 1/p        | -d²        | -p²               | -2p                        |
//! | Log        | ln(d)      | exp(p)     | exp(p)     | 1/d               | -d_p/d²                    |
//! | Hyperbolic | asinh(d)   | sinh(p)    | cosh(p)    | 1/√(d²+1)         | -d·d_p/(d²+1)^1.5          |
//!
//! Inverse depth is clamped away from zero (see [INVERSE_DEPTH_FLOOR]) so that the map stays
//! finite for points at or beyond the horizon.

use std::convert::TryFrom;
use std::fmt::{self, Display};

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Smallest magnitude an inverse depth parameter is allowed to take.
pub const INVERSE_DEPTH_FLOOR: f64 = 1e-6;

/// Selects which scalar transform maps the internal depth parameter to metric depth.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepthType {
    /// Regular depth, p = d
    #[default]
    Regular,
    /// Inverse depth, p = 1/d
    Inverse,
    /// Logarithmic depth, p = ln(d)
    Log,
    /// Hyperbolic depth, p = asinh(d)
    Hyperbolic,
}
impl DepthType {
    /// Integer selector of this type as used in configuration files.
    pub fn as_int(&self) -> i32 {
        match self {
            DepthType::Regular => 0,
            DepthType::Inverse => 1,
            DepthType::Log => 2,
            DepthType::Hyperbolic => 3,
        }
    }
}
impl TryFrom<i32> for DepthType {
    type Error = ConfigError;
    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DepthType::Regular),
            1 => Ok(DepthType::Inverse),
            2 => Ok(DepthType::Log),
            3 => Ok(DepthType::Hyperbolic),
            other => Err(ConfigError::InvalidDepthType(other)),
        }
    }
}
impl Display for DepthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DepthType::Regular => "regular",
            DepthType::Inverse => "inverse",
            DepthType::Log => "log",
            DepthType::Hyperbolic => "hyperbolic",
        };
        write!(f, "{}", name)
    }
}

/// Output of [DepthMap::map]: metric depth and the derivatives of the parameterization.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DepthMapping {
    /// Metric depth d
    pub depth: f64,
    /// d derived w.r.t. p
    pub depth_p: f64,
    /// p derived w.r.t. d
    pub p_depth: f64,
    /// p_depth derived w.r.t. p
    pub p_depth_p: f64,
}

/// Depth parameterization strategy. Holds only the selected [DepthType].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthMap {
    depth_type: DepthType,
}
impl DepthMap {
    pub fn new(depth_type: DepthType) -> DepthMap {
        DepthMap { depth_type }
    }
    pub fn get_type(&self) -> DepthType {
        self.depth_type
    }
    pub fn set_type(&mut self, depth_type: DepthType) {
        self.depth_type = depth_type;
    }
    /// Set the depth type from its integer selector.
    ///
    /// Selectors outside `0..=3` are a configuration error. They are logged and the map
    /// falls back to [DepthType::Regular] so that a running estimator is never aborted.
    pub fn set_type_from_int(&mut self, selector: i32) {
        self.depth_type = DepthType::try_from(selector).unwrap_or_else(|e| {
            warn!("{}, falling back to regular depth", e);
            DepthType::Regular
        });
    }
    /// Computes depth and parameterization derivatives for the parameter `p`.
    ///
    /// # Arguments
    /// * `p` - Parameter value, interpreted according to the selected [DepthType].
    ///
    /// # Returns
    /// The metric depth together with `d_p`, `p_d` and `p_d_p`.
    pub fn map(&self, p: f64) -> DepthMapping {
        match self.depth_type {
            DepthType::Regular => map_regular(p),
            DepthType::Inverse => map_inverse(p),
            DepthType::Log => map_log(p),
            DepthType::Hyperbolic => map_hyperbolic(p),
        }
    }
    /// Metric depth only, see [DepthMap::map].
    pub fn depth(&self, p: f64) -> f64 {
        self.map(p).depth
    }
    /// Inverse of the map: the parameter value that represents the metric depth `d`.
    pub fn parameter_from_depth(&self, d: f64) -> f64 {
        match self.depth_type {
            DepthType::Regular => d,
            DepthType::Inverse => 1.0 / clamp_away_from_zero(d),
            DepthType::Log => d.ln(),
            DepthType::Hyperbolic => d.asinh(),
        }
    }
}

fn clamp_away_from_zero(value: f64) -> f64 {
    if value.abs() < INVERSE_DEPTH_FLOOR {
        if value >= 0.0 {
            INVERSE_DEPTH_FLOOR
        } else {
            -INVERSE_DEPTH_FLOOR
        }
    } else {
        value
    }
}

/// Regular depth, p = d.
pub fn map_regular(p: f64) -> DepthMapping {
    DepthMapping {
        depth: p,
        depth_p: 1.0,
        p_depth: 1.0,
        p_depth_p: 0.0,
    }
}
/// Inverse depth, p = 1/d. `|p|` is clamped to [INVERSE_DEPTH_FLOOR] preserving sign.
pub fn map_inverse(p: f64) -> DepthMapping {
    let p = clamp_away_from_zero(p);
    let depth = 1.0 / p;
    DepthMapping {
        depth,
        depth_p: -depth * depth,
        p_depth: -p * p,
        p_depth_p: -2.0 * p,
    }
}
/// Logarithmic depth, p = ln(d).
pub fn map_log(p: f64) -> DepthMapping {
    let depth = p.exp();
    let depth_p = p.exp();
    DepthMapping {
        depth,
        depth_p,
        p_depth: 1.0 / depth,
        p_depth_p: -depth_p / depth.powi(2),
    }
}
/// Hyperbolic depth, p = asinh(d).
pub fn map_hyperbolic(p: f64) -> DepthMapping {
    let depth = p.sinh();
    let depth_p = p.cosh();
    let radicand = depth.powi(2) + 1.0;
    DepthMapping {
        depth,
        depth_p,
        p_depth: 1.0 / radicand.sqrt(),
        p_depth_p: -depth / radicand.powf(1.5) * depth_p,
    }
}
