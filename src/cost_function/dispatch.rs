//! Name-driven construction of cost functions.
//!
//! `CostFunction` wraps either kind of cost function so that configuration
//! code can build them by name and check their kind at runtime.

use std::fmt;
use std::sync::Arc;

use super::brownian::BrownianLinkCost;
use super::diagonal::{FixedDiagCost, PenaltyDiagCost, DEFAULT_PENALTY};
use super::gap_close::GapCloseLinkCost;
use super::traits::{DiagCostFunction, LinkCostFunction};
use crate::config::CostFunctionSpec;
use crate::{Error, Result};

/// Default coordinate columns.
pub const DEFAULT_COORDS: [&str; 3] = ["x", "y", "z"];

/// The two kinds of cost functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostFunctionKind {
    /// Pairwise, fills a link block
    Link,
    /// Per spot, fills a birth or death block
    Diag,
}

impl fmt::Display for CostFunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CostFunctionKind::Link => write!(f, "link"),
            CostFunctionKind::Diag => write!(f, "diagonal"),
        }
    }
}

/// A cost function of either kind.
#[derive(Clone)]
pub enum CostFunction {
    Link(Arc<dyn LinkCostFunction>),
    Diag(Arc<dyn DiagCostFunction>),
}

impl CostFunction {
    pub fn name(&self) -> &str {
        match self {
            CostFunction::Link(f) => f.name(),
            CostFunction::Diag(f) => f.name(),
        }
    }

    pub fn kind(&self) -> CostFunctionKind {
        match self {
            CostFunction::Link(_) => CostFunctionKind::Link,
            CostFunction::Diag(_) => CostFunctionKind::Diag,
        }
    }

    /// The link cost function, or `Error::CostFunctionType`.
    pub fn into_link(self) -> Result<Arc<dyn LinkCostFunction>> {
        match self {
            CostFunction::Link(f) => Ok(f),
            other => Err(Error::CostFunctionType {
                name: other.name().to_string(),
                expected: CostFunctionKind::Link,
            }),
        }
    }

    /// The diagonal cost function, or `Error::CostFunctionType`.
    pub fn into_diag(self) -> Result<Arc<dyn DiagCostFunction>> {
        match self {
            CostFunction::Diag(f) => Ok(f),
            other => Err(Error::CostFunctionType {
                name: other.name().to_string(),
                expected: CostFunctionKind::Diag,
            }),
        }
    }
}

impl fmt::Debug for CostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CostFunction::{:?}({})", self.kind(), self.name())
    }
}

/// Build a cost function from its configuration.
///
/// Supported names:
/// - "brownian" - squared displacement, needs `max_speed`
/// - "gap_close" - constant-velocity residual, optional `max_speed`
/// - "penalty" - seed times `penalty` (default 1.05)
/// - "fixed" - constant, needs `cost`
///
/// `coords` defaults to `["x", "y", "z"]`.
pub fn cost_function_by_name(spec: &CostFunctionSpec) -> Result<CostFunction> {
    let coords: Vec<String> = match &spec.coords {
        Some(coords) => coords.clone(),
        None => DEFAULT_COORDS.iter().map(|c| c.to_string()).collect(),
    };
    let required = |value: Option<f64>, field: &str| {
        value.ok_or_else(|| Error::InvalidConfig(format!("cost function '{}' needs '{}'", spec.name, field)))
    };

    match spec.name.as_str() {
        "brownian" => {
            let max_speed = required(spec.max_speed, "max_speed")?;
            Ok(CostFunction::Link(Arc::new(BrownianLinkCost::new(&coords, max_speed))))
        }
        "gap_close" => Ok(CostFunction::Link(Arc::new(GapCloseLinkCost::new(
            &coords,
            spec.max_speed,
        )))),
        "penalty" => Ok(CostFunction::Diag(Arc::new(PenaltyDiagCost::new(
            spec.penalty.unwrap_or(DEFAULT_PENALTY),
        )))),
        "fixed" => {
            let cost = required(spec.cost, "cost")?;
            Ok(CostFunction::Diag(Arc::new(FixedDiagCost::new(cost))))
        }
        _ => Err(Error::UnknownCostFunction(spec.name.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> CostFunctionSpec {
        CostFunctionSpec::new(name)
    }

    #[test]
    fn test_by_name_kinds() {
        let brownian = cost_function_by_name(&CostFunctionSpec {
            max_speed: Some(3.0),
            ..spec("brownian")
        })
        .unwrap();
        assert_eq!(brownian.kind(), CostFunctionKind::Link);
        assert_eq!(brownian.name(), "brownian");

        assert_eq!(cost_function_by_name(&spec("gap_close")).unwrap().kind(), CostFunctionKind::Link);
        assert_eq!(cost_function_by_name(&spec("penalty")).unwrap().kind(), CostFunctionKind::Diag);

        let fixed = cost_function_by_name(&CostFunctionSpec {
            cost: Some(2.0),
            ..spec("fixed")
        })
        .unwrap();
        assert_eq!(fixed.name(), "fixed");
    }

    #[test]
    fn test_by_name_missing_parameter() {
        assert!(matches!(
            cost_function_by_name(&spec("brownian")),
            Err(Error::InvalidConfig(_))
        ));
        assert!(matches!(cost_function_by_name(&spec("fixed")), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_by_name_unknown() {
        assert!(matches!(
            cost_function_by_name(&spec("kalman")),
            Err(Error::UnknownCostFunction(name)) if name == "kalman"
        ));
    }

    #[test]
    fn test_into_wrong_kind() {
        let penalty = cost_function_by_name(&spec("penalty")).unwrap();
        match penalty.into_link() {
            Err(Error::CostFunctionType { name, expected }) => {
                assert_eq!(name, "penalty");
                assert_eq!(expected, CostFunctionKind::Link);
            }
            other => panic!("unexpected result {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(CostFunctionKind::Link.to_string(), "link");
        assert_eq!(CostFunctionKind::Diag.to_string(), "diagonal");
    }
}
