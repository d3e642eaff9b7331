//! Named risk presets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ScenarioError {
    #[error("unknown risk scenario '{0}' (expected conservative, neutral or aggressive)")]
    Unknown(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioName {
    Conservative,
    #[default]
    Neutral,
    Aggressive,
}

impl ScenarioName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Neutral => "neutral",
            Self::Aggressive => "aggressive",
        }
    }
}

impl fmt::Display for ScenarioName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScenarioName {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "neutral" => Ok(Self::Neutral),
            "aggressive" => Ok(Self::Aggressive),
            other => Err(ScenarioError::Unknown(other.to_string())),
        }
    }
}

/// Risk limits for one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskScenario {
    pub name: ScenarioName,
    /// Largest fraction of equity any new position may take.
    pub max_position_pct: f64,
    /// Drawdown from initial capital at which trading halts.
    pub max_drawdown: f64,
    /// Volatility index level above which sizing slows down.
    pub volatility_threshold: f64,
}

impl RiskScenario {
    pub fn preset(name: ScenarioName) -> Self {
        let (max_position_pct, max_drawdown, volatility_threshold) = match name {
            ScenarioName::Conservative => (0.05, 0.10, 20.0),
            ScenarioName::Neutral => (0.10, 0.15, 25.0),
            ScenarioName::Aggressive => (0.20, 0.25, 30.0),
        };
        Self {
            name,
            max_position_pct,
            max_drawdown,
            volatility_threshold,
        }
    }

    pub fn conservative() -> Self {
        Self::preset(ScenarioName::Conservative)
    }

    pub fn neutral() -> Self {
        Self::preset(ScenarioName::Neutral)
    }

    pub fn aggressive() -> Self {
        Self::preset(ScenarioName::Aggressive)
    }
}

impl Default for RiskScenario {
    fn default() -> Self {
        Self::neutral()
    }
}

impl FromStr for RiskScenario {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<ScenarioName>().map(Self::preset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_tighten_towards_conservative() {
        let c = RiskScenario::conservative();
        let n = RiskScenario::neutral();
        let a = RiskScenario::aggressive();
        assert!(c.max_position_pct < n.max_position_pct && n.max_position_pct < a.max_position_pct);
        assert!(c.max_drawdown < n.max_drawdown && n.max_drawdown < a.max_drawdown);
    }

    #[test]
    fn parse_is_case_insensitive() {
        let s: RiskScenario = "Aggressive".parse().unwrap();
        assert_eq!(s.name, ScenarioName::Aggressive);
        assert_eq!(
            "reckless".parse::<ScenarioName>(),
            Err(ScenarioError::Unknown("reckless".into()))
        );
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ScenarioName::Conservative).unwrap();
        assert_eq!(json, "\"conservative\"");
    }
}
