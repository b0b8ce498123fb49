//! Training configuration and its validation.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// The loss/regularization variant used by the solver.
///
/// Discriminants match the liblinear solver codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "SolverRepr")]
#[repr(i32)]
pub enum SolverType {
    /// L2-regularized logistic regression (primal).
    L2rLr = 0,
    /// L2-regularized L2-loss SVC (dual).
    L2rL2lossSvcDual = 1,
    /// L2-regularized L2-loss SVC (primal).
    L2rL2lossSvc = 2,
    /// L2-regularized L1-loss SVC (dual).
    L2rL1lossSvcDual = 3,
    /// Crammer and Singer multi-class SVC.
    McsvmCs = 4,
    /// L1-regularized L2-loss SVC.
    L1rL2lossSvc = 5,
    /// L1-regularized logistic regression.
    L1rLr = 6,
    /// L2-regularized logistic regression (dual).
    L2rLrDual = 7,
}

const SOLVER_TABLE: [(SolverType, &str); 8] = [
    (SolverType::L2rLr, "L2R_LR"),
    (SolverType::L2rL2lossSvcDual, "L2R_L2LOSS_SVC_DUAL"),
    (SolverType::L2rL2lossSvc, "L2R_L2LOSS_SVC"),
    (SolverType::L2rL1lossSvcDual, "L2R_L1LOSS_SVC_DUAL"),
    (SolverType::McsvmCs, "MCSVM_CS"),
    (SolverType::L1rL2lossSvc, "L1R_L2LOSS_SVC"),
    (SolverType::L1rLr, "L1R_LR"),
    (SolverType::L2rLrDual, "L2R_LR_DUAL"),
];

impl SolverType {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn from_code(code: i64) -> Option<Self> {
        SOLVER_TABLE
            .iter()
            .find(|(solver, _)| i64::from(solver.code()) == code)
            .map(|&(solver, _)| solver)
    }

    /// Name used in model files and configuration.
    pub fn as_str(self) -> &'static str {
        SOLVER_TABLE[self as usize].1
    }

    /// Whether the model produces probability estimates.
    pub fn is_logistic(self) -> bool {
        matches!(self, Self::L2rLr | Self::L1rLr | Self::L2rLrDual)
    }
}

impl fmt::Display for SolverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SolverType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SOLVER_TABLE
            .iter()
            .find(|(_, name)| name.eq_ignore_ascii_case(s))
            .map(|&(solver, _)| solver)
            .or_else(|| s.parse().ok().and_then(Self::from_code))
            .ok_or_else(|| Error::InvalidOption(format!("unknown solver type: {s}")))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SolverRepr {
    Code(i64),
    Name(String),
}

impl TryFrom<SolverRepr> for SolverType {
    type Error = Error;

    fn try_from(repr: SolverRepr) -> Result<Self> {
        match repr {
            SolverRepr::Code(code) => Self::from_code(code)
                .ok_or_else(|| Error::InvalidOption(format!("unknown solver code: {code}"))),
            SolverRepr::Name(name) => name.parse(),
        }
    }
}

pub const DEFAULT_C: f64 = 1.0;
pub const DEFAULT_EPS: f64 = 0.01;

const RECOGNIZED_OPTIONS: [&str; 4] = ["c", "solver", "eps", "weights"];

/// Validated training configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub solver_type: SolverType,
    /// Regularization cost.
    pub c: f64,
    /// Stopping tolerance.
    pub eps: f64,
    /// Per-label multipliers of `c`. Labels not listed use 1.
    pub weights: BTreeMap<i32, f64>,
}

#[derive(Deserialize)]
struct Options {
    solver: SolverType,
    #[serde(default = "default_c")]
    c: f64,
    #[serde(default = "default_eps")]
    eps: f64,
    #[serde(default)]
    weights: BTreeMap<i32, f64>,
}

fn default_c() -> f64 {
    DEFAULT_C
}

fn default_eps() -> f64 {
    DEFAULT_EPS
}

impl Parameter {
    pub fn new(solver_type: SolverType) -> Self {
        Self {
            solver_type,
            c: DEFAULT_C,
            eps: DEFAULT_EPS,
            weights: BTreeMap::new(),
        }
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_eps(mut self, eps: f64) -> Self {
        self.eps = eps;
        self
    }

    pub fn with_weight(mut self, label: i32, weight: f64) -> Self {
        self.weights.insert(label, weight);
        self
    }

    /// Validates a JSON option object, see [`validate`].
    pub fn from_json(json: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(options)) => validate(&options),
            Ok(_) => Err(Error::InvalidOption("options must be an object".into())),
            Err(err) => Err(Error::InvalidOption(err.to_string())),
        }
    }

    /// Cost multiplier for `label`.
    pub fn weight_for(&self, label: i32) -> f64 {
        self.weights.get(&label).copied().unwrap_or(1.0)
    }

    /// Rejects values the solver cannot work with.
    pub fn check(&self) -> Result<()> {
        if !(self.c > 0.0) {
            return Err(Error::InvalidOption(format!("c must be positive, got {}", self.c)));
        }
        if !(self.eps > 0.0) {
            return Err(Error::InvalidOption(format!("eps must be positive, got {}", self.eps)));
        }
        if let Some((label, weight)) = self.weights.iter().find(|(_, &w)| !(w > 0.0)) {
            return Err(Error::InvalidOption(format!(
                "weight for label {label} must be positive, got {weight}"
            )));
        }
        Ok(())
    }
}

/// Turns an option mapping into a [`Parameter`].
///
/// Accepts exactly the keys `solver` (required), `c`, `eps` and `weights`.
/// Missing keys other than `solver` take their defaults.
pub fn validate(options: &Map<String, Value>) -> Result<Parameter> {
    let mut unknown: Vec<String> = options
        .keys()
        .filter(|key| !RECOGNIZED_OPTIONS.contains(&key.as_str()))
        .cloned()
        .collect();
    if !unknown.is_empty() {
        unknown.sort();
        return Err(Error::UnknownOptions(unknown));
    }
    if !options.contains_key("solver") {
        return Err(Error::MissingSolver);
    }

    let options: Options = serde_json::from_value(Value::Object(options.clone()))
        .map_err(|err| Error::InvalidOption(err.to_string()))?;
    let parameter = Parameter {
        solver_type: options.solver,
        c: options.c,
        eps: options.eps,
        weights: options.weights,
    };
    parameter.check()?;
    Ok(parameter)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use serde_json::json;

    use super::*;

    fn options(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn applies_defaults() {
        let parameter = validate(&options(json!({ "solver": "L1R_L2LOSS_SVC" }))).unwrap();
        assert_eq!(parameter.solver_type, SolverType::L1rL2lossSvc);
        assert_eq!(parameter.c, 1.0);
        assert_eq!(parameter.eps, 0.01);
        assert!(parameter.weights.is_empty());
        assert_eq!(parameter, Parameter::new(SolverType::L1rL2lossSvc));
    }

    #[test]
    fn reads_all_recognized_options() {
        let parameter = validate(&options(json!({
            "solver": 5,
            "c": 4.0,
            "eps": 0.1,
            "weights": { "1": 2.0, "-1": 0.5 }
        })))
        .unwrap();
        assert_eq!(parameter.solver_type, SolverType::L1rL2lossSvc);
        assert_eq!(parameter.c, 4.0);
        assert_eq!(parameter.eps, 0.1);
        assert_eq!(parameter.weight_for(1), 2.0);
        assert_eq!(parameter.weight_for(-1), 0.5);
        assert_eq!(parameter.weight_for(7), 1.0);
    }

    #[test]
    fn unknown_options_are_named() {
        let err = validate(&options(json!({
            "solver": "L2R_LR",
            "bogus": true,
            "another": 1
        })))
        .unwrap_err();
        assert!(err.is_configuration());
        match err {
            Error::UnknownOptions(keys) => assert_eq!(keys, vec!["another", "bogus"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn solver_is_required() {
        let err = validate(&options(json!({ "c": 2.0 }))).unwrap_err();
        assert!(matches!(err, Error::MissingSolver));
        assert!(err.is_configuration());
    }

    #[rstest]
    #[case(json!({ "solver": "NOPE" }))]
    #[case(json!({ "solver": 12 }))]
    #[case(json!({ "solver": "L2R_LR", "c": 0 }))]
    #[case(json!({ "solver": "L2R_LR", "eps": -1.0 }))]
    #[case(json!({ "solver": "L2R_LR", "c": "high" }))]
    #[case(json!({ "solver": "L2R_LR", "weights": { "1": 0.0 } }))]
    fn rejects_invalid_values(#[case] value: Value) {
        let err = validate(&options(value)).unwrap_err();
        assert!(matches!(err, Error::InvalidOption(_)), "{err}");
        assert!(err.is_configuration());
    }

    #[test]
    fn from_json_parses_objects_only() {
        let parameter = Parameter::from_json(r#"{"solver": "l2r_lr_dual", "c": 0.5}"#).unwrap();
        assert_eq!(parameter.solver_type, SolverType::L2rLrDual);
        assert_eq!(parameter.c, 0.5);
        assert!(Parameter::from_json("[1, 2]").is_err());
        assert!(Parameter::from_json(r#"{"solver": "L2R_LR", "bogus": 1}"#)
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn solver_names_round_trip() {
        for code in 0..8 {
            let solver = SolverType::from_code(code).unwrap();
            assert_eq!(solver.code() as i64, code);
            assert_eq!(solver.as_str().parse::<SolverType>().unwrap(), solver);
        }
        assert!(SolverType::from_code(8).is_none());
        assert!(SolverType::L1rLr.is_logistic());
        assert!(!SolverType::McsvmCs.is_logistic());
    }
}
