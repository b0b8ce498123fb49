use std::path::Path;

use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::l1r_l2loss_svc::L1rL2lossSvcSolver;
use crate::model_io;
use crate::parameter::{Parameter, SolverType};
use crate::problem::Problem;
use crate::sample::{Feature, Sample};
use crate::solver::{BinaryProblem, Sign, Solver};

/// Trained linear classifier.
///
/// Weights are stored feature-major, class-minor: the weight of feature
/// `index` for weight vector `k` is `weights[(index - 1) * nr_w + k]`. When
/// `bias >= 0` one extra row at index `feature_count + 1` holds the bias
/// weights.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    solver_type: SolverType,
    labels: Vec<i32>,
    feature_count: usize,
    bias: f64,
    weights: Vec<f64>,
}

impl Model {
    /// Trains with the bundled solver for `param.solver_type`.
    pub fn train(problem: &Problem, param: &Parameter) -> Result<Self> {
        param.check()?;
        let solver = L1rL2lossSvcSolver::from_parameter(param)?;
        Self::train_with(&solver, problem, param)
    }

    /// Trains one-vs-rest with `solver`.
    ///
    /// Labels are ordered by first appearance in the problem. Two classes
    /// share a single weight vector with the first label as the positive
    /// class.
    pub fn train_with<S>(solver: &S, problem: &Problem, param: &Parameter) -> Result<Self>
    where
        S: Solver + ?Sized,
    {
        param.check()?;
        let y = problem.labels()?;
        if y.is_empty() {
            return Err(Error::EmptyProblem);
        }
        let n = problem.n()?;
        let bias = problem.bias()?;
        let rows: Vec<&[Feature]> = problem.feature_vectors()?.collect();

        let labels = group_classes(y);
        for label in param.weights.keys() {
            if !labels.contains(label) {
                warn!(label, "class weight given for a label not found in the data");
            }
        }
        let weighted_c: Vec<f64> = labels
            .iter()
            .map(|&label| param.c * param.weight_for(label))
            .collect();

        let nr_class = labels.len();
        let nr_w = weight_vector_count(param.solver_type, nr_class);
        info!(
            l = y.len(),
            n,
            nr_class,
            solver = %param.solver_type,
            "training model"
        );

        let signs_for = |positive: i32| -> Vec<Sign> {
            y.iter()
                .map(|&label| {
                    if label == positive {
                        Sign::Positive
                    } else {
                        Sign::Negative
                    }
                })
                .collect()
        };

        let mut weights = vec![0.0; n * nr_w];
        if nr_class == 2 && nr_w == 1 {
            let binary = BinaryProblem::new(&rows, signs_for(labels[0]), n);
            weights = solver.solve(&binary, weighted_c[0], weighted_c[1]);
        } else {
            for (k, &label) in labels.iter().enumerate() {
                let binary = BinaryProblem::new(&rows, signs_for(label), n);
                let w = solver.solve(&binary, weighted_c[k], param.c);
                for (j, value) in w.into_iter().take(n).enumerate() {
                    weights[j * nr_w + k] = value;
                }
            }
        }

        let feature_count = if bias >= 0.0 { n - 1 } else { n };
        Self::from_parts(param.solver_type, labels, feature_count, bias, weights)
    }

    /// Assembles a model from raw solver output, checking the weight count.
    pub fn from_parts(
        solver_type: SolverType,
        labels: Vec<i32>,
        feature_count: usize,
        bias: f64,
        weights: Vec<f64>,
    ) -> Result<Self> {
        if labels.is_empty() {
            return Err(Error::ModelFormat("model has no classes".into()));
        }
        let expected = feature_count
            .checked_add(usize::from(bias >= 0.0))
            .and_then(|rows| rows.checked_mul(weight_vector_count(solver_type, labels.len())))
            .ok_or_else(|| {
                Error::ModelFormat(format!("feature count {feature_count} is too large"))
            })?;
        if weights.len() != expected {
            return Err(Error::ModelFormat(format!(
                "expected {expected} weights, got {}",
                weights.len()
            )));
        }
        Ok(Self {
            solver_type,
            labels,
            feature_count,
            bias,
            weights,
        })
    }

    /// Loads a model saved in the liblinear text format.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        model_io::load_model(path.as_ref())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        model_io::save_model(path.as_ref(), self)
    }

    pub fn solver_type(&self) -> SolverType {
        self.solver_type
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn class_count(&self) -> usize {
        self.labels.len()
    }

    pub fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Class labels in the order the solver assigned them.
    pub fn labels(&self) -> &[i32] {
        &self.labels
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Number of weight vectors: one for two-class models, otherwise one per
    /// class.
    pub fn nr_w(&self) -> usize {
        weight_vector_count(self.solver_type, self.labels.len())
    }

    /// Weight of feature `index` (1-based) in weight vector `k`. The bias
    /// weight sits at `feature_count + 1`.
    pub fn weight(&self, index: u32, k: usize) -> Option<f64> {
        let nr_w = self.nr_w();
        if index == 0 || k >= nr_w {
            return None;
        }
        self.weights.get((index as usize - 1) * nr_w + k).copied()
    }

    /// Raw score of every weight vector for `sample`.
    ///
    /// Features above `feature_count` are ignored; the bias feature is
    /// added the same way training data was built.
    pub fn decision_values(&self, sample: &Sample) -> Vec<f64> {
        let nr_w = self.nr_w();
        let mut values = vec![0.0; nr_w];
        for feat in sample.iter() {
            let index = feat.index as usize;
            if index > self.feature_count {
                continue;
            }
            let row = &self.weights[(index - 1) * nr_w..index * nr_w];
            for (value, w) in values.iter_mut().zip(row) {
                *value += w * feat.value;
            }
        }
        if self.bias >= 0.0 {
            let start = self.feature_count * nr_w;
            let row = &self.weights[start..start + nr_w];
            for (value, w) in values.iter_mut().zip(row) {
                *value += w * self.bias;
            }
        }
        values
    }

    /// Predicted label for `sample`. Ties go to the earliest class in
    /// [`Model::labels`] order.
    pub fn predict(&self, sample: &Sample) -> i32 {
        let values = self.decision_values(sample);
        if self.labels.len() == 2 && values.len() == 1 {
            return if values[0] > 0.0 {
                self.labels[0]
            } else {
                self.labels[1]
            };
        }
        let mut best = 0;
        for (k, &value) in values.iter().enumerate().skip(1) {
            if value > values[best] {
                best = k;
            }
        }
        self.labels[best]
    }

    /// Class probabilities in [`Model::labels`] order. Only logistic
    /// regression models support this.
    pub fn predict_probability(&self, sample: &Sample) -> Result<Vec<f64>> {
        if !self.solver_type.is_logistic() {
            return Err(Error::NotProbabilistic(self.solver_type));
        }
        let mut probs: Vec<f64> = self
            .decision_values(sample)
            .into_iter()
            .map(|value| 1.0 / (1.0 + (-value).exp()))
            .collect();
        if self.labels.len() == 2 {
            probs.push(1.0 - probs[0]);
        } else {
            let sum: f64 = probs.iter().sum();
            for p in &mut probs {
                *p /= sum;
            }
        }
        Ok(probs)
    }
}

fn weight_vector_count(solver_type: SolverType, nr_class: usize) -> usize {
    if nr_class == 2 && solver_type != SolverType::McsvmCs {
        1
    } else {
        nr_class
    }
}

/// Distinct labels in order of first appearance.
fn group_classes(y: &[i32]) -> Vec<i32> {
    let mut labels = Vec::new();
    for &label in y {
        if !labels.contains(&label) {
            labels.push(label);
        }
    }
    labels
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn sample(pairs: &[(u32, f64)]) -> Sample {
        Sample::from_pairs(pairs.iter().copied()).unwrap()
    }

    fn binary_model() -> Model {
        Model::from_parts(SolverType::L2rLr, vec![1, -1], 2, -1.0, vec![1.0, -1.0]).unwrap()
    }

    fn three_class_model() -> Model {
        #[rustfmt::skip]
        let weights = vec![
            1.0, 0.0, 0.0,
            0.0, 1.0, 0.0,
            0.0, 0.0, 1.0,
            0.5, 0.0, -0.25,
        ];
        Model::from_parts(SolverType::L1rL2lossSvc, vec![3, 1, 2], 3, 1.0, weights).unwrap()
    }

    #[test]
    fn binary_models_use_the_sign() {
        let model = binary_model();
        assert_eq!(model.nr_w(), 1);
        assert_eq!(model.predict(&sample(&[(1, 1.0)])), 1);
        assert_eq!(model.predict(&sample(&[(2, 1.0)])), -1);
        assert_eq!(model.predict(&Sample::new()), -1);
    }

    #[test]
    fn multiclass_takes_the_argmax() {
        let model = three_class_model();
        assert_eq!(model.class_count(), 3);
        assert_eq!(model.feature_count(), 3);
        assert_eq!(model.predict(&sample(&[(1, 1.0)])), 3);
        assert_eq!(model.predict(&sample(&[(2, 2.0)])), 1);
        assert_eq!(model.predict(&sample(&[(3, 2.0)])), 2);
    }

    #[test]
    fn ties_go_to_the_first_label() {
        let model = three_class_model();
        // 0.5 + 0.5 for label 3 against 1.0 for label 1
        assert_eq!(model.decision_values(&sample(&[(1, 0.5), (2, 1.0)]))[..2], [1.0, 1.0]);
        assert_eq!(model.predict(&sample(&[(1, 0.5), (2, 1.0)])), 3);
    }

    #[test]
    fn bias_is_added_and_high_indices_ignored() {
        let model = three_class_model();
        let values = model.decision_values(&sample(&[(2, 0.25), (4, 100.0), (9, 3.0)]));
        assert_eq!(values, vec![0.5, 0.25, -0.25]);
        assert_eq!(model.predict(&sample(&[(2, 0.25)])), 3);
    }

    #[test]
    fn weight_lookup() {
        let model = three_class_model();
        assert_eq!(model.weight(2, 1), Some(1.0));
        assert_eq!(model.weight(4, 2), Some(-0.25));
        assert_eq!(model.weight(0, 0), None);
        assert_eq!(model.weight(5, 0), None);
        assert_eq!(model.weight(1, 3), None);
    }

    #[test]
    fn rejects_wrong_weight_count() {
        let err = Model::from_parts(SolverType::L2rLr, vec![1, 2, 3], 2, 1.0, vec![0.0; 6])
            .unwrap_err();
        assert!(matches!(err, Error::ModelFormat(_)));
        assert!(Model::from_parts(SolverType::L2rLr, vec![], 0, -1.0, vec![]).is_err());
        let err = Model::from_parts(SolverType::L2rLr, vec![1, 2, 3], usize::MAX, 1.0, vec![])
            .unwrap_err();
        assert!(matches!(err, Error::ModelFormat(_)));
    }

    #[test]
    fn mcsvm_keeps_one_vector_per_class() {
        let model =
            Model::from_parts(SolverType::McsvmCs, vec![1, 2], 1, -1.0, vec![0.5, 1.5]).unwrap();
        assert_eq!(model.nr_w(), 2);
        assert_eq!(model.predict(&sample(&[(1, 1.0)])), 2);
    }

    #[test]
    fn probabilities_for_logistic_models() {
        let model = binary_model();
        let probs = model.predict_probability(&sample(&[(1, 2.0)])).unwrap();
        assert_eq!(probs.len(), 2);
        assert_relative_eq!(probs[0], 1.0 / (1.0 + (-2.0f64).exp()));
        assert_relative_eq!(probs[0] + probs[1], 1.0);

        let err = three_class_model()
            .predict_probability(&Sample::new())
            .unwrap_err();
        assert!(matches!(err, Error::NotProbabilistic(SolverType::L1rL2lossSvc)));
    }

    #[test]
    fn multiclass_probabilities_are_normalized() {
        let model = Model::from_parts(
            SolverType::L2rLrDual,
            vec![1, 2, 3],
            1,
            -1.0,
            vec![1.0, 0.0, -1.0],
        )
        .unwrap();
        let probs = model.predict_probability(&sample(&[(1, 1.0)])).unwrap();
        assert_relative_eq!(probs.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(probs[0] > probs[1] && probs[1] > probs[2]);
    }

    #[test]
    fn groups_labels_by_first_appearance() {
        assert_eq!(group_classes(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }

    #[test]
    fn training_requires_a_live_problem() {
        let samples = vec![sample(&[(1, 1.0)]), sample(&[(2, 1.0)])];
        let mut problem = Problem::new(vec![1, 2], samples, 1.0, 2).unwrap();
        problem.destroy().unwrap();
        let param = Parameter::new(SolverType::L1rL2lossSvc);
        assert!(matches!(Model::train(&problem, &param), Err(Error::UseAfterRelease)));
    }

    #[test]
    fn training_rejects_empty_and_unsupported() {
        let empty = Problem::new(vec![], vec![], 1.0, 0).unwrap();
        let param = Parameter::new(SolverType::L1rL2lossSvc);
        assert!(matches!(Model::train(&empty, &param), Err(Error::EmptyProblem)));

        let problem = Problem::new(vec![1], vec![sample(&[(1, 1.0)])], -1.0, 1).unwrap();
        let param = Parameter::new(SolverType::L2rLr);
        assert!(matches!(
            Model::train(&problem, &param),
            Err(Error::UnsupportedSolver(SolverType::L2rLr))
        ));
    }

    struct Recording {
        costs: std::cell::RefCell<Vec<(f64, f64, Vec<Sign>)>>,
    }

    impl Solver for Recording {
        fn solve(&self, problem: &BinaryProblem<'_>, cost_p: f64, cost_n: f64) -> Vec<f64> {
            self.costs
                .borrow_mut()
                .push((cost_p, cost_n, problem.signs().to_vec()));
            vec![0.0; problem.n_features()]
        }
    }

    #[test]
    fn one_vs_rest_costs() {
        let problem = Problem::new(
            vec![2, 1, 2, 3],
            vec![
                sample(&[(1, 1.0)]),
                sample(&[(2, 1.0)]),
                sample(&[(1, 1.0)]),
                sample(&[(3, 1.0)]),
            ],
            -1.0,
            3,
        )
        .unwrap();
        let param = Parameter::new(SolverType::L1rL2lossSvc)
            .with_c(2.0)
            .with_weight(1, 3.0);
        let solver = Recording {
            costs: Default::default(),
        };
        let model = Model::train_with(&solver, &problem, &param).unwrap();
        assert_eq!(model.labels(), &[2, 1, 3]);
        assert_eq!(model.nr_w(), 3);
        assert_eq!(model.weights().len(), 9);

        let calls = solver.costs.into_inner();
        assert_eq!(calls.len(), 3);
        assert_eq!((calls[0].0, calls[0].1), (2.0, 2.0));
        assert_eq!((calls[1].0, calls[1].1), (6.0, 2.0));
        assert_eq!(
            calls[1].2,
            vec![Sign::Negative, Sign::Positive, Sign::Negative, Sign::Negative]
        );
    }

    #[test]
    fn binary_costs_follow_label_order() {
        let problem = Problem::new(
            vec![-1, 1, -1],
            vec![sample(&[(1, 1.0)]), sample(&[(2, 1.0)]), sample(&[(1, 2.0)])],
            1.0,
            2,
        )
        .unwrap();
        let param = Parameter::new(SolverType::L1rL2lossSvc).with_weight(1, 4.0);
        let solver = Recording {
            costs: Default::default(),
        };
        let model = Model::train_with(&solver, &problem, &param).unwrap();
        assert_eq!(model.labels(), &[-1, 1]);
        assert_eq!(model.feature_count(), 2);
        assert_eq!(model.weights().len(), 3);

        let calls = solver.costs.into_inner();
        assert_eq!(calls.len(), 1);
        assert_eq!((calls[0].0, calls[0].1), (1.0, 4.0));
        assert_eq!(calls[0].2[0], Sign::Positive);
    }
}
