use crate::sample::Feature;

/// Side of a one-vs-rest split a sample falls on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sign {
    Positive,
    Negative,
}

impl Sign {
    pub fn value(self) -> f64 {
        match self {
            Self::Positive => 1.0,
            Self::Negative => -1.0,
        }
    }
}

/// One binary sub-problem handed to a [`Solver`].
///
/// Rows borrow the owning problem's buffers; every feature index lies in
/// `1..=n_features`.
pub struct BinaryProblem<'a> {
    rows: &'a [&'a [Feature]],
    signs: Vec<Sign>,
    n_features: usize,
}

impl<'a> BinaryProblem<'a> {
    pub(crate) fn new(rows: &'a [&'a [Feature]], signs: Vec<Sign>, n_features: usize) -> Self {
        debug_assert_eq!(rows.len(), signs.len());
        Self {
            rows,
            signs,
            n_features,
        }
    }

    pub fn rows(&self) -> &[&'a [Feature]] {
        self.rows
    }

    pub fn signs(&self) -> &[Sign] {
        &self.signs
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn len(&self) -> usize {
        self.signs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signs.is_empty()
    }
}

/// Fits one weight vector for a binary sub-problem.
///
/// `cost_p` and `cost_n` are the penalties for positive and negative
/// samples. The returned vector has `n_features` entries, entry `j` being
/// the weight of feature index `j + 1`.
pub trait Solver {
    fn solve(&self, problem: &BinaryProblem<'_>, cost_p: f64, cost_n: f64) -> Vec<f64>;
}
