use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::parameter::{Parameter, SolverType};
use crate::solver::{BinaryProblem, Sign, Solver};

#[derive(Clone)]
struct TransposedFeature {
    id: usize,
    value: f64,
}

/// L1-regularized L2-loss SVC trained by primal coordinate descent with
/// shrinking and a backtracking line search.
pub struct L1rL2lossSvcSolver {
    eps: f64,
    beta: f64,
    sigma: f64,
    max_linesearch_iter: usize,
    max_iter: usize,
    seed: u64,
}

impl L1rL2lossSvcSolver {
    pub fn new(eps: f64) -> Self {
        Self {
            eps,
            beta: 0.5,
            sigma: 0.01,
            max_linesearch_iter: 20,
            max_iter: 1000,
            seed: 1,
        }
    }

    /// Solver for `param`, which must select [`SolverType::L1rL2lossSvc`].
    pub fn from_parameter(param: &Parameter) -> Result<Self> {
        match param.solver_type {
            SolverType::L1rL2lossSvc => Ok(Self::new(param.eps)),
            other => Err(Error::UnsupportedSolver(other)),
        }
    }

    pub fn with_line_search(mut self, beta: f64, sigma: f64, max_linesearch_iter: usize) -> Self {
        self.beta = beta;
        self.sigma = sigma;
        self.max_linesearch_iter = max_linesearch_iter;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Runs the solver one outer iteration at a time. Each item is `Some`
    /// with the final weights once converged, `None` otherwise.
    pub fn iterate<'a>(
        &'a self,
        problem: &BinaryProblem<'_>,
        cost_p: f64,
        cost_n: f64,
    ) -> L1rL2lossSvcSolverIter<'a> {
        let n_features = problem.n_features();
        let xs_t = transpose(problem);

        let signs = problem.signs().to_vec();
        let cost = |sign: Sign| match sign {
            Sign::Positive => cost_p,
            Sign::Negative => cost_n,
        };
        let xs_sq: Vec<f64> = xs_t
            .iter()
            .map(|column| {
                column
                    .iter()
                    .map(|feat| cost(signs[feat.id]) * feat.value.powi(2))
                    .sum::<f64>()
            })
            .collect();

        L1rL2lossSvcSolverIter {
            solver: self,
            ws: Some(vec![0.0; n_features]),
            rng: StdRng::seed_from_u64(self.seed),
            active_size: n_features,
            xs_t,
            bs: vec![1.0; signs.len()],
            signs,
            cost_p,
            cost_n,
            prev_v_max: f64::MAX,
            indices: (0..n_features).collect(),
            xs_sq,
            v_sum_init: None,
        }
    }
}

impl Solver for L1rL2lossSvcSolver {
    fn solve(&self, problem: &BinaryProblem<'_>, cost_p: f64, cost_n: f64) -> Vec<f64> {
        let mut iter = self.iterate(problem, cost_p, cost_n);
        for iteration in 1..=self.max_iter {
            match iter.next() {
                Some(Some(ws)) => {
                    debug!(iteration, "solver converged");
                    return ws;
                }
                Some(None) => {}
                None => break,
            }
        }
        warn!(max_iter = self.max_iter, "reached maximum number of iterations");
        iter.into_weights()
    }
}

fn transpose(problem: &BinaryProblem<'_>) -> Vec<Vec<TransposedFeature>> {
    let mut xs_t = vec![vec![]; problem.n_features()];
    for (i, (row, sign)) in problem.rows().iter().zip(problem.signs()).enumerate() {
        let y = sign.value();
        for feat in row.iter() {
            xs_t[feat.index as usize - 1].push(TransposedFeature {
                id: i,
                value: y * feat.value,
            });
        }
    }
    xs_t
}

pub struct L1rL2lossSvcSolverIter<'a> {
    solver: &'a L1rL2lossSvcSolver,
    ws: Option<Vec<f64>>,
    rng: StdRng,
    active_size: usize,
    xs_t: Vec<Vec<TransposedFeature>>,
    bs: Vec<f64>,
    signs: Vec<Sign>,
    cost_p: f64,
    cost_n: f64,
    prev_v_max: f64,
    indices: Vec<usize>,
    xs_sq: Vec<f64>,
    v_sum_init: Option<f64>,
}

impl L1rL2lossSvcSolverIter<'_> {
    /// Current weights, converged or not.
    pub fn into_weights(self) -> Vec<f64> {
        self.ws.unwrap_or_default()
    }

    fn cost(&self, id: usize) -> f64 {
        match self.signs[id] {
            Sign::Positive => self.cost_p,
            Sign::Negative => self.cost_n,
        }
    }

    fn calculate_loss(&self, j: usize) -> f64 {
        let mut loss = 0.0;
        for feat in &self.xs_t[j] {
            if self.bs[feat.id] > 0.0 {
                loss += self.cost(feat.id) * self.bs[feat.id].powi(2);
            }
        }
        loss
    }

    fn calculate_g_loss(&self, j: usize) -> (f64, f64) {
        let mut g_loss = 0.0;
        let mut g2_loss = 0.0;
        for feat in &self.xs_t[j] {
            if self.bs[feat.id] > 0.0 {
                let cost = self.cost(feat.id);
                g_loss -= cost * feat.value * self.bs[feat.id];
                g2_loss += cost * feat.value.powi(2);
            }
        }
        (g_loss * 2.0, (g2_loss * 2.0).max(1e-12))
    }
}

impl Iterator for L1rL2lossSvcSolverIter<'_> {
    type Item = Option<Vec<f64>>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut v_max: f64 = 0.0;
        let mut v_sum = 0.0;
        let mut ws = self.ws.take()?;

        self.indices[..self.active_size].shuffle(&mut self.rng);

        let mut s = 0;
        while s < self.active_size {
            let j = self.indices[s];

            let (g_loss, g2_loss) = self.calculate_g_loss(j);

            // Shrink coordinates that stay at zero
            if ws[j] == 0.0 {
                let m = self.prev_v_max / self.signs.len() as f64;
                if g_loss > m - 1.0 && g_loss < 1.0 - m {
                    self.active_size -= 1;
                    self.indices.swap(s, self.active_size);
                    continue;
                }
            }

            s += 1;

            // Violation of the optimality condition
            let v = if ws[j] > 0.0 {
                (g_loss + 1.0).abs()
            } else if ws[j] < 0.0 {
                (g_loss - 1.0).abs()
            } else {
                (g_loss - 1.0).max(-1.0 - g_loss).max(0.0)
            };
            v_max = v.max(v_max);
            v_sum += v;

            // Newton direction
            let mut d = if g_loss + 1.0 < g2_loss * ws[j] {
                -(g_loss + 1.0) / g2_loss
            } else if (g_loss - 1.0) > g2_loss * ws[j] {
                -(g_loss - 1.0) / g2_loss
            } else {
                -ws[j]
            };

            if d.abs() < 1e-12 {
                continue;
            }

            // Line search
            let prev_loss = self.calculate_loss(j);
            let mut delta = g_loss.mul_add(d, (ws[j] + d).abs() - ws[j].abs());
            let mut prev_d = 0.0;
            let mut num_linesearch = 0;
            for i in 0..self.solver.max_linesearch_iter {
                num_linesearch = i + 1;

                let d_diff = prev_d - d;
                for feat in &self.xs_t[j] {
                    self.bs[feat.id] += d_diff * feat.value;
                }

                // Sufficient decrease of the quadratic upper bound
                if g_loss.mul_add(
                    d,
                    (self.xs_sq[j] * d).mul_add(d, (ws[j] + d).abs() - ws[j].abs()),
                ) <= self.solver.sigma * delta
                {
                    break;
                }

                // Sufficient decrease of the objective
                let loss = self.calculate_loss(j);
                if (ws[j] + d).abs() - ws[j].abs() + loss - prev_loss <= self.solver.sigma * delta {
                    break;
                }

                prev_d = d;
                d *= self.solver.beta;
                delta *= self.solver.beta;
            }

            ws[j] += d;

            // Recompute b when the line search ran out
            if num_linesearch >= self.solver.max_linesearch_iter {
                self.bs.fill(1.0);
                for (xs_j, &w) in self.xs_t.iter().zip(ws.iter()) {
                    if w == 0.0 {
                        continue;
                    }
                    for feat in xs_j {
                        self.bs[feat.id] -= w * feat.value;
                    }
                }
            }
        }

        let v_sum_init = *self.v_sum_init.get_or_insert(v_sum);
        trace!(v_sum, v_max, active = self.active_size, "solver iteration");

        if v_sum <= v_sum_init * self.solver.eps {
            if self.active_size == ws.len() {
                return Some(Some(ws));
            }
            self.active_size = ws.len();
            self.prev_v_max = f64::MAX;
        } else {
            self.prev_v_max = v_max;
        }
        self.ws = Some(ws);
        Some(None)
    }
}
