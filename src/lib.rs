mod error;
mod format;
mod l1r_l2loss_svc;
mod model;
mod model_io;
mod parameter;
mod problem;
mod resource;
mod sample;
mod solver;

pub use crate::error::{Error, Result};
pub use crate::format::{parse_line, read_records};
pub use crate::l1r_l2loss_svc::{L1rL2lossSvcSolver, L1rL2lossSvcSolverIter};
pub use crate::model::Model;
pub use crate::model_io::{read_model, write_model};
pub use crate::parameter::{validate, Parameter, SolverType, DEFAULT_C, DEFAULT_EPS};
pub use crate::problem::{Problem, ProblemBuilder};
pub use crate::resource::Handle;
pub use crate::sample::{Feature, Sample};
pub use crate::solver::{BinaryProblem, Sign, Solver};
