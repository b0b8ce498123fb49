use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::info;

use rslinear::{read_records, Model, Parameter, Problem, SolverType, DEFAULT_C, DEFAULT_EPS};

/// Train and apply sparse linear classifiers.
#[derive(Parser, Debug)]
#[command(name = "rslinear")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model from a data file in the sparse text format.
    Train {
        /// Solver type, by name or liblinear code.
        #[arg(short, long, default_value = "L1R_L2LOSS_SVC")]
        solver: SolverType,

        /// Regularization cost.
        #[arg(short, long, default_value_t = DEFAULT_C)]
        c: f64,

        /// Stopping tolerance.
        #[arg(short, long, default_value_t = DEFAULT_EPS)]
        eps: f64,

        /// Bias feature value; negative disables it.
        #[arg(short = 'B', long, default_value_t = -1.0, allow_negative_numbers = true)]
        bias: f64,

        /// Per-class cost multiplier as LABEL=WEIGHT. Repeatable.
        #[arg(short, long = "weight", value_parser = parse_weight)]
        weights: Vec<(i32, f64)>,

        data: PathBuf,
        model: PathBuf,
    },
    /// Predict labels for a data file and report accuracy.
    Predict {
        test: PathBuf,
        model: PathBuf,
        output: PathBuf,
    },
}

fn parse_weight(s: &str) -> Result<(i32, f64), String> {
    let (label, weight) = s
        .split_once('=')
        .ok_or_else(|| format!("expected LABEL=WEIGHT, got {s}"))?;
    let label = label.parse().map_err(|_| format!("invalid label: {label}"))?;
    let weight = weight.parse().map_err(|_| format!("invalid weight: {weight}"))?;
    Ok((label, weight))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match Args::parse().command {
        Command::Train {
            solver,
            c,
            eps,
            bias,
            weights,
            data,
            model,
        } => {
            let problem = Problem::load(&data, bias)?;
            let param = weights
                .into_iter()
                .fold(Parameter::new(solver).with_c(c).with_eps(eps), |param, (label, weight)| {
                    param.with_weight(label, weight)
                });
            let trained = Model::train(&problem, &param)?;
            trained.save(&model)?;
        }
        Command::Predict {
            test,
            model,
            output,
        } => {
            let model = Model::load(&model)?;
            let reader = BufReader::new(File::open(&test)?);
            let mut writer = BufWriter::new(File::create(&output)?);

            let mut correct = 0;
            let mut total = 0;
            for record in read_records(reader) {
                let (label, sample) = record?;
                let predicted = model.predict(&sample);
                writeln!(writer, "{predicted}")?;
                if predicted == label {
                    correct += 1;
                }
                total += 1;
            }
            writer.flush()?;

            let accuracy = if total == 0 {
                0.0
            } else {
                100.0 * correct as f64 / total as f64
            };
            info!(correct, total, "accuracy = {accuracy:.4}%");
        }
    }

    Ok(())
}
