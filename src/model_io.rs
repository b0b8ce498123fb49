//! Reading and writing models in the liblinear text format.
//!
//! ```text
//! solver_type L1R_L2LOSS_SVC
//! nr_class 3
//! label 3 1 2
//! nr_feature 180
//! bias 1
//! w
//! 0.25 0 -1.5
//! ...
//! ```
//!
//! After `w` comes one line per feature (plus one for the bias feature when
//! `bias >= 0`) holding that feature's weight in every weight vector.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::error::{Error, Result};
use crate::model::Model;
use crate::parameter::SolverType;

pub fn load_model(path: &Path) -> Result<Model> {
    let file = File::open(path)?;
    let model = read_model(BufReader::new(file))?;
    info!(
        path = %path.display(),
        classes = model.class_count(),
        features = model.feature_count(),
        "model loaded"
    );
    Ok(model)
}

pub fn save_model(path: &Path, model: &Model) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    write_model(&mut writer, model)?;
    writer.flush()?;
    info!(path = %path.display(), "model saved");
    Ok(())
}

pub fn write_model<W: Write>(mut w: W, model: &Model) -> Result<()> {
    writeln!(w, "solver_type {}", model.solver_type())?;
    writeln!(w, "nr_class {}", model.class_count())?;
    write!(w, "label")?;
    for label in model.labels() {
        write!(w, " {label}")?;
    }
    writeln!(w)?;
    writeln!(w, "nr_feature {}", model.feature_count())?;
    writeln!(w, "bias {}", Number(model.bias()))?;
    writeln!(w, "w")?;
    for row in model.weights().chunks(model.nr_w()) {
        let mut values = row.iter();
        if let Some(first) = values.next() {
            write!(w, "{}", Number(*first))?;
        }
        for value in values {
            write!(w, " {}", Number(*value))?;
        }
        writeln!(w)?;
    }
    Ok(())
}

pub fn read_model<R: BufRead>(reader: R) -> Result<Model> {
    let mut lines = reader.lines();
    let mut solver_type = None;
    let mut nr_class: Option<usize> = None;
    let mut labels: Option<Vec<i32>> = None;
    let mut nr_feature: Option<usize> = None;
    let mut bias: Option<f64> = None;

    let mut line_number = 0;
    loop {
        let line = lines
            .next()
            .ok_or_else(|| Error::ModelFormat("unexpected end of file in header".into()))??;
        line_number += 1;
        let mut parts = line.split_whitespace();
        let Some(keyword) = parts.next() else {
            continue;
        };
        match keyword {
            "solver_type" => {
                let name = single(&mut parts, line_number, keyword)?;
                solver_type = Some(name.parse::<SolverType>().map_err(|_| {
                    Error::ModelFormat(format!("line {line_number}: unknown solver type {name}"))
                })?);
            }
            "nr_class" => {
                nr_class = Some(parse(single(&mut parts, line_number, keyword)?, line_number)?)
            }
            "nr_feature" => {
                nr_feature = Some(parse(single(&mut parts, line_number, keyword)?, line_number)?)
            }
            "bias" => bias = Some(parse(single(&mut parts, line_number, keyword)?, line_number)?),
            "label" => {
                labels = Some(
                    parts
                        .map(|token| parse::<i32>(token, line_number))
                        .collect::<Result<Vec<_>>>()?,
                )
            }
            "w" => break,
            other => {
                return Err(Error::ModelFormat(format!(
                    "line {line_number}: unknown keyword {other}"
                )))
            }
        }
    }

    let missing = |field: &str| Error::ModelFormat(format!("missing {field} in header"));
    let solver_type = solver_type.ok_or_else(|| missing("solver_type"))?;
    let nr_class = nr_class.ok_or_else(|| missing("nr_class"))?;
    let labels = labels.ok_or_else(|| missing("label"))?;
    let nr_feature = nr_feature.ok_or_else(|| missing("nr_feature"))?;
    let bias = bias.ok_or_else(|| missing("bias"))?;
    if labels.len() != nr_class {
        return Err(Error::ModelFormat(format!(
            "nr_class is {nr_class} but {} labels were given",
            labels.len()
        )));
    }

    let mut weights = Vec::new();
    for line in lines {
        line_number += 1;
        for token in line?.split_whitespace() {
            weights.push(parse::<f64>(token, line_number)?);
        }
    }
    Model::from_parts(solver_type, labels, nr_feature, bias, weights)
}

fn single<'a>(
    parts: &mut std::str::SplitWhitespace<'a>,
    line_number: usize,
    keyword: &str,
) -> Result<&'a str> {
    parts
        .next()
        .ok_or_else(|| Error::ModelFormat(format!("line {line_number}: missing {keyword} value")))
}

fn parse<T: std::str::FromStr>(token: &str, line_number: usize) -> Result<T> {
    token
        .parse()
        .map_err(|_| Error::ModelFormat(format!("line {line_number}: invalid value {token}")))
}

/// Shortest round-trip form; switches to exponent notation for very small
/// or large magnitudes.
struct Number(f64);

impl std::fmt::Display for Number {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let abs = self.0.abs();
        if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
            write!(f, "{:e}", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}
