//! Parser for the sparse text record format.
//!
//! Each line holds one sample: `<label> <index>:<value> <index>:<value> ...`.
//! Tokens that are not of the `index:value` shape are skipped; they never
//! affect the valid tokens around them.

use std::io::BufRead;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::sample::Sample;

static FEATURE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?\d+):([+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)$").expect("feature regex")
});

/// Parses one record line. Blank lines yield `None`.
///
/// `line_number` is 1-based and only used for error reporting.
pub fn parse_line(line: &str, line_number: usize) -> Result<Option<(i32, Sample)>> {
    let mut tokens = line.split_whitespace();
    let Some(label_token) = tokens.next() else {
        return Ok(None);
    };
    let label = parse_label(label_token)
        .ok_or_else(|| Error::format(line_number, format!("invalid label: {label_token}")))?;

    let mut sample = Sample::new();
    for token in tokens {
        let Some(caps) = FEATURE_RE.captures(token) else {
            debug!(line = line_number, token, "skipping malformed feature token");
            continue;
        };
        let index: i64 = caps[1].parse().map_err(|_| {
            Error::format(line_number, format!("feature index out of range: {}", &caps[1]))
        })?;
        let index = u32::try_from(index)
            .ok()
            .filter(|&i| i > 0)
            .ok_or(Error::InvalidIndex(index))?;
        let value: f64 = caps[2]
            .parse()
            .map_err(|_| Error::format(line_number, format!("invalid value: {}", &caps[2])))?;
        sample.insert(index, value)?;
    }
    Ok(Some((label, sample)))
}

/// Streams records from a reader, skipping blank lines.
pub fn read_records<R: BufRead>(reader: R) -> impl Iterator<Item = Result<(i32, Sample)>> {
    reader
        .lines()
        .enumerate()
        .filter_map(|(i, line)| match line {
            Ok(line) => parse_line(&line, i + 1).transpose(),
            Err(err) => Some(Err(err.into())),
        })
}

/// Integer labels parse directly; integral reals such as `2.0` are accepted.
fn parse_label(token: &str) -> Option<i32> {
    token.parse::<i32>().ok().or_else(|| {
        let value: f64 = token.parse().ok()?;
        let in_range = value >= f64::from(i32::MIN) && value <= f64::from(i32::MAX);
        (value.fract() == 0.0 && in_range).then_some(value as i32)
    })
}
