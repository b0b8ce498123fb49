use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use crate::error::{Error, Result};
use crate::format::read_records;
use crate::resource::Handle;
use crate::sample::{Feature, Sample};

/// Flat storage behind a [`Problem`]: every row's nodes live in one buffer,
/// row `i` spans `nodes[offsets[i]..offsets[i + 1]]`.
#[derive(Debug)]
struct Buffers {
    labels: Vec<i32>,
    nodes: Vec<Feature>,
    offsets: Vec<usize>,
    n: usize,
    bias: f64,
}

impl Buffers {
    fn row(&self, i: usize) -> &[Feature] {
        &self.nodes[self.offsets[i]..self.offsets[i + 1]]
    }
}

/// Solver-ready training set.
///
/// Holds `l` labeled rows over `n` features. When `bias >= 0` the last
/// feature (index `n`) is the bias feature and every row ends with it.
/// After [`Problem::destroy`] every accessor fails.
#[derive(Debug)]
pub struct Problem {
    buffers: Handle<Buffers>,
}

impl Problem {
    /// Builds a problem from parallel `labels` and `samples`.
    ///
    /// `max_feature` is the highest feature index the samples may use.
    pub fn new(labels: Vec<i32>, samples: Vec<Sample>, bias: f64, max_feature: u32) -> Result<Self> {
        if labels.len() != samples.len() {
            return Err(Error::Shape {
                labels: labels.len(),
                samples: samples.len(),
            });
        }
        let mut builder = ProblemBuilder::new(bias).max_feature(max_feature);
        for (label, sample) in labels.into_iter().zip(samples) {
            builder.push(label, sample);
        }
        builder.build()
    }

    /// Loads a problem from a file in the sparse text format. The feature
    /// count is the highest index found in the file.
    pub fn load<P: AsRef<Path>>(path: P, bias: f64) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "loading problem");
        Self::from_reader(BufReader::new(file), bias)
    }

    pub fn from_reader<R: BufRead>(reader: R, bias: f64) -> Result<Self> {
        let mut builder = ProblemBuilder::new(bias);
        for record in read_records(reader) {
            let (label, sample) = record?;
            builder.push(label, sample);
        }
        builder.build()
    }

    /// Number of samples.
    pub fn l(&self) -> Result<usize> {
        Ok(self.buffers.get()?.labels.len())
    }

    /// Number of features, including the bias feature when present.
    pub fn n(&self) -> Result<usize> {
        Ok(self.buffers.get()?.n)
    }

    pub fn bias(&self) -> Result<f64> {
        Ok(self.buffers.get()?.bias)
    }

    pub fn labels(&self) -> Result<&[i32]> {
        Ok(&self.buffers.get()?.labels)
    }

    /// Features of sample `i`, ascending by index, bias feature last.
    pub fn feature_vector(&self, i: usize) -> Result<&[Feature]> {
        let buffers = self.buffers.get()?;
        let len = buffers.labels.len();
        if i >= len {
            return Err(Error::SampleOutOfRange { index: i, len });
        }
        Ok(buffers.row(i))
    }

    pub fn feature_vectors(&self) -> Result<impl Iterator<Item = &[Feature]> + '_> {
        let buffers = self.buffers.get()?;
        Ok((0..buffers.labels.len()).map(move |i| buffers.row(i)))
    }

    /// Releases the underlying buffers. Destroying twice is an error.
    pub fn destroy(&mut self) -> Result<()> {
        let buffers = self.buffers.release()?;
        debug!(l = buffers.labels.len(), nodes = buffers.nodes.len(), "problem destroyed");
        Ok(())
    }

    pub fn is_destroyed(&self) -> bool {
        self.buffers.is_released()
    }
}

/// Accumulates labeled samples and assembles them into a [`Problem`].
#[derive(Debug, Default)]
pub struct ProblemBuilder {
    bias: f64,
    max_feature: Option<u32>,
    labels: Vec<i32>,
    samples: Vec<Sample>,
}

impl ProblemBuilder {
    /// A negative `bias` disables the bias feature.
    pub fn new(bias: f64) -> Self {
        Self {
            bias,
            ..Self::default()
        }
    }

    /// Fixes the highest allowed feature index instead of using the
    /// highest one observed.
    pub fn max_feature(mut self, max_feature: u32) -> Self {
        self.max_feature = Some(max_feature);
        self
    }

    pub fn push(&mut self, label: i32, sample: Sample) {
        self.labels.push(label);
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn build(self) -> Result<Problem> {
        let observed = self
            .samples
            .iter()
            .filter_map(Sample::max_index)
            .max()
            .unwrap_or(0);
        let max_feature = match self.max_feature {
            Some(max) if observed > max => {
                return Err(Error::IndexOutOfRange {
                    index: observed,
                    max,
                })
            }
            Some(max) => max,
            None => observed,
        };

        let has_bias = self.bias >= 0.0;
        // The bias feature takes the slot after the last real feature.
        let bias_index = if has_bias {
            Some(max_feature.checked_add(1).ok_or(Error::IndexOutOfRange {
                index: max_feature,
                max: u32::MAX - 1,
            })?)
        } else {
            None
        };
        let n = bias_index.unwrap_or(max_feature) as usize;
        let node_count: usize = self
            .samples
            .iter()
            .map(|s| s.len() + usize::from(has_bias))
            .sum();

        let mut nodes = Vec::with_capacity(node_count);
        let mut offsets = Vec::with_capacity(self.samples.len() + 1);
        offsets.push(0);
        for sample in &self.samples {
            nodes.extend(sample.iter());
            if let Some(index) = bias_index {
                nodes.push(Feature::new(index, self.bias));
            }
            offsets.push(nodes.len());
        }

        debug!(l = self.labels.len(), n, bias = self.bias, nodes = nodes.len(), "problem built");
        Ok(Problem {
            buffers: Handle::new(Buffers {
                labels: self.labels,
                nodes,
                offsets,
                n,
                bias: self.bias,
            }),
        })
    }
}
