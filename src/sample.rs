use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// One `index:value` entry of a sparse feature vector. Indices are 1-based.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Feature {
    pub index: u32,
    pub value: f64,
}

impl Feature {
    pub const fn new(index: u32, value: f64) -> Self {
        Self { index, value }
    }
}

/// Sparse feature vector. Absent indices mean zero.
///
/// Entries are kept ordered by index, so iteration is always ascending.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sample {
    entries: BTreeMap<u32, f64>,
}

impl Sample {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a sample from `(index, value)` pairs. A repeated index keeps
    /// the last value.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (u32, f64)>,
    {
        let mut sample = Self::new();
        for (index, value) in pairs {
            sample.insert(index, value)?;
        }
        Ok(sample)
    }

    /// Sets the value at `index`, returning the previous value if any.
    pub fn insert(&mut self, index: u32, value: f64) -> Result<Option<f64>> {
        if index == 0 {
            return Err(Error::InvalidIndex(0));
        }
        Ok(self.entries.insert(index, value))
    }

    pub fn get(&self, index: u32) -> Option<f64> {
        self.entries.get(&index).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest index present, if any.
    pub fn max_index(&self) -> Option<u32> {
        self.entries.keys().next_back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Feature> + '_ {
        self.entries
            .iter()
            .map(|(&index, &value)| Feature::new(index, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_in_index_order() {
        let sample = Sample::from_pairs([(4, -1.2), (2, 0.1), (3, 0.3)]).unwrap();
        let features: Vec<_> = sample.iter().collect();
        assert_eq!(
            features,
            vec![
                Feature::new(2, 0.1),
                Feature::new(3, 0.3),
                Feature::new(4, -1.2)
            ]
        );
        assert_eq!(sample.max_index(), Some(4));
    }

    #[test]
    fn rejects_index_zero() {
        let err = Sample::from_pairs([(1, 1.0), (0, 2.0)]).unwrap_err();
        assert!(matches!(err, Error::InvalidIndex(0)));
    }

    #[test]
    fn repeated_index_keeps_last_value() {
        let mut sample = Sample::new();
        assert_eq!(sample.insert(7, 1.0).unwrap(), None);
        assert_eq!(sample.insert(7, 2.5).unwrap(), Some(1.0));
        assert_eq!(sample.get(7), Some(2.5));
        assert_eq!(sample.len(), 1);
    }

    #[test]
    fn empty_sample_has_no_max_index() {
        let sample = Sample::new();
        assert!(sample.is_empty());
        assert_eq!(sample.max_index(), None);
    }
}
