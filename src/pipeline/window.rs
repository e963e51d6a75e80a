//! Fixed-capacity sliding window of recent samples
//!
//! The window holds one shared timestamp sequence plus one value sequence per
//! variable. Capacity is counted in samples: once the timestamp sequence is
//! full, each push evicts the oldest sample first.
//!
//! # Sparse variables
//!
//! Samples need not carry every variable. A variable missing from a push gets
//! no entry for it (no zero fill), so its value sequence can be shorter than
//! the timestamp sequence. Every value entry is tagged with the sequence
//! number of the sample it came from; eviction removes exactly the entries of
//! the evicted sample, which keeps each value sequence aligned with the
//! timestamps it belongs to and bounded by the capacity.
//!
//! # Variable set
//!
//! [`SlidingWindow::variables`] is the union of every name pushed since the
//! last [`SlidingWindow::clear`], in order of first appearance. A variable
//! stays in the set after all of its values are evicted.

use crate::types::Sample;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};

/// Consistent copy of the window for a renderer
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindowSnapshot {
    /// Elapsed seconds of every retained sample, oldest first
    pub timestamps: Vec<f64>,
    /// Values per variable, oldest first
    pub series: BTreeMap<String, Vec<f64>>,
    /// Variable names in order of first appearance
    pub variables: Vec<String>,
}

impl WindowSnapshot {
    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// First and last timestamp, for the X axis
    pub fn time_range(&self) -> Option<(f64, f64)> {
        Some((*self.timestamps.first()?, *self.timestamps.last()?))
    }

    /// Most recent value of each variable that has one
    pub fn latest(&self) -> BTreeMap<&str, f64> {
        self.series
            .iter()
            .filter_map(|(name, values)| values.last().map(|v| (name.as_str(), *v)))
            .collect()
    }
}

/// One recorded row: a timestamp and one optional cell per requested column
#[derive(Debug, Clone, PartialEq)]
pub struct WindowRow {
    pub timestamp: f64,
    pub values: Vec<Option<f64>>,
}

/// Per-variable ring buffers sharing one timestamp sequence
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    capacity: usize,
    timestamps: VecDeque<f64>,
    sequences: VecDeque<u64>,
    series: HashMap<String, VecDeque<(u64, f64)>>,
    variables: Vec<String>,
}

impl SlidingWindow {
    /// Create an empty window; a zero capacity is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            timestamps: VecDeque::with_capacity(capacity),
            sequences: VecDeque::with_capacity(capacity),
            series: HashMap::new(),
            variables: Vec::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of retained samples
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Variable names seen since the last clear, in order of first appearance
    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Append a sample, evicting the oldest one when full
    ///
    /// Empty samples are ignored. Returns `true` if the sample was stored.
    pub fn push(&mut self, sample: &Sample) -> bool {
        if sample.is_empty() {
            return false;
        }

        if self.timestamps.len() >= self.capacity {
            self.evict_oldest();
        }

        self.timestamps.push_back(sample.elapsed);
        self.sequences.push_back(sample.seq);

        for (name, value) in sample.values.iter() {
            let values = match self.series.get_mut(name) {
                Some(values) => values,
                None => {
                    self.variables.push(name.to_string());
                    self.series
                        .entry(name.to_string())
                        .or_insert_with(|| VecDeque::with_capacity(self.capacity))
                }
            };
            values.push_back((sample.seq, value));
        }

        true
    }

    fn evict_oldest(&mut self) {
        let (Some(_), Some(seq)) = (self.timestamps.pop_front(), self.sequences.pop_front()) else {
            return;
        };
        for values in self.series.values_mut() {
            if values.front().is_some_and(|(s, _)| *s == seq) {
                values.pop_front();
            }
        }
    }

    /// Copy the current contents
    pub fn snapshot(&self) -> WindowSnapshot {
        WindowSnapshot {
            timestamps: self.timestamps.iter().copied().collect(),
            series: self
                .series
                .iter()
                .map(|(name, values)| (name.clone(), values.iter().map(|(_, v)| *v).collect()))
                .collect(),
            variables: self.variables.clone(),
        }
    }

    /// The most recent `count` samples as rows over `columns`
    ///
    /// A column with no value in a given sample yields `None` for that cell.
    pub fn recent_rows(&self, count: usize, columns: &[String]) -> Vec<WindowRow> {
        let skip = self.len().saturating_sub(count);
        self.sequences
            .iter()
            .zip(self.timestamps.iter())
            .skip(skip)
            .map(|(&seq, &timestamp)| WindowRow {
                timestamp,
                values: columns.iter().map(|name| self.value_at(name, seq)).collect(),
            })
            .collect()
    }

    fn value_at(&self, name: &str, seq: u64) -> Option<f64> {
        let values = self.series.get(name)?;
        values
            .binary_search_by_key(&seq, |(s, _)| *s)
            .ok()
            .map(|idx| values[idx].1)
    }

    /// Drop all samples and forget the variable set
    pub fn clear(&mut self) {
        self.timestamps.clear();
        self.sequences.clear();
        self.series.clear();
        self.variables.clear();
    }
}
