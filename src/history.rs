//! Recent sample history for chart seeding
//!
//! Dashboards draw short rolling charts for a few channels. When a client
//! connects it needs the recent past, not just the latest value, so the driver
//! records every sample of a tracked name into a bounded ring.

use serde::Serialize;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use crate::{SensorSample, Value};

/// Points kept per tracked name unless configured otherwise.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// One chart point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryPoint {
    pub timestamp: i64,
    pub value: Value,
}

/// Bounded ring of points for one name; oldest points fall off first.
#[derive(Debug, Clone)]
pub struct HistoryBuffer {
    points: VecDeque<HistoryPoint>,
    capacity: usize,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        Self { points: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, point: HistoryPoint) {
        if self.capacity == 0 {
            return;
        }
        if self.points.len() == self.capacity {
            self.points.pop_front();
        }
        self.points.push_back(point);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Points oldest first.
    pub fn to_vec(&self) -> Vec<HistoryPoint> {
        self.points.iter().cloned().collect()
    }
}

/// Shared per-name histories. Clones share the same buffers.
#[derive(Debug, Clone)]
pub struct SampleHistory {
    buffers: Arc<Mutex<HashMap<String, HistoryBuffer>>>,
}

impl SampleHistory {
    /// Track `names`, keeping up to `capacity` points each. Samples of other
    /// names are ignored.
    pub fn new<I, S>(names: I, capacity: usize) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let buffers =
            names.into_iter().map(|name| (name.into(), HistoryBuffer::new(capacity))).collect();
        Self { buffers: Arc::new(Mutex::new(buffers)) }
    }

    /// Record every tracked sample.
    pub fn record(&self, samples: &[SensorSample]) {
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        for sample in samples {
            if let Some(buffer) = buffers.get_mut(&sample.name) {
                buffer.push(HistoryPoint { timestamp: sample.timestamp, value: sample.value.clone() });
            }
        }
    }

    /// Points for `name`, oldest first. Empty for untracked names.
    pub fn points(&self, name: &str) -> Vec<HistoryPoint> {
        let buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        buffers.get(name).map(HistoryBuffer::to_vec).unwrap_or_default()
    }

    /// Every tracked name that has points, for seeding a new client's charts.
    pub fn seed(&self) -> BTreeMap<String, Vec<HistoryPoint>> {
        let buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        buffers
            .iter()
            .filter(|(_, buffer)| !buffer.is_empty())
            .map(|(name, buffer)| (name.clone(), buffer.to_vec()))
            .collect()
    }

    /// Names being tracked, sorted.
    pub fn tracked(&self) -> Vec<String> {
        let buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<_> = buffers.keys().cloned().collect();
        names.sort();
        names
    }
}
