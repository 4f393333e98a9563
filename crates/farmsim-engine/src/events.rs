//! Future event set.
//!
//! Holds the single pending arrival time and one record per in-flight
//! job with its derived estimated departure. The next event is the
//! earlier of the two; a departure wins a tie so a job completing at the
//! instant of an arrival is accounted for first. Records live in a
//! `BTreeMap` so selection order is deterministic for a given seed.

use std::collections::BTreeMap;

use farmsim_core::{JobId, ServerId};

use crate::error::{EngineError, EngineResult};

/// Per-job bookkeeping while the job is in flight.
#[derive(Debug, Clone)]
pub struct JobRecord {
    /// Simulated arrival instant.
    pub arrival: f64,
    /// Original size, immutable, kept for reporting.
    pub size: f64,
    /// Server currently processing the job.
    pub server: ServerId,
    /// Recomputed whenever the owning server's concurrency changes.
    pub estimated_departure: Option<f64>,
}

/// The next thing that will happen.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    Arrival { at: f64 },
    Departure { at: f64, job: JobId },
}

impl Event {
    pub fn at(&self) -> f64 {
        match self {
            Event::Arrival { at } | Event::Departure { at, .. } => *at,
        }
    }
}

pub struct FutureEventSet {
    next_arrival: f64,
    records: BTreeMap<JobId, JobRecord>,
}

impl FutureEventSet {
    pub fn new(first_arrival: f64) -> Self {
        Self {
            next_arrival: first_arrival,
            records: BTreeMap::new(),
        }
    }

    pub fn next_arrival(&self) -> f64 {
        self.next_arrival
    }

    pub fn set_next_arrival(&mut self, at: f64) {
        self.next_arrival = at;
    }

    /// No further arrivals; used when the run enters its draining phase
    /// or a trace ends.
    pub fn suppress_arrivals(&mut self) {
        self.next_arrival = f64::INFINITY;
    }

    pub fn insert(&mut self, job: JobId, record: JobRecord) {
        self.records.insert(job, record);
    }

    pub fn remove(&mut self, job: JobId) -> Option<JobRecord> {
        self.records.remove(&job)
    }

    pub fn get(&self, job: JobId) -> Option<&JobRecord> {
        self.records.get(&job)
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = (&JobId, &mut JobRecord)> {
        self.records.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Select the next event, departures winning ties. `None` once no
    /// arrival is pending and no job is in flight.
    pub fn next_event(&self) -> EngineResult<Option<Event>> {
        let mut best: Option<(f64, JobId)> = None;
        for (&job, record) in &self.records {
            let at = record.estimated_departure.ok_or_else(|| {
                EngineError::InvalidState(format!(
                    "departure estimate missing for {job}"
                ))
            })?;
            if best.is_none_or(|(t, _)| at < t) {
                best = Some((at, job));
            }
        }
        match best {
            Some((at, job)) if at <= self.next_arrival => {
                Ok(Some(Event::Departure { at, job }))
            }
            _ if self.next_arrival.is_finite() => Ok(Some(Event::Arrival {
                at: self.next_arrival,
            })),
            _ => Ok(None),
        }
    }
}
