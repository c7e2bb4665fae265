use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

use crate::errors::BenchError;
use crate::timer::{Measurement, Recorder};
use crate::types::Op;

/// Accumulated milliseconds per bucket for a single round.
///
/// `all` always equals the sum of the four operation buckets for records
/// produced by a [`Recorder`]. Summary records built by [`summarize`] compute
/// `all` independently, so the invariant does not hold for them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RoundRecord {
    insert: f64,
    find: f64,
    update: f64,
    remove: f64,
    all: f64,
}

impl RoundRecord {
    /// Build a completed round from per-operation totals, in `Op::ALL` order.
    pub fn from_ops(ops: [f64; 4]) -> Self {
        let mut record = RoundRecord::default();
        for (op, ms) in Op::ALL.into_iter().zip(ops) {
            record.add(op, ms);
        }
        record
    }

    pub(crate) fn add(&mut self, op: Op, ms: f64) {
        *self.slot(op) += ms;
        self.all += ms;
    }

    fn slot(&mut self, op: Op) -> &mut f64 {
        match op {
            Op::Insert => &mut self.insert,
            Op::Find => &mut self.find,
            Op::Update => &mut self.update,
            Op::Remove => &mut self.remove,
        }
    }

    pub fn get(&self, op: Op) -> f64 {
        match op {
            Op::Insert => self.insert,
            Op::Find => self.find,
            Op::Update => self.update,
            Op::Remove => self.remove,
        }
    }

    pub fn all(&self) -> f64 {
        self.all
    }

    /// Bucket name and value pairs, operations first and `all` last.
    pub fn columns(&self) -> [(&'static str, f64); 5] {
        [
            ("insert", self.insert),
            ("find", self.find),
            ("update", self.update),
            ("remove", self.remove),
            ("all", self.all),
        ]
    }

    fn zip_with(&self, other: &RoundRecord, f: impl Fn(f64, f64) -> f64) -> RoundRecord {
        RoundRecord {
            insert: f(self.insert, other.insert),
            find: f(self.find, other.find),
            update: f(self.update, other.update),
            remove: f(self.remove, other.remove),
            all: f(self.all, other.all),
        }
    }

    fn map(&self, f: impl Fn(f64) -> f64) -> RoundRecord {
        self.zip_with(self, |a, _| f(a))
    }
}

/// Min, mean and max per bucket across the retained rounds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub min: RoundRecord,
    pub avg: RoundRecord,
    pub max: RoundRecord,
    /// Number of rounds the statistics were computed over.
    pub rounds: usize,
}

/// Reduce completed rounds into summary statistics.
///
/// Every bucket is reduced on its own: `min.all` is the smallest round total,
/// not the sum of the per-operation minimums.
pub fn summarize(records: &[RoundRecord]) -> Result<Summary, BenchError> {
    let (first, rest) = records.split_first().ok_or(BenchError::NoRetainedRounds)?;

    let mut min = *first;
    let mut max = *first;
    let mut sum = *first;
    for record in rest {
        min = min.zip_with(record, f64::min);
        max = max.zip_with(record, f64::max);
        sum = sum.zip_with(record, |a, b| a + b);
    }

    let n = records.len() as f64;
    Ok(Summary {
        min,
        avg: sum.map(|total| total / n),
        max,
        rounds: records.len(),
    })
}

/// How many rounds to run and how many leading rounds are warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundPlan {
    total: usize,
    warmup: usize,
}

impl RoundPlan {
    pub fn new(total: usize, warmup: usize) -> Result<Self, BenchError> {
        if total == warmup {
            return Err(BenchError::NoRetainedRounds);
        }
        if total < warmup {
            return Err(BenchError::InvalidPlan { total, warmup });
        }
        Ok(RoundPlan { total, warmup })
    }

    /// `measured` rounds preceded by `warmup` warm-up rounds.
    pub fn measured(measured: usize, warmup: usize) -> Result<Self, BenchError> {
        let total = measured
            .checked_add(warmup)
            .ok_or(BenchError::TooManyRounds { measured, warmup })?;
        Self::new(total, warmup)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn warmup(&self) -> usize {
        self.warmup
    }

    pub fn retained(&self) -> usize {
        self.total - self.warmup
    }

    pub fn is_warmup(&self, index: usize) -> bool {
        index < self.warmup
    }
}

/// Collects finished rounds, keeping warm-up rounds apart from the ones
/// that count towards the statistics.
#[derive(Debug, Clone)]
pub struct Aggregator {
    plan: RoundPlan,
    warmup: Vec<RoundRecord>,
    retained: Vec<RoundRecord>,
}

impl Aggregator {
    pub fn new(plan: RoundPlan) -> Self {
        Aggregator {
            plan,
            warmup: Vec::new(),
            retained: Vec::new(),
        }
    }

    pub fn push(&mut self, index: usize, record: RoundRecord) {
        if self.plan.is_warmup(index) {
            self.warmup.push(record);
        } else {
            self.retained.push(record);
        }
    }

    pub fn retained(&self) -> &[RoundRecord] {
        &self.retained
    }

    pub fn summary(&self) -> Result<Summary, BenchError> {
        summarize(&self.retained)
    }

    pub fn into_report(self) -> Result<RunReport, BenchError> {
        let summary = self.summary()?;
        Ok(RunReport {
            plan: self.plan,
            warmup: self.warmup,
            rounds: self.retained,
            summary,
        })
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub plan: RoundPlan,
    pub warmup: Vec<RoundRecord>,
    pub rounds: Vec<RoundRecord>,
    pub summary: Summary,
}

/// The fixed sequence of timed operations executed once per round.
#[async_trait]
pub trait RoundBody: Send {
    async fn run_round(&mut self, recorder: &mut Recorder) -> Result<()>;
}

/// Progress notifications emitted by [`run_rounds`].
pub enum RoundEvent<'a> {
    Started {
        index: usize,
        total: usize,
    },
    Finished {
        index: usize,
        warmup: bool,
        record: &'a RoundRecord,
        measurements: &'a [Measurement],
    },
}

/// Run every round of `plan` in order and aggregate the non-warm-up ones.
///
/// A failing round body aborts the run; no partial round is recorded.
pub async fn run_rounds<B, F>(plan: RoundPlan, body: &mut B, mut on_event: F) -> Result<RunReport>
where
    B: RoundBody + ?Sized,
    F: FnMut(RoundEvent<'_>),
{
    info!(total = plan.total(), warmup = plan.warmup(), "starting rounds");
    let mut aggregator = Aggregator::new(plan);

    for index in 0..plan.total() {
        on_event(RoundEvent::Started {
            index,
            total: plan.total(),
        });

        let mut recorder = Recorder::new(index);
        body.run_round(&mut recorder).await?;
        let (record, measurements) = recorder.finish();

        debug!(round = index, all_ms = record.all(), "round finished");
        on_event(RoundEvent::Finished {
            index,
            warmup: plan.is_warmup(index),
            record: &record,
            measurements: &measurements,
        });
        aggregator.push(index, record);
    }

    Ok(aggregator.into_report()?)
}
