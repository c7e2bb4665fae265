use std::future::Future;
use std::time::Instant;

use anyhow::Result;
use serde::Serialize;
use tracing::debug;

use crate::aggregate::RoundRecord;
use crate::errors::BenchError;
use crate::types::Op;

/// One timed span: `repeat` back-to-back invocations of a unit of work.
#[derive(Debug, Clone, Serialize)]
pub struct Measurement {
    pub op: Op,
    pub round: usize,
    /// Raw wall-clock span across every invocation.
    pub duration_ms: f64,
    pub repeat: usize,
    /// Resident set size sampled when the span closed, if available.
    pub rss_bytes: Option<u64>,
}

impl Measurement {
    pub fn per_invocation_ms(&self) -> f64 {
        self.duration_ms / self.repeat as f64
    }

    pub fn ops_per_sec(&self) -> f64 {
        if self.duration_ms <= 0.0 {
            return f64::INFINITY;
        }
        1000.0 / self.duration_ms * self.repeat as f64
    }
}

/// Times units of work for a single round and accumulates them into that
/// round's [`RoundRecord`].
///
/// Consumed by [`Recorder::finish`], so a round cannot be mutated after it
/// has been handed to the aggregator.
#[derive(Debug)]
pub struct Recorder {
    round: usize,
    record: RoundRecord,
    measurements: Vec<Measurement>,
}

impl Recorder {
    pub fn new(round: usize) -> Self {
        Recorder {
            round,
            record: RoundRecord::default(),
            measurements: Vec::with_capacity(Op::ALL.len()),
        }
    }

    pub fn record(&self) -> &RoundRecord {
        &self.record
    }

    pub fn measurements(&self) -> &[Measurement] {
        &self.measurements
    }

    /// Time a single invocation of `work`, returning its output alongside the
    /// measurement. Errors from `work` propagate and nothing is recorded.
    pub async fn time<F, Fut, T>(&mut self, op: Op, work: F) -> Result<(T, Measurement)>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let start = Instant::now();
        let output = work().await?;
        let duration_ms = elapsed_ms(start);

        let measurement = self.push(op, duration_ms, 1);
        Ok((output, measurement))
    }

    /// Time `repeat` sequential invocations of `work` as one span.
    ///
    /// Each invocation is awaited to completion before the next starts. The
    /// raw span is what lands in the round record; the output of the last
    /// invocation is returned.
    pub async fn time_repeated<F, Fut, T>(
        &mut self,
        op: Op,
        repeat: usize,
        mut work: F,
    ) -> Result<(T, Measurement)>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if repeat == 0 {
            return Err(BenchError::ZeroRepeat { op: op.to_string() }.into());
        }

        let start = Instant::now();
        let mut output = work().await?;
        for _ in 1..repeat {
            output = work().await?;
        }
        let duration_ms = elapsed_ms(start);

        let measurement = self.push(op, duration_ms, repeat);
        Ok((output, measurement))
    }

    /// Record a duration that was measured outside this recorder.
    pub fn record_external(&mut self, op: Op, duration_ms: f64) -> Measurement {
        self.push(op, duration_ms.max(0.0), 1)
    }

    pub fn finish(self) -> (RoundRecord, Vec<Measurement>) {
        (self.record, self.measurements)
    }

    fn push(&mut self, op: Op, duration_ms: f64, repeat: usize) -> Measurement {
        let measurement = Measurement {
            op,
            round: self.round,
            duration_ms,
            repeat,
            rss_bytes: rss_bytes(),
        };
        debug!(
            round = self.round,
            op = %op,
            duration_ms,
            repeat,
            "measured"
        );

        self.record.add(op, duration_ms);
        self.measurements.push(measurement.clone());
        measurement
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Current process RSS in bytes.
///
/// `VmRSS` is reported in kB by the kernel, so no page size is involved.
#[cfg(target_os = "linux")]
pub fn rss_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

#[cfg(any(target_os = "linux", test))]
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kb: u64 = line
        .trim_start_matches("VmRSS:")
        .trim()
        .trim_end_matches("kB")
        .trim()
        .parse()
        .ok()?;
    Some(kb * 1024)
}

#[cfg(not(target_os = "linux"))]
pub fn rss_bytes() -> Option<u64> {
    None
}
