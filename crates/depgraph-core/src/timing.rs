//! Per-phase wall-clock sampling.
//!
//! Samples are kept in a thread-local buffer so concurrent requests on other
//! threads never interleave. Collection is off unless switched on via
//! [`set_timing_enabled`] (the CLI does this for `--timing` or
//! `DEPGRAPH_TIMING=1`).

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Environment variable that turns timing on.
pub const TIMING_ENV: &str = "DEPGRAPH_TIMING";

/// Aggregated samples, one row per phase name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TimingReport {
    pub phases: Vec<PhaseTiming>,
}

/// Statistics for one phase name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhaseTiming {
    pub name: String,
    pub count: usize,
    #[serde(rename = "total_us", serialize_with = "as_micros")]
    pub total: Duration,
    #[serde(rename = "p50_us", serialize_with = "as_micros")]
    pub p50: Duration,
    #[serde(rename = "max_us", serialize_with = "as_micros")]
    pub max: Duration,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn as_micros<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u128(d.as_micros())
}

thread_local! {
    static SAMPLES: RefCell<Vec<(String, Duration)>> = const { RefCell::new(Vec::new()) };
}

static ENABLED: AtomicBool = AtomicBool::new(false);

/// Whether `DEPGRAPH_TIMING` holds a truthy value (`1`, `true`, `yes`, `on`).
#[must_use]
pub fn timing_enabled_from_env() -> bool {
    std::env::var(TIMING_ENV).is_ok_and(|v| is_truthy(&v))
}

/// Switch collection on or off. Switching off drops pending samples.
pub fn set_timing_enabled(enabled: bool) {
    ENABLED.store(enabled, Ordering::Relaxed);
    if !enabled {
        clear_timings();
    }
}

#[must_use]
pub fn is_timing_enabled() -> bool {
    ENABLED.load(Ordering::Relaxed)
}

/// Drop this thread's samples.
pub fn clear_timings() {
    SAMPLES.with(|s| s.borrow_mut().clear());
}

/// Run `f`, recording its duration under `name` when timing is on.
pub fn timed<R>(name: &str, f: impl FnOnce() -> R) -> R {
    if !is_timing_enabled() {
        return f();
    }
    let started = Instant::now();
    let out = f();
    record(name, started.elapsed());
    out
}

/// Drain this thread's samples into a report, phases sorted by name.
#[must_use]
pub fn collect_report() -> TimingReport {
    let samples = SAMPLES.with(|s| std::mem::take(&mut *s.borrow_mut()));

    let mut grouped: BTreeMap<String, Vec<Duration>> = BTreeMap::new();
    for (name, elapsed) in samples {
        grouped.entry(name).or_default().push(elapsed);
    }

    let phases = grouped
        .into_iter()
        .map(|(name, mut values)| {
            values.sort_unstable();
            PhaseTiming {
                name,
                count: values.len(),
                total: values.iter().sum(),
                p50: values[(values.len() - 1) / 2],
                max: values[values.len() - 1],
            }
        })
        .collect();

    TimingReport { phases }
}

impl TimingReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Plain table for stderr.
    #[must_use]
    pub fn display_table(&self) -> String {
        if self.phases.is_empty() {
            return "No timing samples recorded.".to_string();
        }
        let mut out = String::from("phase                        count    total      p50      max\n");
        out.push_str(&"-".repeat(63));
        out.push('\n');
        for phase in &self.phases {
            let _ = writeln!(
                out,
                "{:<28} {:>5} {:>8} {:>8} {:>8}",
                phase.name,
                phase.count,
                format_duration(phase.total),
                format_duration(phase.p50),
                format_duration(phase.max),
            );
        }
        out
    }
}

fn record(name: &str, elapsed: Duration) {
    SAMPLES.with(|s| s.borrow_mut().push((name.to_string(), elapsed)));
}

fn format_duration(d: Duration) -> String {
    let micros = d.as_micros();
    if micros >= 1_000_000 {
        format!("{}.{:03}s", micros / 1_000_000, (micros % 1_000_000) / 1_000)
    } else if micros >= 1_000 {
        format!("{}.{:03}ms", micros / 1_000, micros % 1_000)
    } else {
        format!("{micros}µs")
    }
}

/// Truthy env values: `1`, `true`, `yes`, `on`, any case.
#[must_use]
pub fn is_truthy(value: &str) -> bool {
    ["1", "true", "yes", "on"]
        .iter()
        .any(|t| value.trim().eq_ignore_ascii_case(t))
}
