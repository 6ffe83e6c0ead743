//! Throughput and error reporting for a finished run.

use std::fmt;
use std::time::Duration;

use sketches_ddsketch::DDSketch;
use yansi::Paint;

use crate::engine::Collected;

/// The summary of one engine run.
pub struct Report {
    /// The number of collected outcomes.
    pub total: usize,
    /// The number of successful outcomes.
    pub succeeded: usize,
    /// The number of failed outcomes.
    pub failed: usize,
    /// Wall-clock duration of dispatch and collection.
    pub elapsed: Duration,
    /// Latency of the individual remote calls, in seconds.
    pub latency: DDSketch,
}

impl fmt::Debug for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Report")
            .field("total", &self.total)
            .field("succeeded", &self.succeeded)
            .field("failed", &self.failed)
            .field("elapsed", &self.elapsed)
            .field("latency_count", &self.latency.count())
            .finish()
    }
}

impl Report {
    /// Summarizes the collected outcomes of a run.
    pub fn new(collected: &Collected, elapsed: Duration, latency: DDSketch) -> Self {
        Self {
            total: collected.len(),
            succeeded: collected.succeeded(),
            failed: collected.failed(),
            elapsed,
            latency,
        }
    }

    /// The share of failed outcomes in percent, or `None` if nothing failed.
    pub fn error_percent(&self) -> Option<f64> {
        if self.failed == 0 || self.total == 0 {
            return None;
        }
        Some(self.failed as f64 * 100.0 / self.total as f64)
    }

    /// Successful outcomes per `unit` of elapsed time.
    ///
    /// Returns `None` if nothing succeeded or no time has elapsed.
    pub fn rate(&self, unit: Duration) -> Option<f64> {
        if self.succeeded == 0 || self.elapsed.is_zero() {
            return None;
        }
        Some(self.succeeded as f64 * unit.as_secs_f64() / self.elapsed.as_secs_f64())
    }

    /// Prints the report to stdout.
    pub fn print(&self, unit: Duration) {
        println!(
            "{} ({} total, {} succeeded, {} failed) in {:.2?}",
            "RESULT:".bold().green(),
            self.total.bold(),
            self.succeeded,
            self.failed,
            self.elapsed,
        );

        if let Some(percent) = self.error_percent() {
            println!("{}", format!("Error percent: {percent:.2} %").bold().red());
        }

        match self.rate(unit) {
            Some(rate) => println!("Benchmark: {:.2} {}", rate.bold(), RateUnit(unit)),
            None => println!("Benchmark: {}", "no successful requests".bold().red()),
        }

        print_percentiles(&self.latency, Duration::from_secs_f64);
    }
}

/// Displays a rate unit as `q/s`, or `q/<duration>` for anything but one second.
struct RateUnit(Duration);

impl fmt::Display for RateUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == Duration::from_secs(1) {
            f.write_str("q/s")
        } else {
            write!(f, "q/{:?}", self.0)
        }
    }
}

fn print_percentiles<T: fmt::Debug>(sketch: &DDSketch, map: impl Fn(f64) -> T) {
    let ops = sketch.count();
    let Some(sum) = sketch.sum() else {
        return;
    };
    let quantile = |q| sketch.quantile(q).ok().flatten().map(&map);

    let (Some(p50), Some(p90), Some(p99)) = (quantile(0.5), quantile(0.9), quantile(0.99)) else {
        return;
    };
    let avg = map(sum / ops as f64);
    println!(
        "  latency avg: {:.2?}; p50: {p50:.2?}; p90: {p90:.2?}; p99: {p99:.2?}",
        avg.bold()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(succeeded: usize, failed: usize, elapsed: Duration) -> Report {
        Report {
            total: succeeded + failed,
            succeeded,
            failed,
            elapsed,
            latency: DDSketch::default(),
        }
    }

    #[test]
    fn error_percent_of_failures() {
        assert_eq!(report(0, 10, Duration::from_secs(1)).error_percent(), Some(100.0));
        assert_eq!(report(3, 1, Duration::from_secs(1)).error_percent(), Some(25.0));
    }

    #[test]
    fn no_error_percent_without_failures() {
        assert_eq!(report(100, 0, Duration::from_secs(1)).error_percent(), None);
        assert_eq!(report(0, 0, Duration::from_secs(1)).error_percent(), None);
    }

    #[test]
    fn rate_scales_with_unit() {
        let report = report(100, 0, Duration::from_millis(500));
        assert_eq!(report.rate(Duration::from_secs(1)), Some(200.0));
        assert_eq!(report.rate(Duration::from_secs(10)), Some(2000.0));
        let rate = report.rate(Duration::from_millis(100)).unwrap();
        assert!((rate - 20.0).abs() < 1e-9);
    }

    #[test]
    fn no_rate_without_successes_or_time() {
        assert_eq!(report(0, 10, Duration::from_secs(1)).rate(Duration::from_secs(1)), None);
        assert_eq!(report(10, 0, Duration::ZERO).rate(Duration::from_secs(1)), None);
    }

    #[test]
    fn builds_from_collected() {
        let collected = Collected {
            successes: vec!["a".into(), "b".into(), "c".into()],
            failures: vec!["boom".into()],
        };
        let report = Report::new(&collected, Duration::from_secs(2), DDSketch::default());
        assert_eq!((report.total, report.succeeded, report.failed), (4, 3, 1));
        assert_eq!(report.rate(Duration::from_secs(1)), Some(1.5));
    }

    #[test]
    fn displays_rate_units() {
        assert_eq!(RateUnit(Duration::from_secs(1)).to_string(), "q/s");
        assert_eq!(RateUnit(Duration::from_millis(100)).to_string(), "q/100ms");
    }

    #[test]
    fn debug_summarizes_latency() {
        let mut report = report(2, 1, Duration::from_secs(1));
        report.latency.add(0.5);
        report.latency.add(1.5);
        assert_eq!(
            format!("{report:?}"),
            "Report { total: 3, succeeded: 2, failed: 1, elapsed: 1s, latency_count: 2 }"
        );
    }

    #[test]
    fn prints_empty_report() {
        report(0, 0, Duration::ZERO).print(Duration::from_secs(1));
    }
}
