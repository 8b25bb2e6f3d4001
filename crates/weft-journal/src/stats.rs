//! Per-task execution statistics

use serde::{Deserialize, Serialize};

/// Counts and runtime moments for one task name
///
/// Runtime moments use Welford's online update, and [`merge`](Self::merge)
/// combines two partial results exactly (Chan et al.), so per-thread
/// collectors can be folded together after the fact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskStats {
    pub executed: u64,
    /// Dequeued while stale and pushed back (retry mode)
    pub retried: u64,
    /// Stale at submission and parked (precompute mode)
    pub waited: u64,
    pub faulted: u64,
    /// Runs whose duration was recorded
    pub timed_runs: u64,
    pub total_runtime_ns: u64,
    pub mean_runtime_ns: f64,
    /// Sum of squared deviations from the mean
    pub sum_squares_ns: f64,
}

impl TaskStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one run duration into the moments
    pub fn record_runtime(&mut self, nanos: u64) {
        self.timed_runs += 1;
        self.total_runtime_ns = self.total_runtime_ns.saturating_add(nanos);

        let x = nanos as f64;
        let previous_mean = self.mean_runtime_ns;
        self.mean_runtime_ns += (x - previous_mean) / self.timed_runs as f64;
        self.sum_squares_ns += (x - self.mean_runtime_ns) * (x - previous_mean);
    }

    /// Population variance of recorded runtimes
    pub fn variance(&self) -> Option<f64> {
        (self.timed_runs > 0).then(|| self.sum_squares_ns / self.timed_runs as f64)
    }

    pub fn std_dev(&self) -> Option<f64> {
        self.variance().map(f64::sqrt)
    }

    /// Combine another partial result into this one
    pub fn merge(&mut self, other: &TaskStats) {
        let n_a = self.timed_runs as f64;
        let n_b = other.timed_runs as f64;

        if other.timed_runs == 0 {
            // keep ours
        } else if self.timed_runs == 0 {
            self.mean_runtime_ns = other.mean_runtime_ns;
            self.sum_squares_ns = other.sum_squares_ns;
        } else {
            let delta = other.mean_runtime_ns - self.mean_runtime_ns;
            let n = n_a + n_b;
            self.mean_runtime_ns = (n_a * self.mean_runtime_ns + n_b * other.mean_runtime_ns) / n;
            self.sum_squares_ns += other.sum_squares_ns + delta * delta * n_a * n_b / n;
        }

        self.timed_runs += other.timed_runs;
        self.total_runtime_ns = self.total_runtime_ns.saturating_add(other.total_runtime_ns);
        self.executed += other.executed;
        self.retried += other.retried;
        self.waited += other.waited;
        self.faulted += other.faulted;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn naive(samples: &[u64]) -> (f64, f64) {
        let n = samples.len() as f64;
        let mean = samples.iter().map(|&x| x as f64).sum::<f64>() / n;
        let var = samples
            .iter()
            .map(|&x| (x as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        (mean, var)
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-6 * a.abs().max(b.abs()).max(1.0)
    }

    #[test]
    fn test_online_moments_match_naive() {
        let samples = [120, 80, 100, 300, 95, 101, 99];
        let mut stats = TaskStats::new();
        for &s in &samples {
            stats.record_runtime(s);
        }
        let (mean, var) = naive(&samples);
        assert!(close(stats.mean_runtime_ns, mean));
        assert!(close(stats.variance().unwrap(), var));
        assert_eq!(stats.total_runtime_ns, samples.iter().sum::<u64>());
    }

    #[test]
    fn test_empty_has_no_variance() {
        assert_eq!(TaskStats::new().variance(), None);
        assert_eq!(TaskStats::new().std_dev(), None);
    }

    #[test]
    fn test_merge_equals_combined() {
        let left = [10, 20, 30, 40];
        let right = [1000, 1100, 900];

        let mut a = TaskStats::new();
        left.iter().for_each(|&s| a.record_runtime(s));
        a.executed = 4;
        a.retried = 2;
        let mut b = TaskStats::new();
        right.iter().for_each(|&s| b.record_runtime(s));
        b.executed = 3;
        b.faulted = 1;

        a.merge(&b);

        let all: Vec<u64> = left.iter().chain(right.iter()).copied().collect();
        let (mean, var) = naive(&all);
        assert_eq!(a.timed_runs, 7);
        assert!(close(a.mean_runtime_ns, mean));
        assert!(close(a.variance().unwrap(), var));
        assert_eq!((a.executed, a.retried, a.faulted), (7, 2, 1));
    }

    #[test]
    fn test_merge_into_empty_takes_other() {
        let mut other = TaskStats::new();
        other.record_runtime(50);
        other.record_runtime(70);

        let mut stats = TaskStats::new();
        stats.merge(&other);
        assert_eq!(stats, other);

        stats.merge(&TaskStats::new());
        assert_eq!(stats, other);
    }
}
