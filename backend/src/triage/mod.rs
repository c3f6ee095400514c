//! The inbox triage core: time-budgeted classification pipeline, label
//! reconciler, and bulk action executor.

use std::time::{Duration, Instant};

pub mod actions;
pub mod pipeline;
pub mod reconciler;

/// Tuning knobs for one scan run.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Wall-clock ceiling for the whole pipeline (default: 120s)
    pub time_budget: Duration,
    /// Absolute cap on ids discovered per scan
    pub hard_ceiling: usize,
    /// Message cap when the request names none
    pub default_max: usize,
    /// Page size for id discovery
    pub page_size: u32,
    /// Metadata fetches issued concurrently per batch
    pub fetch_batch: usize,
    /// Messages per LLM classification call
    pub llm_batch: usize,
    /// Cost cap: LLM batches issued per scan
    pub max_llm_batches: usize,
    /// Messages per bulk modify call
    pub action_batch: usize,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            time_budget: Duration::from_secs(120),
            hard_ceiling: 5_000,
            default_max: 500,
            page_size: 500,
            fetch_batch: 50,
            llm_batch: 50,
            max_llm_batches: 2,
            action_batch: 100,
        }
    }
}

impl ScanConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
            std::env::var(name)
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        }

        Self {
            time_budget: Duration::from_secs(env_or(
                "SCAN_TIME_BUDGET_SECS",
                defaults.time_budget.as_secs(),
            )),
            hard_ceiling: env_or("SCAN_HARD_CEILING", defaults.hard_ceiling),
            default_max: env_or("SCAN_DEFAULT_MAX", defaults.default_max),
            page_size: env_or("SCAN_PAGE_SIZE", defaults.page_size),
            fetch_batch: env_or("SCAN_FETCH_BATCH", defaults.fetch_batch),
            llm_batch: env_or("SCAN_LLM_BATCH", defaults.llm_batch),
            max_llm_batches: env_or("SCAN_MAX_LLM_BATCHES", defaults.max_llm_batches),
            action_batch: env_or("ACTION_BATCH_SIZE", defaults.action_batch),
        }
    }
}

/// Wall-clock budget threaded through every pipeline phase.
///
/// Cancellation is purely budget-driven: each phase checks its checkpoint
/// before starting a new unit of work. Nothing preempts work already in
/// flight.
#[derive(Debug, Clone, Copy)]
pub struct ScanBudget {
    started: Instant,
    total: Duration,
}

impl ScanBudget {
    pub fn new(total: Duration) -> Self {
        Self {
            started: Instant::now(),
            total,
        }
    }

    /// Has the given fraction of the total budget elapsed?
    pub fn past(&self, fraction: f64) -> bool {
        self.started.elapsed() >= self.total.mul_f64(fraction)
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_checkpoints_advance_with_time() {
        let budget = ScanBudget::new(Duration::from_millis(50));
        assert!(!budget.past(1.0));
        std::thread::sleep(Duration::from_millis(30));
        assert!(budget.past(0.3));
        assert!(!budget.past(1.0));
    }

    #[test]
    fn config_defaults_are_sane() {
        let config = ScanConfig::default();
        assert_eq!(config.hard_ceiling, 5_000);
        assert_eq!(config.max_llm_batches, 2);
        assert!(config.fetch_batch > 0);
    }
}
