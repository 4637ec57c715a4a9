//! The four pipeline stages: evolve, domain, interface, problems.
//!
//! Each stage reads a JSON dataset, pushes every item through its generation
//! workflow on the worker pool, and writes the output dataset. Stages differ
//! in how they treat failed items: domain generation drops them, interface
//! generation retains them with an empty interface, problem generation drops
//! them with a warning.

pub mod domain;
pub mod evolve;
pub mod interface;
pub mod problems;

pub use domain::DomainStage;
pub use evolve::EvolveStage;
pub use interface::InterfaceStage;
pub use problems::ProblemsStage;

/// What a stage run did, for the end-of-run report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl StageSummary {
    pub fn new(total: usize, succeeded: usize) -> Self {
        Self {
            total,
            succeeded,
            failed: total - succeeded,
        }
    }
}

impl std::fmt::Display for StageSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} item(s): {} succeeded, {} failed",
            self.total, self.succeeded, self.failed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_counts() {
        let summary = StageSummary::new(10, 7);
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.to_string(), "10 item(s): 7 succeeded, 3 failed");
    }
}
