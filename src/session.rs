use crate::chain::ChainStats;

/// The persistent walker position carried between sampling commands.
#[derive(Debug, Clone)]
pub struct Session {
    position: Box<[f64]>,
    invocation_count: u64,
    totals: ChainStats,
}

impl Session {
    /// The caller must make sure `start` is feasible.
    pub fn new(start: &[f64]) -> Self {
        Session {
            position: start.into(),
            invocation_count: 0,
            totals: ChainStats::default(),
        }
    }

    pub fn current_position(&self) -> &[f64] {
        &self.position
    }

    /// Replace the position with the end point of a sampling call.
    pub fn record(&mut self, position: Box<[f64]>, stats: &ChainStats) {
        assert!(position.len() == self.position.len());
        self.position = position;
        self.invocation_count += 1;
        self.totals.merge(stats);
    }

    pub fn invocation_count(&self) -> u64 {
        self.invocation_count
    }

    /// Proposal counters summed over every recorded sampling call.
    pub fn totals(&self) -> &ChainStats {
        &self.totals
    }
}
