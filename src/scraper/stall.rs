/// Counts consecutive rounds that produced nothing new.
#[derive(Debug, Clone)]
pub struct StallCounter {
    streak: u32,
    limit: u32,
}

impl StallCounter {
    pub fn new(limit: u32) -> Self {
        Self {
            streak: 0,
            limit: limit.max(1),
        }
    }

    /// Record a round with no new content; returns the new streak
    pub fn miss(&mut self) -> u32 {
        self.streak += 1;
        self.streak
    }

    /// Record progress
    pub fn reset(&mut self) {
        self.streak = 0;
    }

    pub fn streak(&self) -> u32 {
        self.streak
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn is_stalled(&self) -> bool {
        self.streak >= self.limit
    }
}
