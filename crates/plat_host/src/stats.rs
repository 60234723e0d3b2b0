//! Result tracking for the local memory sweep.
//!
//! Counts passing and failing runs and records how many completion polls
//! each run needed, which shows how close a slow engine came to being
//! declared hung.

/// Number of poll-trip histogram buckets. The last one collects the rest.
const TRIP_BUCKETS: usize = 10;

/// Pass/fail counters and completion-poll distribution for a sweep.
#[derive(Debug, Clone, Default)]
pub struct SweepStats {
    pub passed: u64,
    pub failed: u64,
    /// Write-only runs, which pass without a hash comparison.
    pub unchecked: u64,
    pub max_trips: u32,
    pub trip_buckets: [u64; TRIP_BUCKETS],
}

impl SweepStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one completed run.
    ///
    /// # Arguments
    ///
    /// * `passed` - Whether the hardware hash matched (or was not checked)
    /// * `checked` - Whether a hash comparison was made at all
    /// * `trips` - Failed completion polls before the engine went idle
    pub fn record(&mut self, passed: bool, checked: bool, trips: u32) {
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        if !checked {
            self.unchecked += 1;
        }

        self.max_trips = self.max_trips.max(trips);
        let idx = (trips as usize).min(TRIP_BUCKETS - 1);
        self.trip_buckets[idx] += 1;
    }

    pub fn total(&self) -> u64 {
        self.passed + self.failed
    }

    /// Folds another engine's results into this one.
    pub fn merge(&mut self, other: &SweepStats) {
        self.passed += other.passed;
        self.failed += other.failed;
        self.unchecked += other.unchecked;
        self.max_trips = self.max_trips.max(other.max_trips);
        for (mine, theirs) in self.trip_buckets.iter_mut().zip(other.trip_buckets.iter()) {
            *mine += theirs;
        }
    }

    pub fn print_report(&self) {
        println!("\nSweep Results");
        println!("Runs:      {}", self.total());
        println!("Passed:    {} ({} write-only)", self.passed, self.unchecked);
        println!("Failed:    {}", self.failed);
        println!("Max polls: {}", self.max_trips);

        println!("Completion polls:");
        for (i, &count) in self.trip_buckets.iter().enumerate() {
            if count > 0 {
                let more = if i == TRIP_BUCKETS - 1 { "+" } else { "" };
                println!("[{:2}{}]: {}", i, more, count);
            }
        }
    }
}
