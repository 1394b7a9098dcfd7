//! Phase timing for the build pipeline.

use std::time::Instant;

/// Measures one pipeline phase.
pub struct Timer {
    name: String,
    start: Instant,
}

impl Timer {
    pub fn start(name: &str) -> Self {
        Self {
            name: name.to_string(),
            start: Instant::now(),
        }
    }

    /// Print the elapsed time. Phases here are short, so millis under a second.
    pub fn finish(self) {
        let elapsed = self.start.elapsed();
        if elapsed.as_secs() >= 1 {
            println!("  [{:.1}s] {}", elapsed.as_secs_f64(), self.name);
        } else {
            println!("  [{}ms] {}", elapsed.as_millis(), self.name);
        }
    }
}
