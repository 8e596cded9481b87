//! Rotating pool of plausible browser user-agent strings.
//!
//! Generalizes the teacher's `src/user_agent.rs` (which only built a
//! single static UA string) into a genuine round-robin-with-jump pool,
//! as required by spec.md §4.2.

use std::sync::atomic::{AtomicUsize, Ordering};

use rand::Rng;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
];

/// Round-robin pool with a small random jump on each rotation, so
/// repeated ban-recovery retries don't cycle through UAs predictably.
pub struct UserAgentPool {
    cursor: AtomicUsize,
}

impl UserAgentPool {
    pub fn new() -> Self {
        Self { cursor: AtomicUsize::new(0) }
    }

    pub fn current(&self) -> &'static str {
        let idx = self.cursor.load(Ordering::Relaxed) % USER_AGENTS.len();
        USER_AGENTS[idx]
    }

    /// Advances the cursor by 1 plus a small random jump (0-2), then
    /// returns the new current UA.
    pub fn rotate(&self) -> &'static str {
        let jump = rand::thread_rng().gen_range(0..=2);
        self.cursor.fetch_add(1 + jump, Ordering::Relaxed);
        self.current()
    }
}

impl Default for UserAgentPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rotate_changes_current_agent() {
        let pool = UserAgentPool::new();
        let first = pool.current();
        let mut saw_change = false;
        for _ in 0..10 {
            if pool.rotate() != first {
                saw_change = true;
                break;
            }
        }
        assert!(saw_change, "rotation should eventually change the current UA");
    }

    #[test]
    fn current_is_always_a_known_agent() {
        let pool = UserAgentPool::new();
        for _ in 0..20 {
            assert!(USER_AGENTS.contains(&pool.rotate()));
        }
    }
}
