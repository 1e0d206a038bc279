use std::time::{Duration, Instant};

/// Tracks the Online/Offline link state and how long an outage lasted.
///
/// The elapsed-offline duration is measured from the first failure
/// observed during the offline period. It is display-only; correctness
/// never depends on it.
#[derive(Debug)]
pub struct ConnectivityMonitor {
    offline: bool,
    first_failure_at: Option<Instant>,
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectivityMonitor {
    /// Starts online.
    pub fn new() -> Self {
        Self {
            offline: false,
            first_failure_at: None,
        }
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Records a failure timestamp. Only the first failure of an
    /// offline period is kept.
    pub fn note_failure(&mut self, now: Instant) {
        if self.offline && self.first_failure_at.is_none() {
            self.first_failure_at = Some(now);
        }
    }

    /// Transitions to Offline. Returns `false` if already offline.
    pub fn go_offline(&mut self) -> bool {
        if self.offline {
            return false;
        }
        self.offline = true;
        self.first_failure_at = None;
        true
    }

    /// Transitions back to Online.
    ///
    /// Returns `None` if already online; otherwise `Some(elapsed)`,
    /// where `elapsed` is the time since the first offline failure
    /// (`None` inside when no failure was observed).
    pub fn go_online(&mut self, now: Instant) -> Option<Option<Duration>> {
        if !self.offline {
            return None;
        }
        self.offline = false;
        let elapsed = self.first_failure_at.take().map(|t| now.duration_since(t));
        Some(elapsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_online() {
        let m = ConnectivityMonitor::new();
        assert!(!m.is_offline());
    }

    #[test]
    fn offline_transition_fires_once() {
        let mut m = ConnectivityMonitor::new();
        assert!(m.go_offline());
        assert!(m.is_offline());
        assert!(!m.go_offline());
    }

    #[test]
    fn online_without_offline_is_noop() {
        let mut m = ConnectivityMonitor::new();
        assert!(m.go_online(Instant::now()).is_none());
    }

    #[test]
    fn elapsed_from_first_failure() {
        let mut m = ConnectivityMonitor::new();
        m.go_offline();

        let t0 = Instant::now();
        m.note_failure(t0);
        // Later failures do not reset the start.
        m.note_failure(t0 + Duration::from_secs(5));

        let elapsed = m.go_online(t0 + Duration::from_secs(10)).unwrap();
        assert_eq!(elapsed, Some(Duration::from_secs(10)));
        assert!(!m.is_offline());
    }

    #[test]
    fn no_failure_means_unknown_elapsed() {
        let mut m = ConnectivityMonitor::new();
        m.go_offline();
        let elapsed = m.go_online(Instant::now()).unwrap();
        assert_eq!(elapsed, None);
    }

    #[test]
    fn failure_while_online_is_ignored() {
        let mut m = ConnectivityMonitor::new();
        m.note_failure(Instant::now());
        m.go_offline();
        // Timestamp was not recorded while online.
        let elapsed = m.go_online(Instant::now()).unwrap();
        assert_eq!(elapsed, None);
    }
}
