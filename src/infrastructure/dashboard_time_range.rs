// In-process host time range backed by a watch channel
use crate::application::host::HostTimeRange;
use crate::domain::time_range::TimeRange;
use tokio::sync::watch;

#[derive(Debug)]
pub struct DashboardTimeRange {
    sender: watch::Sender<TimeRange>,
}

impl DashboardTimeRange {
    pub fn new(initial: TimeRange) -> Self {
        let (sender, _) = watch::channel(initial);
        Self { sender }
    }
}

impl HostTimeRange for DashboardTimeRange {
    fn current(&self) -> TimeRange {
        *self.sender.borrow()
    }

    fn subscribe(&self) -> watch::Receiver<TimeRange> {
        self.sender.subscribe()
    }

    /// Subscribers only wake up when the range actually changes.
    fn set_time_range(&self, range: TimeRange) {
        self.sender.send_if_modified(|current| {
            if *current == range {
                return false;
            }
            *current = range;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_real_changes_notify() {
        let host = DashboardTimeRange::new(TimeRange { from: 0, to: 10 });
        let mut rx = host.subscribe();

        host.set_time_range(TimeRange { from: 0, to: 10 });
        assert!(!rx.has_changed().unwrap());

        host.set_time_range(TimeRange { from: 5, to: 10 });
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), TimeRange { from: 5, to: 10 });
        assert_eq!(host.current(), TimeRange { from: 5, to: 10 });
    }
}
