// Host dashboard time range contract
use crate::domain::time_range::TimeRange;
use tokio::sync::watch;

/// The dashboard that embeds the seeker. It owns the "real" time range; the
/// seeker reads it, follows its changes and pushes finalized selections back.
pub trait HostTimeRange: Send + Sync {
    fn current(&self) -> TimeRange;

    fn subscribe(&self) -> watch::Receiver<TimeRange>;

    fn set_time_range(&self, range: TimeRange);
}
