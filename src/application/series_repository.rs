// Repository trait for series data access
use crate::domain::series::{Frame, SeekerQuery};
use crate::domain::time_range::TimeRange;
use async_trait::async_trait;

#[async_trait]
pub trait SeriesRepository: Send + Sync {
    /// Fetch every frame the query produces inside `window`.
    async fn fetch_series(&self, query: &SeekerQuery, window: TimeRange) -> anyhow::Result<Vec<Frame>>;
}
