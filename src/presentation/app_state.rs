// Application state for HTTP handlers
use crate::application::seeker_service::SeekerHandle;
use crate::infrastructure::dashboard_time_range::DashboardTimeRange;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub seeker: SeekerHandle,
    pub host: Arc<DashboardTimeRange>,
}
