// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod dashboard_time_range;
pub mod influx_repository;
