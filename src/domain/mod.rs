// Domain layer - Core business models
pub mod batch;
pub mod chart;
pub mod error;
pub mod frame_merge;
pub mod series;
pub mod time_range;
