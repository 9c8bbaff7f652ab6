// Time seeker - Context window, selection and batch-cached series for a dashboard
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
