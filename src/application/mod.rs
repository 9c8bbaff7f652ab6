// Application layer - Use cases and collaborator contracts
pub mod batch_cache;
pub mod chart_binding;
pub mod clock;
pub mod host;
pub mod interaction;
pub mod seeker_engine;
pub mod seeker_service;
pub mod series_repository;
