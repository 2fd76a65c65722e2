pub mod cluster;
pub mod engine;
pub mod helm;
pub mod retry;
