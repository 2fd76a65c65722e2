pub mod config;
pub mod dag;
pub mod executor;
pub mod output;
pub mod stack;
pub mod state;
