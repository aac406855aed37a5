// Library for the binary and integration tests

pub mod buffer;
pub mod cli;
pub mod collector;
pub mod config;
pub mod device_query;
pub mod host_repo;
pub mod models;
pub mod rate_tracker;
pub mod reducer;
pub mod retry;
pub mod sampler;
pub mod store;
pub mod validator;
pub mod version;
