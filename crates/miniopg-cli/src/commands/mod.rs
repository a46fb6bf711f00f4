pub mod browse;
pub mod buckets;
pub mod common;
pub mod completions;
pub mod config;
pub mod serve;
pub mod upload;
