pub mod common;
pub mod config;
pub mod map_reduce_apps;
pub mod map_reduce_seq;
pub mod mr_parallel;
pub mod partition;
pub mod storage;
pub mod telemetry;
