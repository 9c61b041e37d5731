pub mod activity;
pub mod config;
pub mod dbaasp;
pub mod domain;
pub mod error;
pub mod fs_util;
pub mod mass;
pub mod merge;
pub mod output;
pub mod pipeline;
pub mod self_assembly;
pub mod tables;
pub mod units;
