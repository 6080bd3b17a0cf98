//! Core domain types and pipeline stages.

pub mod candle;
pub mod frame;
pub mod grouper;
pub mod splitter;
pub mod encoder;
pub mod temporal_filter;
pub mod balancer;
pub mod neighbors;
pub mod pipeline;
pub mod config_validation;
pub mod error;
