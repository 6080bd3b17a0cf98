//! Port traits at the pipeline's I/O seams.

pub mod candle_port;
pub mod config_port;
pub mod dataset_port;
