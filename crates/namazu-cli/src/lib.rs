//! Namazu CLI library
//!
//! Holds the experiment-file layer so integration tests can exercise it
//! without spawning the binary.

pub mod config;
