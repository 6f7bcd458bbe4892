//! growctl - closed-loop LinUCB controller for a plant-growth enclosure.
//!
//! Reads environment sensors over a serial link, picks an actuation with a
//! disjoint-arm LinUCB bandit, measures the effect after a settle delay and
//! feeds the resulting reward back into the model.

pub mod app;
pub mod bandit;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod control;
pub mod device;
pub mod error;
pub mod storage;
pub mod test_utils;

pub use error::{GrowError, Result};
