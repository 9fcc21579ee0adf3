//! `iceflow` - experiment configuration for normalizing-flow ice free-energy runs
//!
//! This library loads, validates and rewrites the YAML documents that drive
//! a training run: flow architecture, the two thermodynamic states, the
//! training schedule and reporting settings.

pub mod cli;
pub mod config;
pub mod error;
pub mod observability;
