//! Experiment configuration types.

pub mod schema;
pub mod setting;

pub use schema::*;
pub use setting::Setting;
