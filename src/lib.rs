//! PlateSmith - controller core for the seed plate engraving appliance.
//!
//! This library exposes modules for use in integration tests.

pub mod app;
pub mod config;
pub mod confirm;
pub mod context;
pub mod engrave;
pub mod input;
pub mod multipart;
pub mod plan;
pub mod platform;
pub mod protocol;
pub mod render;
pub mod saver;
pub mod scan;
pub mod screens;
pub mod testing;
pub mod validate;
pub mod wallet;
