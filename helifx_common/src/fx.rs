//! FX domain types shared between the control core and its consumers.
//!
//! - [`config`] - Gun, smoke, servo and GPIO configuration with validation
//! - [`driver`] - Output transport trait
//! - [`types`] - Timestamps, pulse readings, gun status and events

pub mod config;
pub mod driver;
pub mod types;
