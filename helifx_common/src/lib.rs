//! HeliFX Common Library
//!
//! This crate provides shared constants, configuration types and the output
//! driver interface for all HeliFX workspace crates. It has no hardware
//! dependencies.
//!
//! # Module Structure
//!
//! - [`consts`] - Pulse bands, capacities, default timings, reserved pins
//! - [`config`] - Configuration loading traits and types
//! - [`fx`] - FX configuration, data types and the output driver trait
//! - [`prelude`] - Common re-exports for convenience
//!
//! # Usage
//!
//! ```rust
//! use helifx_common::config::ConfigLoader;
//! use helifx_common::fx::config::HeliFxConfig;
//!
//! let cfg = HeliFxConfig::parse("[gun]\ntrigger_pin = 17\n").unwrap();
//! assert_eq!(cfg.gun.trigger_pin, Some(17));
//! ```

pub mod config;
pub mod consts;
pub mod fx;
pub mod prelude;
