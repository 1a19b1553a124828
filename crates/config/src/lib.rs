//! Configuration module for the Cammy uploader and organizer
//!
//! Holds the typed settings both binaries are built from. Values come from
//! command-line flags; everything not exposed as a flag keeps the defaults
//! defined here.

pub mod config;

pub use config::*;
