//! This crate implements loading of the configuration:
//!
//! * Loading of the configuration from a YAML file. Missing file or missing
//!   values are replaced by defaults.
//!
//! * Parsing and validation of the configuration.

mod conf;
mod io;
mod persisted;

pub use conf::*;
pub use io::load_conf;
