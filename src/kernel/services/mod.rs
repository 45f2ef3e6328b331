//! Services layer (ports + adapters).
//!
//! - `ports`: contracts for the collaborators the highlighter talks to (frontend, host) plus settings types.
//! - `adapters`: OS/runtime specific implementations (worker processes, files, async).

pub mod adapters;
pub mod ports;
