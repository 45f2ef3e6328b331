//! taghl - semantic tag highlighting for editor buffers
//!
//! Module layout:
//! - kernel::highlight: group tables, token classification, call batches
//! - kernel::services::ports: frontend/host contracts and settings
//! - kernel::services::adapters: worker processes, pipe framing, host output, background runtime
//! - kernel::session: per-buffer namespaces and dispatch

pub mod kernel;
