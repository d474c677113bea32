//! Background services

pub mod signature_monitor;

pub use signature_monitor::{MonitorState, SignatureEvent, SignatureMonitor};
