//! API Module
//!
//! Application-facing entry points. Components under `logic` stay usable on
//! their own; `Sdk` wires them together from one configuration.

pub mod sdk;


pub use sdk::{RemovalReport, Sdk, SensorBatch, UploadReceipt, UploadStatus};
