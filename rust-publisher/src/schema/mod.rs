//! Structural schema of inbound webhook notifications.
//!
//! - `shape`: declarative object shapes and the violation-collecting walker
//! - `whatsapp`: the WhatsApp Cloud API notification shapes

pub mod shape;
pub mod whatsapp;

pub use shape::{FieldPath, Kind, ObjectShape, Violation, ViolationKind};
pub use whatsapp::WEBHOOK;
