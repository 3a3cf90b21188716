//! Domain layer: request/image entities, errors, and stage ports.

pub mod entities;
pub mod errors;
pub mod ports;
