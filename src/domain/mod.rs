//! Domain Layer
//!
//! Entities, value objects, ports and pure services. Nothing in here touches
//! storage or the filesystem.

pub mod entities;
pub mod ports;
pub mod services;
pub mod value_objects;
