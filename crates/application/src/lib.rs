//! Application services and ports.

#![forbid(unsafe_code)]

mod controller_slot;
mod rbac0_ports;
mod rbac0_service;

pub use controller_slot::Rbac0Slot;
pub use rbac0_ports::{ConnectionSource, PolicyEngine, PolicyRule, Rbac0Controller};
pub use rbac0_service::{Rbac0Service, SourceController};
