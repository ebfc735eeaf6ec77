mod connection_source;
mod controller;
mod policy_engine;

pub use connection_source::ConnectionSource;
pub use controller::Rbac0Controller;
pub use policy_engine::{PolicyEngine, PolicyRule};
