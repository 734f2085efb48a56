//! Application Layer
//! Wires domain services to their adapters

pub mod agent;

pub use agent::Agent;
