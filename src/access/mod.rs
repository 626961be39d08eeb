pub mod gate;
pub mod policy;

pub use gate::{AccessError, AccessGate, UsageLine, UsageReport};
pub use policy::{Policy, Requirement};
