mod deployment;
mod service;

pub use deployment::*;
pub use service::*;
