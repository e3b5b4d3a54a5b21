mod application;
mod bus;
mod config;
mod configurator;
mod constants;
mod errors;
mod repository;
mod service;
pub mod utils;

pub use application::*;
pub use bus::*;
pub use config::*;
pub use configurator::*;
pub use errors::*;
pub use repository::*;
pub use service::*;
pub use utils::*;

pub use constants::CONFIGURATOR_HOSTNAME;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
