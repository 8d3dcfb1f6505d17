pub mod backend;
pub mod config;
pub mod coordinates;
pub mod error;
pub mod job;
pub mod models;
pub mod parser;
pub mod prompts;
pub mod retry;
pub mod server;
pub mod service;

pub use crate::config::Config;
pub use crate::coordinates::{format_coordinates, parse_coordinates};
pub use crate::error::{LocatorError, Result};
pub use crate::models::{Coordinate, PhoneNumber, PsapRecord};
pub use crate::parser::{parse_multiple, parse_single};
pub use crate::service::PsapLocator;
