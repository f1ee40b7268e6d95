//! Shared test fixtures for the OWS configuration workspace.
//!
//! Dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`config_dir`] — [`ConfigDir`](config_dir::ConfigDir), a temporary
//!   directory of JSON configuration documents
//! - [`fixtures`] — sample configuration trees and datacube products

pub mod config_dir;
pub mod fixtures;
