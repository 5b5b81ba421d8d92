pub mod catalog;
pub mod config;
pub mod job;
pub mod model;
pub mod processing;
pub mod remote;
pub mod scan;
pub use deadpool_diesel;
