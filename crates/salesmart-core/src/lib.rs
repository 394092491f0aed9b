pub mod config;
pub mod credentials;
pub mod db;
pub mod dimensions;
pub mod driver;
pub mod error;
pub mod gateway;
pub mod marts;
pub mod outputs;
pub mod quarantine;
pub mod reconcile;
pub mod sample;
pub mod schema;
pub mod staging;
pub mod warehouse;
pub mod workspace;
