pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod observability;
pub mod server;
pub mod service;
pub mod snapshot;
pub mod upstream;
pub mod wire;
