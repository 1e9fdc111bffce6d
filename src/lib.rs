pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod fetcher;
pub mod freshness;
pub mod handlers;
pub mod orchestrator;
pub mod parser;
pub mod reading;
pub mod region;
pub mod scheduler;
pub mod server;
pub mod sources;
