pub mod ai;
pub mod automation;
pub mod config;
pub mod db;
pub mod error;
pub mod import;
pub mod lifecycle;
pub mod routes;
pub mod worker;
