pub mod assessment;
pub mod auth;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod observability;
pub mod regional;
pub mod storage;
pub mod worker;
