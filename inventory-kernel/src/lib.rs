pub mod client;
pub mod collector;
pub mod config;
pub mod credentials;
pub mod fetch;
pub mod health;
pub mod http;
pub mod models;
pub mod normalize;
pub mod poller;
pub mod reconcile;
pub mod scheduler;
pub mod state;
pub mod store;
pub mod timestamp;
