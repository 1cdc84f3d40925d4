pub mod api;
pub mod config;
pub mod controller;
pub mod flow;
pub mod metrics;
pub mod packet;
pub mod session;
pub mod stats;
