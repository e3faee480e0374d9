// Common library: settings, Redis connection resolution and handle, telemetry

pub mod config;
pub mod db;
pub mod errors;
pub mod resolver;
pub mod retry;
pub mod telemetry;
