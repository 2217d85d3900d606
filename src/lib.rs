// Core infrastructure modules
pub mod core;

// Configuration (deployment-mode connection profiles)
pub mod config;
