//! # Dice Server
//!
//! WebSocket gateway in front of the [`spicy_dice`] play engine.
//!
//! - [`api`]: Router, WebSocket upgrade and per-connection reader/writer
//! - [`config`]: Environment-driven server configuration
//! - [`logging`]: Structured logging setup
//! - [`metrics`]: Prometheus metrics

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
