//! Presence chat library.
//! This crate exposes the server modules and the client session for integration testing.
//! The binary entry point is in main.rs.

pub mod chat;
pub mod client;
pub mod config;
pub mod proto;
pub mod routes;
pub mod state;
pub mod ws;
