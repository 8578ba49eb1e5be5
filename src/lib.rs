//! filedock — project file store with a negotiated upload pipeline.
//!
//! The interesting part is the large-file upload coordinator: a three-phase
//! handshake (negotiate → transfer → confirm) that decouples the slow,
//! resumable data-plane transfer from fast, stateless control-plane calls,
//! plus the soft-delete / cascade-delete lifecycle for stored objects.

pub mod config;
pub mod db;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
