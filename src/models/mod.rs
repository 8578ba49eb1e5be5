//! Core data models for the file-organizing service.
//!
//! These entities represent the logical structure of projects, folders and
//! stored files. They map cleanly to database tables via `sqlx::FromRow` and
//! serialize naturally as JSON via `serde`.

pub mod file_record;
pub mod folder;
pub mod project;
