//! Persistence for learning plans and their chapters.
//!
//! Owns the PostgreSQL schema (embedded migrations), connection pooling,
//! the row models, and the query functions the generation pipelines call.

pub mod config;
pub mod models;
pub mod pool;
pub mod queries;
