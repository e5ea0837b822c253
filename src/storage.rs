//! Storage subsystem
//!
//! This module provides the document store sessions live in. Every backend
//! keeps one document per join code and pushes it to watchers on change.
//!
//! Components:
//! - `storage_trait`: the Storage trait defining a uniform API.
//! - `types`: patch operations, the shared merge routine and session filters.
//! - `memory_storage`: process-local backend, the default.
//! - `file_storage`: one JSON document per session on disk.
//! - `database_storage`: ORM-based SQLite implementation using SeaORM.
//! - `db_entities`: SeaORM entity models for the database backend.
//! - `session_filter`: helpers to build session queries.
//! - `subscription`: per-session watch channels.

pub mod database_storage;
pub mod db_entities;
pub mod file_storage;
pub mod memory_storage;
pub mod session_filter;
pub mod storage_trait;
pub mod subscription;
pub mod types;
