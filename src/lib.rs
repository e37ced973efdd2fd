//! Float - A local-first organizer for prompt pods, identities, files and rituals

pub mod commands;
pub mod config;
pub mod db;
pub mod models;
pub mod notify;
pub mod store;
pub mod validation;
