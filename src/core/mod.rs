//! Core vault components.

pub mod config;
pub mod doctor;
pub mod document;
pub mod dotenv;
pub mod files;
pub mod guard;
pub mod index;
pub mod init;
pub mod keys;
pub mod listing;
pub mod secrets;
pub mod store;
pub mod sync;
pub mod validate;
