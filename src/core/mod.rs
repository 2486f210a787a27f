//! Core functionality of the launcher.
//!
//! This module contains everything the command-line front end drives:
//! the game library (metadata, scanning), the shared snapshot read by
//! companion processes, cover art, and running Ryujinx itself.

pub mod launcher;
pub mod metadata;
pub mod models;
pub mod process;
pub mod scanner;
pub mod shared_store;
pub mod thumbnails;
