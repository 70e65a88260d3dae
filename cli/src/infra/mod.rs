//! Infrastructure layer — concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution,
//! filesystem access, HTTP, persisted state and the instance lock.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` are forbidden.

pub mod command_runner;
pub mod config;
pub mod fs;
pub mod http;
pub mod lock;
pub mod state;
