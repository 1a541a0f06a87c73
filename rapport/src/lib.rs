//! Rapport library
//!
//! Offline-first personal CRM core: contacts, call notes, tasks and
//! projects kept in a local store for guests and synchronized with a
//! per-user remote document store once signed in.

pub mod app;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod storage;
pub mod sync;
pub mod views;
