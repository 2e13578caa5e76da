//! HTTP handlers

pub mod artifacts;
pub mod auth;
pub mod health;
pub mod position;
