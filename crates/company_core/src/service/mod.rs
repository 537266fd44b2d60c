//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Keep caller layers (CLI, HTTP) decoupled from storage details.

pub mod company_service;
