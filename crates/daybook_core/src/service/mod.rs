//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate reconcilers and the document store into session-level APIs.
//! - Keep presentation layers decoupled from store details.

pub mod tracker_service;
