//! Satchel Core - Value types for the checkout engine.
//!
//! This crate provides the value types used across all Satchel components:
//! - `checkout` - Pricing, shipping eligibility and delivery scheduling
//! - `cli` - Command-line driver for evaluating checkout fixtures
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no persistence, no tax or
//! catalog lookups. This keeps it lightweight and allows it to be used
//! anywhere a checkout figure has to be carried around.
//!
//! # Modules
//!
//! - [`types`] - Typed IDs, money, weights, addresses, emails, metadata and
//!   permissions

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
