//! # Sofiya Rental
//!
//! Rental entitlements and the access gate built on them.
//!
//! ## Author
//! - Sofiya Bot Team
//! - Version: 0.1.0
//! - Date: 2026-10-01
//!
//! ## Components
//! - [`RentalManager`]: create, extend, expire and delete rentals
//! - [`AccessController`]: rental or trial decision per group, opening the
//!   trial on first contact
//!
//! Both read time through the store's clock, so tests drive them with a
//! `ManualClock`.

#![forbid(unsafe_code)]

pub mod access;
pub mod error;
pub mod lifecycle;

pub use access::{AccessController, AccessDecision};
pub use error::{RentalError, RentalResult};
pub use lifecycle::RentalManager;
