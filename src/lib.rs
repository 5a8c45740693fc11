//! Pricegate - Rate-Limited UDP Price Lookup Service
//!
//! This crate answers short product lookups over UDP. Every remote peer is
//! tracked by address, held to a request quota, and forgotten again once it
//! has been idle long enough.

pub mod clock;
pub mod config;
pub mod error;
pub mod ratelimit;
pub mod server;
