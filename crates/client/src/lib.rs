//! Network collaborator for vestibule.
//!
//! This crate provides the HTTP fetch pipeline the lifecycle controller and
//! request router resolve against, behind an object-safe trait so both can
//! be exercised without a live network.

pub mod fetch;

pub use fetch::{FetchClient, FetchConfig, FetchResponse, Network, canonicalize};
