//! Lifecycle, routing, and the interception surface for vestibule.
//!
//! The lifecycle controller drives install and activate transitions for a
//! deployment version; the request router resolves every intercepted
//! request network-first or cache-first against the active store; the serve
//! module exposes both through a single catch-all HTTP surface.

pub mod clients;
pub mod error;
pub mod lifecycle;
pub mod router;
pub mod serve;

pub use clients::{ClientRegistry, TakeoverSignal};
pub use lifecycle::{ActivationReport, LifecycleController, LifecyclePhase};
pub use router::{RequestRouter, RoutePolicy, ServedResponse, ServedSource};
