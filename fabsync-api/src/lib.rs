//! Client library for the fabric control-plane API.
//!
//! Exposes per-kind capability traits (List / Add / Update / Delete) plus a
//! reqwest-backed implementation. Every response is wrapped in a structured
//! success/failure envelope; Add calls return the numeric ID assigned by the
//! control plane.

pub mod client;
pub mod envelope;
pub mod error;
pub mod http;
pub mod types;

pub use client::{ClusterApi, ControlPlane, RefApi, ServerApi, TemplateApi, VpcApi};
pub use envelope::{AddReply, Envelope};
pub use error::RemoteError;
pub use http::HttpControlPlane;
