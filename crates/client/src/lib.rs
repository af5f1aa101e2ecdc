//! Client code for urlttl.
//!
//! This crate provides the policy-aware cache session, the request type it
//! keys on, and the reqwest transport used outside of tests.

pub mod fetch;
pub mod request;
pub mod session;
pub mod transport;

pub use fetch::{FetchClient, FetchConfig};
pub use request::Request;
pub use session::{PolicySession, SessionResponse};
pub use transport::Transport;

pub use reqwest::Method;
