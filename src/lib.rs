//! Tracker Assistant - chat front-end for Traccar
//!
//! Users log in to their Traccar account from a chat conversation, pick one of
//! their vehicles and locate, lock, unlock or replay its recent route.

pub mod command;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod formatter;
pub mod phone;
pub mod session;
pub mod tracking;
pub mod transport;

pub use error::{Error, Result};
