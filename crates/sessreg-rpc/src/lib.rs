//! Wire transport for the sessreg register crates.
//!
//! The protocol crates consume one primitive: `invoke(peer, method, request)`
//! returning a typed reply or a transport error. This crate provides it over
//! TCP with newline-delimited JSON frames, plus the matching server side:
//!
//! - [`RpcClient`]: outgoing side with a bounded connection cache, one
//!   request/reply exchange at a time per peer, per-call timeout.
//! - [`Service`] + [`RpcServer`]: incoming side; a service dispatches on the
//!   method name, the server runs one task per inbound connection.
//!
//! Framing is deliberately simple: each request is one JSON object on one
//! line, each reply is one JSON object on the next line. Replicas exchange
//! small messages at low rates; the single-in-flight discipline per
//! connection keeps correlation trivial.

pub mod client;
pub mod server;
pub mod wire;

pub use client::RpcClient;
pub use server::{RpcServer, Service};
pub use wire::{Connection, RpcError};
