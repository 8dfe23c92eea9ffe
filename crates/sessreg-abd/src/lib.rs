//! ABD (Attiya–Bar-Noy–Dolev) shared register, classroom edition.
//!
//! Each server holds a `(version, value)` pair and adopts a write only when
//! it carries a strictly newer version. Both client operations are
//! two-phase against a majority:
//!
//! - **write(v)**: read a majority to learn the highest version, then write
//!   `(version + 1, v)` to a majority;
//! - **read()**: read a majority, pick the highest `(version, value)`,
//!   write that pair back to a majority, then return the value.
//!
//! The write-back is what makes reads well-behaved: once a reader returns a
//! value, any later read sees at least that version.

pub mod client;
pub mod protocol;
pub mod server;
pub mod transport;

pub use client::{AbdClient, AbdError};
pub use protocol::{ReadReply, ReadRequest, WriteReply, WriteRequest};
pub use server::AbdServer;
pub use transport::{AbdTransport, LocalAbdTransport, RpcAbdTransport};
