//! Wire protocol for the pbxd telephone exchange.
//!
//! Clients speak a newline-terminated text protocol: one command per line
//! (`pickup`, `hangup`, `dial <ext>`, `chat <message>`), and every command
//! elicits exactly one reply line carrying the resulting state of the
//! client's telephone unit. Peers additionally receive a reply whenever
//! their own observable state changes, and `CHAT <message>` lines while a
//! call is connected.
//!
//! The `tokio` feature (on by default) adds [`codec::PbxCodec`], a framed
//! line codec for use with `tokio_util::codec`.

mod command;
mod reply;
mod state;

pub mod error;

#[cfg(feature = "tokio")]
pub mod codec;

pub use command::Command;
pub use reply::Reply;
pub use state::TuState;

/// Maximum accepted line length in bytes, terminator included.
pub const MAX_LINE_LEN: usize = 1024;
