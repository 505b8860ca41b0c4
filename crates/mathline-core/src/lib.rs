//! Core building blocks for talking to a symbolic-computation kernel.
//!
//! This crate provides:
//! - `PacketTag` - The fixed set of packet discriminants the kernel emits
//! - `Link` - The transport primitives a kernel connection exposes
//! - `MessageCache` - Pending diagnostics awaiting print-or-discard
//! - `ImageAccumulator` - Reassembly of multi-packet image payloads
//! - `SessionConfig` - Configuration consumed by the session engine
//! - `ScriptedLink` - In-memory link (feature: memory)

pub mod config;
pub mod image;
pub mod link;
pub mod message_cache;
pub mod packet;
pub mod token;

#[cfg(feature = "memory")]
pub mod scripted;

pub use config::{LineEditing, LinkConfig, SessionConfig};
pub use image::{Image, ImageAccumulator};
pub use link::{Link, LinkError, LinkStatus};
pub use message_cache::{MessageCache, PendingMessage};
pub use packet::PacketTag;
pub use token::Token;

#[cfg(feature = "memory")]
pub use scripted::ScriptedLink;
