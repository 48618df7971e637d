//! # Envelope Cache
//!
//! On-disk persistence for computed envelopes, keyed by source file identity.
//!
//! Every entry is one file in a dedicated cache directory, named by a
//! 64-bit rolling hash of `"<path>|<mtime-epoch-seconds>"` and holding the
//! raw 8192-byte envelope blob. A changed modification time changes the key,
//! so stale entries are superseded implicitly rather than deleted; directory
//! growth is an operational concern for the host application, not this crate.
//!
//! Cache failures never reach the foreground: a failed read degrades to a
//! recompute and a failed write leaves the result unpersisted.

mod key;
mod store;

pub use key::{AudioFileRef, CacheKey};
pub use store::EnvelopeCache;
