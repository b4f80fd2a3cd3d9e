//! Keeps a remote engine in sync with an `outliner::Hierarchy`.
//!
//! Structural mutations of the hierarchy are turned into `RemoteMessage`s that
//! address entities by their flat sequence position. Transform edits coming
//! back from the engine are queued in a `RemoteInbox`, which transport threads
//! could share, and applied on the owner of the hierarchy.
//!
//! The transport itself is not part of this crate. Messages could be encoded
//! with `encode_message` and edits decoded with `decode_edit`.

#[macro_use]
extern crate failure;
#[macro_use]
extern crate log;
#[macro_use]
extern crate serde;

extern crate bincode;
extern crate outliner;

pub mod adapter;
pub mod errors;
pub mod messages;

pub mod prelude {
    pub use super::adapter::{RemoteInbox, RemoteParams, RemoteSync};
    pub use super::errors::{Error, Result};
    pub use super::messages::{
        decode_edit, decode_message, encode_edit, encode_message, RemoteEdit, RemoteMessage,
        TransformEdit, NO_PARENT,
    };
}
