//! Domain types shared by the streaming pipeline and the API server.
//!
//! Nothing in this crate performs I/O: it defines the error taxonomy,
//! the job admission request and its validation, work units, and the
//! wire messages emitted over a channel.

pub mod error;
pub mod job;
pub mod message;
pub mod types;
pub mod unit;
