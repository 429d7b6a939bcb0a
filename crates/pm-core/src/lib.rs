//! Puppetmaster scheduling core.
//!
//! A hardware-accelerated transaction scheduler, modelled in software as a
//! single-threaded cooperative state machine ticked once per logical cycle.
//! Clients submit transactions declaring fixed-size read/write object sets;
//! the pipeline renames addresses to compact names ([`renamer`]), selects a
//! maximal conflict-free subset of a scheduling pool each round
//! ([`scheduler`]), and dispatches winners to a fixed pool of execution
//! stubs ([`puppet`]), all coordinated by [`dispatcher::Dispatcher`].
//!
//! This crate implements no transaction *execution* semantics, no
//! durability, and no dynamic resizing — every pool, table, and bit-vector
//! width is a compile-time constant (see [`config`]).

pub mod arbiter;
pub mod bitset;
pub mod config;
pub mod dispatcher;
pub mod ident;
pub mod puppet;
pub mod renamer;
pub mod scheduler;
pub mod shard;

pub use config::Config;
pub use dispatcher::{Dispatcher, Event, EventStatus};
pub use ident::{ObjectAddress, Tid};
pub use renamer::{InputTransaction, Object, RenamerError};
