// LNP/BP Core Library implementing LNPBP specifications & standards
// Written in 2020-2024 by
//     Dr. Maxim Orlovsky <orlovsky@pandoracore.com>
//
// To the extent possible under law, the author(s) have dedicated all
// copyright and related and neighboring rights to this software to
// the public domain worldwide. This software is distributed without
// any warranty.
//
// You should have received a copy of the MIT License
// along with this software.
// If not, see <https://opensource.org/licenses/MIT>.

//! Core of a Lightning Network node: the wire codec (C1), the per-channel
//! commitment/HTLC state machine (C2), the peer link driving it (C3), the
//! HTLC switch tying links together (C4), the contract court resolving
//! on-chain disputes (C5), and the durable channel database (C6).
//!
//! Everything above the wire codec is transport-, onion- and chain-source-
//! agnostic: a concrete node wires this crate's tasks to a noise transport,
//! an onion router and a block source, none of which live here.

#![recursion_limit = "256"]
// Coding conventions
#![deny(
    non_upper_case_globals,
    non_camel_case_types,
    non_snake_case,
    unused_mut,
    unused_imports,
    dead_code,
    //missing_docs
)]

#[macro_use]
extern crate amplify;
#[macro_use]
extern crate strict_encoding;

#[cfg(feature = "serde")]
#[macro_use]
extern crate serde_with;
#[cfg(feature = "serde")]
extern crate serde_crate as serde;

pub mod chan;
pub mod config;
pub mod court;
pub mod db;
pub mod error;
pub mod link;
pub mod node;
pub mod switch;
pub mod wire;

pub use chan::Channel;
pub use config::NodeConfig;
pub use error::Error;
pub use node::{Node, NodeCommand, NodeHandle};
