// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! # spead - Streaming Protocol for Exchanging Astronomical Data
//!
//! A Rust implementation of the SPEAD wire protocol: a packet-level
//! codec for heaps of typed, named items, built for radio-astronomy
//! and other high-throughput instrument data streams.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use spead::codec::bits::{FormatComponent, FormatKind};
//! use spead::descriptor::{Descriptor, Shape};
//! use spead::dialect::Dialect;
//! use spead::item_group::ItemGroup;
//! use spead::value::{Scalar, Value};
//! use spead::{transmitter, Result};
//!
//! fn main() -> Result<()> {
//!     let dialect = Dialect::default();
//!     let mut group = ItemGroup::new(dialect);
//!     group.declare_item(Descriptor {
//!         id: 0x1000,
//!         name: "counter".into(),
//!         description: "a small counter".into(),
//!         shape: Shape::Fixed(vec![]),
//!         format: vec![FormatComponent::new(FormatKind::Unsigned, 16)?],
//!         dtype: None,
//!     });
//!     group.set_value(0x1000, Value::new(vec![vec![Scalar::Unsigned(7)]]))?;
//!
//!     let heap = group.build_heap()?;
//!     for packet in transmitter::iter_genpackets(&heap, dialect) {
//!         // send `packet` over a transport
//!         let _ = packet;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! +---------------------------------------------------------------------+
//! |                        Application Layer                            |
//! |        ItemGroup  (declare items, set values, apply heaps)          |
//! +---------------------------------------------------------------------+
//! |                          Heap Layer                                 |
//! |   Descriptor  |  Item  |  HeapAssembler  |  HeapMultiplexer         |
//! +---------------------------------------------------------------------+
//! |                         Codec Layer                                 |
//! |     bit/byte packer  |  dtype strings  |  packet header/entries     |
//! +---------------------------------------------------------------------+
//! |                       Transport Layer                               |
//! |         in-memory bytes  |  file  |  UDP (sink + threaded source)   |
//! +---------------------------------------------------------------------+
//! ```
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`dialect::Dialect`] | Runtime wire parameters (address width, packet size, heap fanout) |
//! | [`descriptor::Descriptor`] | Name, shape, and format of one item |
//! | [`item::Item`] | A descriptor paired with its current value |
//! | [`item_group::ItemGroup`] | Builds outgoing heaps, applies incoming ones |
//! | [`heap::Heap`] | A fully assembled heap: item slots plus descriptor sub-heaps |
//! | [`heap::multiplexer::HeapMultiplexer`] | Reassembles heaps from an interleaved packet stream |
//!
//! ## Modules Overview
//!
//! - [`dialect`] - wire-format parameters and reserved item ids
//! - [`codec`] - bit-level packing and packet header/entry encoding
//! - [`dtype`] - numpy-style dtype string parsing and dense encoding
//! - [`descriptor`] - item descriptors and their single-packet heap encoding
//! - [`item`] - a descriptor bound to a current value
//! - [`heap`] - assembled heaps, the single-heap assembler, and the multiplexer
//! - [`item_group`] - the stateful item collection applications drive
//! - [`transmitter`] - splits a built heap into wire packets
//! - [`transport`] - byte-string, file, and UDP packet sources/sinks
//! - [`error`] - the crate's error and result types
//! - [`trace`] - structured, constructor-injected diagnostic events

// Clippy: No blanket suppressions. Fix issues properly or use inline #[allow] with justification.

/// Bit-level and packet-level wire codecs.
pub mod codec;
/// Numpy-style dtype string parsing and dense (non-bitpacked) encoding.
pub mod dtype;
/// Item descriptors: name, shape, format, and their heap encoding.
pub mod descriptor;
/// Runtime wire-format parameters (address width, packet size, reserved ids).
pub mod dialect;
/// The crate's error and result types.
pub mod error;
/// Heaps, the single-heap assembler, and the multi-heap multiplexer.
pub mod heap;
/// A descriptor bound to its current decoded value.
pub mod item;
/// A keyed collection of items that builds outgoing heaps and applies incoming ones.
pub mod item_group;
/// Structured, constructor-injected diagnostic events (dropped packets, evictions).
pub mod trace;
/// Splits a built heap into a sequence of maximum-sized wire packets.
pub mod transmitter;
/// Byte-string, file, and UDP packet sources/sinks.
pub mod transport;
/// Decoded scalar and row value types carried by items.
pub mod value;

pub use descriptor::{Descriptor, Shape};
pub use dialect::{AddrWidth, Dialect};
pub use error::{Error, Result};
pub use heap::Heap;
pub use item::Item;
pub use item_group::ItemGroup;
pub use value::{Scalar, Value};

/// Crate version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
