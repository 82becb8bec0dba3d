//! Hashing primitives for partition resolution and ring placement.
//!
//! Two pieces live here: the named [`HashFunction`] family with its
//! streaming [`Hasher`] builder, and the [`ConsistentHashCircle`] the
//! partition service builds per recomputation. The circle is hash-agnostic;
//! callers feed it positions produced by the configured function so that
//! every peer places the same instances at the same positions.

pub mod circle;
pub mod function;

pub use circle::ConsistentHashCircle;
pub use function::{HashCode, HashFunction, Hasher};
