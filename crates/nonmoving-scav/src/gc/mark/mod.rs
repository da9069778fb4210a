//! Mark state consulted by the scavenger.
//!
//! The scavenger only ever reads mark bits: a set bit tells the segment
//! walker that the block was already scanned in an earlier cycle.

pub mod bitmap;

pub use bitmap::MarkBitmap;
