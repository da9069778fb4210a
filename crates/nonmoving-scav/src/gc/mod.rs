//! Scavenging of the non-moving generation.
//!
//! This module provides the scavenger proper:
//! - Per-shape field tracing and clean/dirty bookkeeping
//! - Segment walking guided by the survival bitmap
//! - The fixpoint drain over large objects and segments
//! - Worker-local scan context and configuration

pub mod config;
pub mod context;
pub mod drain;
pub mod evacuate;
pub mod fatal;
pub mod mark;
pub mod scavenge;
pub mod worklist;

#[cfg(feature = "tracing")]
pub mod tracing;

pub use config::ScavengeConfig;
pub use context::{ForcedPromotion, ScanContext};
pub use drain::scavenge_nonmoving_heap;
pub use evacuate::Evacuator;
pub use mark::MarkBitmap;
pub use scavenge::Scavenger;
pub use worklist::Worklist;
