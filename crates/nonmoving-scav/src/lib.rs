//! Scavenging engine for a non-moving, generational garbage collector.
//!
//! The oldest generation of the heap never moves its objects. Small objects
//! live in fixed-size blocks of [`NonmovingSegment`]s and big ones in
//! [`LargeObject`]s. During a collection, objects promoted into this
//! generation are queued on it, and the scavenger traces their pointer
//! fields until no queued work remains.
//!
//! # Features
//!
//! - **Shape-directed tracing**: every [`ClosureType`] has a fixed set of
//!   fields to follow, in a fixed order
//! - **Clean/dirty tracking**: mutable shapes are moved to their clean tag
//!   after tracing
//! - **Mutable list maintenance**: objects still referencing a younger
//!   generation are remembered on the generation's mutable list
//! - **Parallel draining**: worklists are lock-free and every queued item is
//!   taken by exactly one worker
//!
//! # Example
//!
//! ```
//! use nonmoving_scav::{
//!     scavenge_nonmoving_heap, Closure, ClosureType, Evacuator, InfoTable, LargeObject,
//!     NonmovingGen, ScanContext, Word,
//! };
//! use std::sync::Arc;
//!
//! /// Pretends every referenced object is already old.
//! struct AlreadyOld;
//!
//! impl Evacuator for AlreadyOld {
//!     fn evacuate(&mut self, _ctx: &mut ScanContext, _slot: &mut Word) {}
//!     fn scavenge_srt(&mut self, _ctx: &mut ScanContext, _info: &InfoTable) {}
//!     fn scavenge_stack(&mut self, _ctx: &mut ScanContext, _stack: &mut [Word]) {}
//!     fn scavenge_tso(&mut self, _ctx: &mut ScanContext, _tso: &mut Closure) {}
//!     fn scavenge_pap(&mut self, _ctx: &mut ScanContext, pap: &mut Closure) -> usize {
//!         pap.payload().len()
//!     }
//!     fn scavenge_ap(&mut self, _ctx: &mut ScanContext, _ap: &mut Closure) {}
//! }
//!
//! let gen = NonmovingGen::new(1);
//! let var = Arc::new(LargeObject::new(Word::new(0x4000), Closure::mut_var(Word::new(0x10))));
//! gen.push_todo_large_object(Arc::clone(&var));
//!
//! let mut ctx = ScanContext::new(0);
//! scavenge_nonmoving_heap(&gen, &mut AlreadyOld, &mut ctx);
//!
//! assert_eq!(var.closure().closure_type(), Ok(ClosureType::MutVarClean));
//! assert!(gen.mutable_list().is_empty());
//! ```

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod closure;
pub mod gc;
pub mod heap;
mod metrics;
mod tracing;

// Re-export public API
pub use closure::{Cleanliness, Closure, ClosureType, InfoTable, Layout, Word};
pub use gc::{
    scavenge_nonmoving_heap, Evacuator, ForcedPromotion, ScanContext, ScavengeConfig, Scavenger,
};
pub use heap::{BlockFlags, LargeObject, NonmovingGen, NonmovingSegment};
pub use metrics::ScavengeStats;
pub use crate::tracing::GcId;
