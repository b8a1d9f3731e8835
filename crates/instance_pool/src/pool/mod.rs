//! Batched instance pool sub-system
//!
//! Batch allocation, index routing, dirty tracking and the pool façade,
//! plus the host backend traits and a CPU reference backend.

pub mod allocator;
pub mod backend;
pub mod batched_pool;
pub mod cpu;
pub mod dirty;
pub mod router;

#[cfg(test)]
mod tests;

pub use allocator::*;
pub use backend::*;
pub use batched_pool::*;
pub use cpu::*;
pub use dirty::*;
pub use router::*;
