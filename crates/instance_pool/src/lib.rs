//! # Instance Pool
//!
//! Batched instance pooling for instanced rendering.
//!
//! A [`BatchedInstancePool`](pool::BatchedInstancePool) maps an arbitrary
//! number of logical instances, each with a transform and an optional color,
//! onto fixed-capacity instancing batches owned by a host renderer. Writes
//! only mark the batches they touch; a single `flush` per frame then flags
//! those batches for upload and recomputes their bounds when culling or
//! hit-testing needs them.
//!
//! ## Modules
//!
//! - **pool**: allocator, index router, dirty tracker, façade and backends
//! - **config**: pool construction parameters, loadable from TOML/RON
//! - **foundation**: math types, bounding volumes, logging
//!
//! ## Quick Start
//!
//! ```rust
//! use instance_pool::prelude::*;
//!
//! let config = PoolConfig::new(256, 1000).with_colors(true);
//! let mut pool = BatchedInstancePool::new(&config, CpuBackend::new(), ShapeDescriptor::unit_cube())?;
//!
//! let transforms: Vec<Mat4> = (0..1000)
//!     .map(|i| Transform::from_position(Vec3::new(i as f32, 0.0, 0.0)).to_matrix())
//!     .collect();
//! pool.set_transforms(&transforms, 0);
//! pool.set_color(3, &Color::new(1.0, 0.0, 0.0));
//! pool.flush();
//! # Ok::<(), PoolError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod error;
pub mod foundation;
pub mod pool;

/// Common imports for pool users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, PoolConfig},
        error::{PoolError, PoolResult},
        foundation::{
            bounds::Aabb,
            math::{Color, Mat4, Quat, Transform, Vec3},
        },
        pool::{
            BatchChanges, BatchState, BatchedInstancePool, CpuBackend, CpuDrawable,
            FlushReport, InstanceBackend, InstancedDrawable, PoolStats, ShapeDescriptor,
        },
    };
}
