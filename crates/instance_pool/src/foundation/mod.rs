//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used by the pool:
//! - Math types and parking constants
//! - Bounding volumes
//! - Logging utilities

pub mod math;
pub mod bounds;
pub mod logging;
