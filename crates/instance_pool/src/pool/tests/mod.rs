//! Pool-level scenario tests
//!
//! Exercise the façade end to end against the CPU backend.
