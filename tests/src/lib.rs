//! # Quantum-Chain Dividend Test Suite
//!
//! Cross-component flows for the dividend subsystem.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── fixtures.rs        # Ledgers, engines, faulty sinks
//!     ├── round_lifecycle.rs # Compute, hand off, Start/Apply/Done
//!     ├── resumption.rs      # Crash and resume, node loss and recovery
//!     └── determinism.rs     # Independent nodes agree on the result hash
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p qc-tests
//! cargo test -p qc-tests integration::resumption::
//!
//! # Benchmarks
//! cargo bench -p qc-tests
//! ```

#![allow(dead_code)]

pub mod integration;
