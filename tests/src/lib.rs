//! # Analytics Gateway Test Suite
//!
//! Unified test crate containing:
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── correlation_benchmarks.rs   # Table and round-trip throughput
//! │
//! └── src/integration/
//!     ├── flows.rs                    # Gated ML event flows over the bus
//!     └── e2e_choreography.rs         # HTTP → bus → engine → HTTP
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p analytics-tests
//!
//! # By category
//! cargo test -p analytics-tests integration::flows
//! cargo test -p analytics-tests integration::e2e_choreography
//!
//! # Benchmarks
//! cargo bench -p analytics-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod integration;
