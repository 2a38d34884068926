//! Test-only mock stages and harness helpers, mirroring the base
//! framework's `testing::mocks`/`testing::fixtures` layout.

pub mod fixtures;
pub mod mocks;
