//! The shared context threaded between pipeline stages.

mod bags;

pub use bags::{Context, NS_DIAGNOSTICS, NS_RETRY, NS_SHARED_DATA};
