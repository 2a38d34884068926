//! Cooperative cancellation primitives shared by the orchestrator and supervisor.

mod token;

pub use token::CancellationToken;
