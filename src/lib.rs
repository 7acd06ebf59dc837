pub mod adapter;
pub mod benchmark;
pub mod cause;
pub mod cli;
pub mod config;
pub mod context;
pub mod effect;
pub mod errors;
pub mod init;
mod interpreter;
pub mod interrupt;
pub mod registry;
pub mod runtime;

// Re-export the effect algebra
pub use cause::{Cause, Defect, Exit};
pub use context::Context;
pub use effect::{
    all, asks, bracket, bracket_exit, defer, done, environment, fail, fail_cause, for_each_par,
    from_future, halt, interrupt, lift_future, promise, service, service_with, succeed,
    succeed_lazy, try_catch, try_succeed, unit, Effect,
};
pub use errors::Squashed;

// Re-export the run surface
pub use adapter::OnInterrupt;
pub use config::Config;
pub use interrupt::{CancelHandle, InterruptToken, Subscription};
pub use runtime::{RunHandle, RunId, Runtime};

// Re-export init API for convenience
pub use init::{initialize, InitBuilder, InitOptions};
