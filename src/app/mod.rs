//! Application Layer
//!
//! This module contains:
//! - Instance: configuration-driven assembly and lifecycle
//! - Dispatcher: destination → router → outbound session
//! - Registry: typed-config object construction
//! - Facade: `dial` and `start_instance` for embedders
//! - Metrics and log setup

mod dispatcher;
mod facade;
mod instance;
pub mod log;
pub mod metrics;
mod registry;

pub use dispatcher::{DefaultDispatcher, Dispatcher};
pub use facade::{dial, start_instance};
pub use instance::Instance;
pub use registry::{
    create_object, register_object, Feature, ObjectCreator, ObjectRegistry, TypedConfig,
};
