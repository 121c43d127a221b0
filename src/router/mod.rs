//! Router
//!
//! Responsibilities:
//! - Outbound selection based on the Destination
//! - NO IO operations
//! - NO async operations
//!
//! Router is a pure function: Destination -> outbound_tag

pub mod rule_router;

pub use rule_router::{Rule, RuleRouter, RuleType};

use crate::common::Destination;

/// Router trait - pure function for routing decisions
///
/// IMPORTANT: Router must NOT perform any IO or async operations.
/// It only reads the Destination and returns an outbound tag.
pub trait Router: Send + Sync {
    /// Select an outbound for a destination
    fn select(&self, destination: &Destination) -> &str;
}

/// Simple router that always returns the same outbound
pub struct StaticRouter {
    outbound: String,
}

impl StaticRouter {
    pub fn new(outbound: impl Into<String>) -> Self {
        Self {
            outbound: outbound.into(),
        }
    }
}

impl Router for StaticRouter {
    fn select(&self, _destination: &Destination) -> &str {
        &self.outbound
    }
}
