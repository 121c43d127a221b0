//! Proxylink - embed a proxy core and dial through it
//!
//! # Architecture
//!
//! ```text
//! dial(Destination)
//! → Dispatcher (Router selects an outbound)
//! → Link: uplink pipe + downlink pipe
//! → OutboundHandler (freedom / blackhole)
//! → Transport
//! ```
//!
//! The caller gets a `VirtualConnection`: an ordinary `AsyncRead + AsyncWrite`
//! stream backed by the caller's side of the Link.
//!
//! ## Module Structure
//!
//! ```text
//! src/
//! ├── common/          # Core types: MultiBuffer, pipe, Link, Destination
//! ├── net/             # Stream adapters and VirtualConnection
//! ├── transport/       # Transport layer: TCP
//! ├── router/          # Router: rule-based routing
//! ├── outbound/        # Outbound handlers
//! └── app/             # Application: Instance, Dispatcher, registry, dial
//! ```

// Core types
pub mod common;
pub mod error;

// Layered architecture
pub mod transport;
pub mod router;
pub mod outbound;
pub mod net;
pub mod app;

// Supporting modules
pub mod config;

// Re-exports for convenience
pub use common::{Address, Destination, Link, Network, Stream};
pub use error::{Error, Result};
pub use config::{load_config, Config};

// Architecture re-exports
pub use app::{create_object, dial, start_instance, Dispatcher, Feature, Instance, TypedConfig};
pub use net::{Connection, VirtualConnection};
pub use outbound::OutboundHandler;
pub use router::Router;
pub use transport::Transport;
