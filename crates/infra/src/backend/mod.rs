//! Backend transports.

pub mod in_memory;
pub mod relay;
pub mod transport;

pub use in_memory::{InMemoryBackend, Operation, WriteLog};
pub use relay::RelayTransport;
pub use transport::{BackendTransport, Condition, Domain, Operator, Record};
