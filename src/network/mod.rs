pub mod dispatcher;
pub mod seeds;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use seeds::{generate_seed, select_query_uids, SeedIssuer};
pub use transport::{QueryResult, Transport, TransportError};
