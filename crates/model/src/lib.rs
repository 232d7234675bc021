pub mod batch;
pub mod checkpoint;
pub mod payload;
pub mod row;
pub mod whitelist;

pub use batch::BatchJob;
pub use checkpoint::{Checkpoint, CounterKind, Counters};
pub use payload::{CanonicalProduct, MetaEntry, RemoteId, UpdatePayload};
pub use row::Row;
