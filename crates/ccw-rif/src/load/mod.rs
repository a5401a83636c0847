//! Loading parsed records and tracking what each load touched

mod batch;
mod loader;
#[cfg(feature = "database")]
mod postgres;
mod sink;
mod skip;

pub use batch::{LoadedBatch, LoadedBatchBuilder, LoadedFile, BENEFICIARY_SEPARATOR};
pub use loader::{LoadStats, RifLoader};
#[cfg(feature = "database")]
pub use postgres::PgLoadSink;
pub use sink::{
    combine_all, InMemoryLoadSink, LoadAction, LoadStrategy, PendingBatch, RifLoadSink, StoredRecord,
};
pub use skip::{
    EnrollmentYearFilter, NoSkip, SkipDecision, SkipPolicy, SkipReasonCode, SkippedRifRecord,
};
