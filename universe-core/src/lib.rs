//! Universe Core: data catalog, lazy data store, inclusion algorithms and
//! pipeline executor.
//!
//! This crate builds a time-varying universe of eligible instruments:
//! - Named data definitions resolved on demand and memoized per store
//! - Explicit registries of data and stage functions
//! - Inclusion algorithms over a shared calendar (ranges, ranking with
//!   hysteresis, rolling completeness, correlation exclusion)
//! - A sequential pipeline executor yielding one universe frame per stage
//! - Three-valued combination of stage outputs into the final universe

pub mod calendar;
pub mod data;
pub mod error;
pub mod frame;
pub mod inclusion;
pub mod pipeline;
pub mod value;

pub use calendar::{Calendar, Frequency};
pub use data::{DataCatalog, DataDefinition, DataReference, DataStore, ParamValue, Params};
pub use error::{Result, UniverseError};
pub use frame::{Frame, NumericFrame, UniverseFrame};
pub use inclusion::combine_validity;
pub use pipeline::{PipelineDefinition, PipelineExecutor};
pub use value::Value;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: values and registries can cross threads.
    ///
    /// Stores and executors are used from a single thread today; keeping
    /// these bounds means a caller can still move a finished run elsewhere.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Values and frames
        require_send::<Value>();
        require_sync::<Value>();
        require_send::<NumericFrame>();
        require_sync::<NumericFrame>();
        require_send::<UniverseFrame>();
        require_sync::<UniverseFrame>();
        require_send::<Calendar>();
        require_sync::<Calendar>();

        // Definitions
        require_send::<ParamValue>();
        require_sync::<ParamValue>();
        require_send::<DataCatalog>();
        require_sync::<DataCatalog>();
        require_send::<PipelineDefinition>();
        require_sync::<PipelineDefinition>();

        // Resolution and execution
        require_send::<DataStore>();
        require_sync::<DataStore>();
        require_send::<PipelineExecutor>();
        require_sync::<PipelineExecutor>();
        require_send::<UniverseError>();
        require_sync::<UniverseError>();
    }
}
