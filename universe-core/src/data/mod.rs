//! Data catalog, lazy references and the memoizing data store.

pub mod builtins;
pub mod cache;
pub mod definition;
pub mod loader;
pub mod reference;
pub mod registry;
pub mod store;

pub use cache::DataCache;
pub use definition::{DataCatalog, DataDefinition};
pub use loader::{FileFormat, ReturnFormat};
pub use reference::{DataReference, ParamValue};
pub use registry::{DataFunction, FunctionRegistry, Params, StageFunction};
pub use store::DataStore;
