pub mod paths;
pub mod registry;
pub mod sqlite;

pub use paths::PathResolver;
pub use registry::{DocumentRegistry, InMemoryRegistry};
pub use sqlite::SqliteRegistry;
