/// Database Module
///
/// This module provides the session layer of dbsession, organized into
/// focused submodules:
/// - **Session** (`session.rs`): scoped connection lifecycle, query /
///   procedure / scalar / transaction execution
/// - **Commands** (`command.rs`): pending command state and parameters
/// - **Row Sets** (`rowset.rs`): in-memory tabular results
/// - **Mapping** (`mapping.rs`): explicit row-to-struct mapping tables
///
/// ## Error Handling
///
/// All database operations use the standardized `SessionError` type for
/// consistent error propagation.
pub mod command;
pub mod mapping;
pub mod rowset;
pub mod session;

pub use command::*;
pub use mapping::*;
pub use rowset::*;
pub use session::*;
