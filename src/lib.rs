// Identifier newtypes
pub mod ids;

// Error types
pub mod error;

// Sibling snapshot module
pub mod snapshot;

// Position resolver module
pub mod position;

// Weight renumbering module
pub mod renumber;

// Concurrency guard module
pub mod guard;

// Sibling store seam and in-memory adapter
pub mod store;

// JSON document store
pub mod file;

// Placement hooks
pub mod placement;

// Reorder sessions
pub mod session;

// Configuration module
pub mod config;

// JSON request/response module
pub mod json;

// Re-exports
pub use ids::{ParentContext, SiblingId, Weight};
pub use error::{CONFLICT_MESSAGE, ReorderError, StoreError};
pub use snapshot::{PositionChoice, SiblingRecord, SiblingSnapshot, capture};
pub use position::{Side, TargetSpec, resolve};
pub use renumber::{
    DEFAULT_BASE_WEIGHT, RenumberOptions, RenumberPolicy, RenumberedWeights, WeightChange,
    WeightEntry, renumber,
};
pub use guard::{Drift, Fingerprint, validate};
pub use store::{MemoryStore, MenuTree, SiblingStore};
pub use file::{JsonFileStore, TreeContent, read_tree, write_tree};
pub use placement::{PlacementHook, PlacementHooks, StaticPlacement};
pub use session::{ReorderPlan, ReorderSession};
pub use config::{ConfigError, EngineConfig, PlacementRule};
pub use json::{ReorderRequest, ReorderResponse, SnapshotResponse, generate_execution_id};
