//! Workflow engine — parses a declarative YAML document into an ordered
//! step list and runs it, dispatching each step to the Provider Registry
//! with the right capability and routing results to their destinations.
//!
//! ```text
//! workflow.yaml ──► WorkflowDocument ──► Engine ──► ProviderRegistry
//!                                          │
//!                                   ProgressUpdate channel
//! ```

pub mod executor;
pub mod progress;
pub mod schema;

pub use executor::{new_engine, Engine};
pub use progress::{ProgressUpdate, ProgressReceiver, ProgressSender};
pub use schema::{parse, StepConfig, WorkflowDocument};
