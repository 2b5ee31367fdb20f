pub mod auth;
pub mod catalog;
pub mod config;
pub mod draft;
pub mod error;
pub mod model;
pub mod state;
pub mod store;
pub mod types;
pub mod utils;
pub mod view;
pub mod workflow;

pub use config::{AuthConfig, DatabaseConfig, IntakeConfig, InventoryConfig};
pub use error::{ValidationError, WorkflowError};
pub use store::LedgerStore;
pub use types::{Decision, Principal, Role, TimeStamp};
pub use workflow::IntakeService;
