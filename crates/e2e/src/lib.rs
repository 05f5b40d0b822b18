//! Page objects for the server settings of a management appliance
//!
//! This crate drives the settings UI of an appliance server:
//! - Typed sub-form records filled through declarative widgets
//! - A uniform commit/revert protocol with an explicit staging result
//! - Server roles mutated through the authoritative settings store
//! - Authentication modes as a tagged union of field variants
//! - Version gates from an explicit minimum-version table
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Settings façades (Rust)                     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ServerInformation / AuthenticationSetting                  │
//! │    ├── navigate_to(target, destination)                     │
//! │    ├── fill_form(record) -> Staged                          │
//! │    ├── save_action(staged, reset) -> SaveAction             │
//! │    └── verify flash messages                                │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Collaborators (traits)                                     │
//! │    ├── Browser, Navigator   Playwright bridge | simulator   │
//! │    ├── RoleStore, Inventory REST API          | simulator   │
//! │    └── RemoteShell          ssh               | simulator   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Scenario (YAML)                                            │
//! │    ├── name, tags, min_version                              │
//! │    └── steps: update_form, enable_server_roles,             │
//! │               configure_auth, download_list, ...            │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod appliance;
pub mod auth;
pub mod authentication;
pub mod browser;
pub mod config;
pub mod downloads;
pub mod error;
pub mod forms;
pub mod gate;
pub mod playwright;
pub mod protocol;
pub mod rest;
pub mod roles;
pub mod runner;
pub mod server;
pub mod shell;
pub mod sim;
pub mod spec;
pub mod views;
pub mod widget;

pub use appliance::Appliance;
pub use auth::{AuthMode, AuthSettings, ProviderConfig};
pub use authentication::{AuthenticationSetting, ConfigureOptions};
pub use error::{E2eError, E2eResult};
pub use protocol::{SaveAction, Staged};
pub use roles::{RoleChange, ServerRole, ServerRoles};
pub use runner::ScenarioRunner;
pub use server::ServerInformation;
pub use spec::{Scenario, Step};
