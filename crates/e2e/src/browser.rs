//! Collaborator seams: the rendered page, navigation, and the appliance
//! services that sit beside the UI.
//!
//! Everything the page objects do goes through these traits. The crate ships
//! a Playwright-backed implementation of [`Browser`] and [`Navigator`], REST
//! and ssh implementations of the appliance services, and an in-memory
//! simulator implementing all of them for tests.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use appliance_common::FieldValue;

use crate::downloads::NetworkCollection;
use crate::error::E2eResult;
use crate::roles::ServerRoles;
use crate::widget::Widget;

/// Result of writing a value into a widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fill {
    Changed,
    Unchanged,
    /// The widget is not rendered on the current page
    Unavailable,
}

/// Result of clicking a button or menu item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Click {
    Clicked,
    /// The control is missing or disabled
    Unavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashLevel {
    Success,
    Info,
    Warning,
    Error,
}

/// A flash message shown after a form action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: FlashLevel,
    pub text: String,
}

impl FlashMessage {
    pub fn new(level: FlashLevel, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == FlashLevel::Error
    }
}

/// What a navigation is aimed at
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// The appliance server whose settings are edited
    Server,
    Collection(NetworkCollection),
    Entity {
        collection: NetworkCollection,
        name: String,
    },
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Server => write!(f, "server"),
            Target::Collection(collection) => write!(f, "{}", collection.as_str()),
            Target::Entity { collection, name } => write!(f, "{}/{}", collection.as_str(), name),
        }
    }
}

/// Named view a navigation lands on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    /// Server tab of the server settings
    Server,
    /// Authentication tab of the server settings
    Authentication,
    /// List of all entities in a collection
    All,
    /// Summary page of a single entity
    Details,
}

impl Destination {
    pub fn as_str(&self) -> &'static str {
        match self {
            Destination::Server => "Server",
            Destination::Authentication => "Authentication",
            Destination::All => "All",
            Destination::Details => "Details",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NavigateOptions {
    /// Force a fresh navigation instead of reusing the rendered view
    pub use_resetter: bool,
    /// Wait until the destination view reports itself displayed
    pub wait_for_view: bool,
}

impl NavigateOptions {
    pub fn wait() -> Self {
        Self {
            use_resetter: false,
            wait_for_view: true,
        }
    }

    pub fn reset() -> Self {
        Self {
            use_resetter: true,
            wait_for_view: false,
        }
    }
}

/// The rendered page
#[async_trait]
pub trait Browser: Send + Sync {
    /// Read the current value of a widget
    async fn read(&self, widget: &Widget) -> E2eResult<FieldValue>;

    /// Write a value, reporting whether it differed from what was shown
    async fn fill(&self, widget: &Widget, value: &FieldValue) -> E2eResult<Fill>;

    async fn click(&self, widget: &Widget) -> E2eResult<Click>;

    /// Whether the widget is rendered and enabled
    async fn is_active(&self, widget: &Widget) -> E2eResult<bool>;

    /// Pick an item from a dropdown menu
    async fn select_item(&self, widget: &Widget, item: &str) -> E2eResult<Click>;

    /// Flash messages currently shown
    async fn flash_messages(&self) -> E2eResult<Vec<FlashMessage>>;

    /// Reload the page, discarding unsaved edits
    async fn refresh(&self) -> E2eResult<()>;
}

/// Positions the browser on a named view of a target
#[async_trait]
pub trait Navigator: Send + Sync {
    async fn navigate_to(
        &self,
        target: &Target,
        destination: Destination,
        options: NavigateOptions,
    ) -> E2eResult<()>;
}

/// Authoritative store of server roles, bypassing the rendered form
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn server_roles(&self) -> E2eResult<ServerRoles>;

    async fn set_server_roles(&self, roles: &ServerRoles) -> E2eResult<()>;
}

/// Output of a command run on the appliance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == 0
    }
}

/// Shell access to the appliance host
#[async_trait]
pub trait RemoteShell: Send + Sync {
    async fn run_command(&self, command: &str) -> E2eResult<CommandOutput>;
}

/// Lookup of inventory entities shown in collection lists
#[async_trait]
pub trait Inventory: Send + Sync {
    async fn entity_names(&self, collection: NetworkCollection) -> E2eResult<Vec<String>>;

    /// Resolve a single entity by name
    async fn instantiate(&self, collection: NetworkCollection, name: &str) -> E2eResult<Target>;
}
