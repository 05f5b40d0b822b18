//! Error types for the appliance page objects

use appliance_common::Version;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Console type not supported: {0}")]
    ConsoleTypeNotSupported(String),

    #[error("Console support is not available on {product} {version}")]
    ConsoleNotSupported { product: String, version: Version },

    #[error("Widget not found: {0}")]
    WidgetNotFound(String),

    #[error("Verification failed: {0}")]
    Verification(String),

    #[error("Navigation failed: {0}")]
    Navigation(String),

    #[error("Server role store error: {0}")]
    RoleStore(String),

    #[error("Remote command failed: {0}")]
    Shell(String),

    #[error("Many entities named {name} found in {collection}")]
    ManyEntitiesFound { collection: String, name: String },

    #[error("No entity named {name} found in {collection}")]
    EntityNotFound { collection: String, name: String },

    #[error("Playwright not found. Install with: npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Timeout waiting for: {0}")]
    Timeout(String),

    #[error("Scenario parse error: {0}")]
    SpecParse(String),

    #[error("Step failed: {step} - {reason}")]
    StepFailed { step: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Common(#[from] appliance_common::Error),
}

pub type E2eResult<T> = Result<T, E2eError>;
