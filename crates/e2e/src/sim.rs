//! In-memory appliance.
//!
//! Renders the server settings tabs from the same widget declarations the
//! page objects use, keeps a draft of unsaved edits on top of committed
//! values, and records every write and click so tests can assert on them.
//! Faults reproduce the product defects the page objects tolerate.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use appliance_common::{FieldMap, FieldValue, ServerIdentity, Version};

use crate::appliance::{settings_saved_message, Appliance};
use crate::auth::{self, AuthMode};
use crate::browser::{
    Browser, Click, CommandOutput, Destination, Fill, FlashLevel, FlashMessage, Inventory,
    NavigateOptions, Navigator, RemoteShell, RoleStore, Target,
};
use crate::config::ConsoleConfig;
use crate::downloads::{self, ExportFormat, NetworkCollection};
use crate::error::{E2eError, E2eResult};
use crate::forms::{SmtpServer, SubForm};
use crate::protocol::RESET_MESSAGE;
use crate::roles::{ServerRole, ServerRoles};
use crate::views::{AuthenticationView, ServerView};
use crate::widget::{Widget, WidgetKind};

/// Initial state of a simulated appliance
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub version: Version,
    pub product_name: String,
    pub server: ServerIdentity,
    pub console: ConsoleConfig,
    pub roles: ServerRoles,
    pub inventory: BTreeMap<NetworkCollection, Vec<String>>,
}

impl Default for SimConfig {
    fn default() -> Self {
        let enabled = [
            ServerRole::Automate,
            ServerRole::DatabaseOperations,
            ServerRole::EmsInventory,
            ServerRole::EmsOperations,
            ServerRole::Event,
            ServerRole::Reporting,
            ServerRole::Scheduler,
            ServerRole::Smartstate,
            ServerRole::UserInterface,
            ServerRole::WebServices,
            ServerRole::Websocket,
        ];
        let roles = ServerRole::ALL
            .iter()
            .map(|role| (*role, enabled.contains(role)))
            .collect();

        Self {
            version: Version::Latest,
            product_name: "ManageIQ".to_string(),
            server: ServerIdentity::default(),
            console: ConsoleConfig::default(),
            roles,
            inventory: BTreeMap::new(),
        }
    }
}

/// Injected misbehaviour
#[derive(Debug, Clone, Default)]
pub struct SimFaults {
    /// Save stays disabled even with pending edits
    pub save_disabled: bool,
    /// Error flash shown after a save
    pub save_error: Option<String>,
    /// Error flash shown after Validate
    pub validate_error: Option<String>,
    /// SMTP fields are not rendered until a resetter navigation
    pub stale_smtp: bool,
    /// Number of upcoming role store writes that fail
    pub failing_role_writes: usize,
    /// Remote commands containing this text exit non-zero
    pub failing_command: Option<String>,
}

/// Round trips observed by the simulator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimCounters {
    pub navigations: usize,
    pub field_writes: usize,
    pub saves: usize,
    pub resets: usize,
    pub verifies: usize,
    pub validations: usize,
    pub refreshes: usize,
    /// Role store writes, including failed ones
    pub role_writes: usize,
}

struct SimState {
    location: Option<(Target, Destination)>,
    committed: BTreeMap<String, FieldValue>,
    draft: BTreeMap<String, FieldValue>,
    flash: Vec<FlashMessage>,
    roles: ServerRoles,
    faults: SimFaults,
    counters: SimCounters,
    commands: Vec<String>,
    downloads: Vec<String>,
}

/// Simulated appliance implementing every collaborator trait
pub struct SimulatedAppliance {
    config: SimConfig,
    role_switches: BTreeMap<String, ServerRole>,
    variant_keys: BTreeSet<String>,
    state: Mutex<SimState>,
}

fn key_of(widgets: &[Widget], name: &str) -> Option<String> {
    widgets.iter().find(|w| w.name == name).map(|w| w.key())
}

impl SimulatedAppliance {
    pub fn new(config: SimConfig) -> Arc<Self> {
        let role_switches = ServerRole::ALL
            .iter()
            .map(|role| (role.widget().key(), *role))
            .collect();
        let variant_keys = AuthMode::ALL
            .iter()
            .flat_map(|mode| auth::variant_widgets(*mode))
            .map(|w| w.key())
            .collect();

        let mut committed = BTreeMap::new();
        committed.insert(ServerView::title().key(), FieldValue::from(ServerView::TITLE));
        committed.insert(
            AuthenticationView::title().key(),
            FieldValue::from(AuthenticationView::TITLE),
        );
        committed.insert(
            auth::mode_widget().key(),
            FieldValue::from(AuthMode::Database.label()),
        );
        committed.insert(AuthenticationView::hours_timeout().key(), "1".into());
        committed.insert(AuthenticationView::minutes_timeout().key(), "0".into());

        let basic = crate::forms::BasicInformation::widgets();
        let seeds = [
            ("hostname", format!("{}.example.com", config.server.name.to_lowercase())),
            ("company_name", "My Company".to_string()),
            ("appliance_name", config.server.name.clone()),
            ("appliance_zone", config.server.zone.clone()),
            ("time_zone", "(GMT+00:00) UTC".to_string()),
            ("locale", "English".to_string()),
        ];
        for (name, value) in seeds {
            if let Some(key) = key_of(&basic, name) {
                committed.insert(key, value.into());
            }
        }
        if let Some(key) = key_of(&crate::forms::VmwareConsole::widgets(), "console_type") {
            committed.insert(key, "VNC".into());
        }
        if let Some(key) = key_of(&crate::forms::Logging::widgets(), "log_level") {
            committed.insert(key, "info".into());
        }

        let state = SimState {
            location: None,
            committed,
            draft: BTreeMap::new(),
            flash: Vec::new(),
            roles: config.roles.clone(),
            faults: SimFaults::default(),
            counters: SimCounters::default(),
            commands: Vec::new(),
            downloads: Vec::new(),
        };

        Arc::new(Self {
            config,
            role_switches,
            variant_keys,
            state: Mutex::new(state),
        })
    }

    /// Appliance handle whose collaborators all point at this simulator
    pub fn appliance(self: &Arc<Self>) -> Appliance {
        Appliance {
            version: self.config.version.clone(),
            product_name: self.config.product_name.clone(),
            server: self.config.server.clone(),
            console: self.config.console.clone(),
            browser: self.clone(),
            navigator: self.clone(),
            roles: self.clone(),
            shell: self.clone(),
            inventory: self.clone(),
        }
    }

    pub fn counters(&self) -> SimCounters {
        self.state.lock().counters.clone()
    }

    pub fn set_faults(&self, faults: SimFaults) {
        self.state.lock().faults = faults;
    }

    pub fn faults(&self) -> SimFaults {
        self.state.lock().faults.clone()
    }

    pub fn flash(&self) -> Vec<FlashMessage> {
        self.state.lock().flash.clone()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    pub fn downloads(&self) -> Vec<String> {
        self.state.lock().downloads.clone()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.state.lock().draft.is_empty()
    }

    /// Saved value of a widget, ignoring unsaved edits
    pub fn committed(&self, widget: &Widget) -> Option<FieldValue> {
        let state = self.state.lock();
        match self.role_switches.get(&widget.key()) {
            Some(role) => state.roles.get(role).map(|enabled| FieldValue::Bool(*enabled)),
            None => state.committed.get(&widget.key()).cloned(),
        }
    }

    /// Saved values of a sub-form
    pub fn committed_form<F: SubForm>(&self) -> E2eResult<F> {
        let mut values = FieldMap::new();
        for widget in F::widgets() {
            if let Some(value) = self.committed(&widget) {
                values.insert(widget.name.clone(), value);
            }
        }
        F::from_values(values)
    }

    fn committed_mode(&self, state: &SimState) -> AuthMode {
        Self::mode_from(state.committed.get(&auth::mode_widget().key()))
    }

    fn displayed_mode(&self, state: &SimState) -> AuthMode {
        let key = auth::mode_widget().key();
        Self::mode_from(state.draft.get(&key).or_else(|| state.committed.get(&key)))
    }

    fn mode_from(value: Option<&FieldValue>) -> AuthMode {
        value
            .and_then(|v| v.as_text())
            .and_then(|label| AuthMode::from_label(label).ok())
            .unwrap_or(AuthMode::Database)
    }

    fn page(&self, state: &SimState) -> Vec<Widget> {
        match &state.location {
            Some((Target::Server, Destination::Server)) => {
                let mut widgets = ServerView::widgets(&self.config.version);
                if state.faults.stale_smtp {
                    let mut hidden: BTreeSet<String> =
                        SmtpServer::widgets().iter().map(|w| w.key()).collect();
                    hidden.insert(ServerView::smtp_verify().key());
                    widgets.retain(|w| !hidden.contains(&w.key()));
                }
                widgets
            }
            Some((Target::Server, Destination::Authentication)) => {
                AuthenticationView::widgets(self.displayed_mode(state))
            }
            Some((Target::Collection(_), Destination::All)) => vec![downloads::toolbar_download()],
            Some((Target::Entity { .. }, Destination::Details)) => {
                vec![downloads::summary_download()]
            }
            _ => Vec::new(),
        }
    }

    fn rendered(&self, state: &SimState, widget: &Widget) -> bool {
        let key = widget.key();
        self.page(state).iter().any(|w| w.key() == key)
    }

    /// Value the widget shows, drafts over saved values over blanks
    fn displayed(&self, state: &SimState, widget: &Widget) -> FieldValue {
        let key = widget.key();
        if let Some(value) = state.draft.get(&key) {
            return value.clone();
        }
        if let Some(role) = self.role_switches.get(&key) {
            return FieldValue::Bool(state.roles.get(role).copied().unwrap_or(false));
        }
        // a freshly selected variant renders blank
        let stale_variant = self.variant_keys.contains(&key)
            && self.displayed_mode(state) != self.committed_mode(state);
        match state.committed.get(&key) {
            Some(value) if !stale_variant => value.clone(),
            _ => Self::blank(widget.kind),
        }
    }

    fn blank(kind: WidgetKind) -> FieldValue {
        if kind.is_boolean() {
            FieldValue::Bool(false)
        } else {
            FieldValue::Text(String::new())
        }
    }

    fn saved_flash(&self, state: &SimState) -> String {
        let section = match &state.location {
            Some((_, Destination::Authentication)) => "Authentication",
            _ => "Configuration",
        };
        settings_saved_message(section, &self.config.product_name, &self.config.server)
    }

    fn save(&self, state: &mut SimState) -> Click {
        if state.draft.is_empty() || state.faults.save_disabled {
            return Click::Unavailable;
        }
        state.counters.saves += 1;

        let draft = std::mem::take(&mut state.draft);
        for (key, value) in draft {
            match (self.role_switches.get(&key), value.as_bool()) {
                (Some(role), Some(enabled)) => {
                    state.roles.insert(*role, enabled);
                }
                _ => {
                    state.committed.insert(key, value);
                }
            }
        }

        state.flash.clear();
        match state.faults.save_error.clone() {
            Some(error) => state.flash.push(FlashMessage::new(FlashLevel::Error, error)),
            None => {
                let text = self.saved_flash(state);
                state.flash.push(FlashMessage::new(FlashLevel::Success, text));
            }
        }
        Click::Clicked
    }

    fn reset(&self, state: &mut SimState) -> Click {
        if state.draft.is_empty() {
            return Click::Unavailable;
        }
        state.counters.resets += 1;
        state.draft.clear();
        state.flash.clear();
        state
            .flash
            .push(FlashMessage::new(FlashLevel::Warning, RESET_MESSAGE));
        Click::Clicked
    }

    fn is_save(widget: &Widget) -> bool {
        let key = widget.key();
        key == ServerView::buttons().save.key() || key == AuthenticationView::buttons().save.key()
    }

    fn is_reset(widget: &Widget) -> bool {
        let key = widget.key();
        key == ServerView::buttons().reset.key()
            || key == AuthenticationView::buttons().reset.key()
    }
}

#[async_trait]
impl Browser for SimulatedAppliance {
    async fn read(&self, widget: &Widget) -> E2eResult<FieldValue> {
        let state = self.state.lock();
        if !widget.kind.is_readable() || !self.rendered(&state, widget) {
            return Err(E2eError::WidgetNotFound(widget.to_string()));
        }
        Ok(self.displayed(&state, widget))
    }

    async fn fill(&self, widget: &Widget, value: &FieldValue) -> E2eResult<Fill> {
        let mut state = self.state.lock();
        if !widget.kind.is_fillable() || !self.rendered(&state, widget) {
            return Ok(Fill::Unavailable);
        }
        if &self.displayed(&state, widget) == value {
            return Ok(Fill::Unchanged);
        }

        state.counters.field_writes += 1;
        let key = widget.key();
        let mode_switch = key == auth::mode_widget().key();
        state.draft.insert(key, value.clone());
        if mode_switch {
            let variant_keys = &self.variant_keys;
            state.draft.retain(|k, _| !variant_keys.contains(k));
            if self.displayed_mode(&state) == self.committed_mode(&state) {
                state.draft.remove(&auth::mode_widget().key());
            }
        }
        Ok(Fill::Changed)
    }

    async fn click(&self, widget: &Widget) -> E2eResult<Click> {
        let mut state = self.state.lock();
        if !self.rendered(&state, widget) {
            return Ok(Click::Unavailable);
        }

        if Self::is_save(widget) {
            return Ok(self.save(&mut state));
        }
        if Self::is_reset(widget) {
            return Ok(self.reset(&mut state));
        }

        let key = widget.key();
        if key == ServerView::smtp_verify().key() {
            state.counters.verifies += 1;
        } else if auth::validate_button(AuthMode::Ldap).map(|w| w.key()) == Some(key.clone()) {
            state.counters.validations += 1;
            state.flash.clear();
            if let Some(error) = state.faults.validate_error.clone() {
                state.flash.push(FlashMessage::new(FlashLevel::Error, error));
            }
        } else if key == downloads::summary_download().key() {
            if let Some((target, _)) = state.location.clone() {
                state.downloads.push(format!("{} summary", target));
            }
        }
        Ok(Click::Clicked)
    }

    async fn is_active(&self, widget: &Widget) -> E2eResult<bool> {
        let state = self.state.lock();
        if !self.rendered(&state, widget) {
            return Ok(false);
        }
        if Self::is_save(widget) {
            return Ok(!state.draft.is_empty() && !state.faults.save_disabled);
        }
        if Self::is_reset(widget) {
            return Ok(!state.draft.is_empty());
        }
        Ok(true)
    }

    async fn select_item(&self, widget: &Widget, item: &str) -> E2eResult<Click> {
        let mut state = self.state.lock();
        if widget.kind != WidgetKind::Dropdown || !self.rendered(&state, widget) {
            return Ok(Click::Unavailable);
        }
        let Some(format) = ExportFormat::ALL
            .iter()
            .find(|f| f.menu_item() == item && f.is_available(&self.config.version))
        else {
            return Ok(Click::Unavailable);
        };
        if let Some((target, _)) = state.location.clone() {
            state
                .downloads
                .push(format!("{} as {}", target, format.label()));
        }
        Ok(Click::Clicked)
    }

    async fn flash_messages(&self) -> E2eResult<Vec<FlashMessage>> {
        Ok(self.state.lock().flash.clone())
    }

    async fn refresh(&self) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.counters.refreshes += 1;
        state.draft.clear();
        state.flash.clear();
        Ok(())
    }
}

#[async_trait]
impl Navigator for SimulatedAppliance {
    async fn navigate_to(
        &self,
        target: &Target,
        destination: Destination,
        options: NavigateOptions,
    ) -> E2eResult<()> {
        let valid = matches!(
            (target, destination),
            (Target::Server, Destination::Server)
                | (Target::Server, Destination::Authentication)
                | (Target::Collection(_), Destination::All)
                | (Target::Entity { .. }, Destination::Details)
        );
        if !valid {
            return Err(E2eError::Navigation(format!(
                "no {} view for {}",
                destination.as_str(),
                target
            )));
        }

        let mut state = self.state.lock();
        let here = Some((target.clone(), destination));
        if state.location == here && !options.use_resetter {
            debug!("Already at {} of {}", destination.as_str(), target);
            return Ok(());
        }

        state.counters.navigations += 1;
        state.location = here;
        state.draft.clear();
        state.flash.clear();
        if options.use_resetter {
            state.faults.stale_smtp = false;
        }
        Ok(())
    }
}

#[async_trait]
impl RoleStore for SimulatedAppliance {
    async fn server_roles(&self) -> E2eResult<ServerRoles> {
        Ok(self.state.lock().roles.clone())
    }

    async fn set_server_roles(&self, roles: &ServerRoles) -> E2eResult<()> {
        let mut state = self.state.lock();
        state.counters.role_writes += 1;
        if state.faults.failing_role_writes > 0 {
            state.faults.failing_role_writes -= 1;
            return Err(E2eError::RoleStore("settings write rejected".to_string()));
        }
        state.roles = roles.clone();
        Ok(())
    }
}

#[async_trait]
impl RemoteShell for SimulatedAppliance {
    async fn run_command(&self, command: &str) -> E2eResult<CommandOutput> {
        let mut state = self.state.lock();
        state.commands.push(command.to_string());
        let failing = state
            .faults
            .failing_command
            .as_deref()
            .is_some_and(|pattern| command.contains(pattern));
        Ok(CommandOutput {
            status: if failing { 1 } else { 0 },
            stdout: String::new(),
            stderr: if failing {
                "simulated failure".to_string()
            } else {
                String::new()
            },
        })
    }
}

#[async_trait]
impl Inventory for SimulatedAppliance {
    async fn entity_names(&self, collection: NetworkCollection) -> E2eResult<Vec<String>> {
        Ok(self
            .config
            .inventory
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn instantiate(&self, collection: NetworkCollection, name: &str) -> E2eResult<Target> {
        let matches = self
            .config
            .inventory
            .get(&collection)
            .map(|names| names.iter().filter(|n| *n == name).count())
            .unwrap_or(0);
        match matches {
            0 => Err(E2eError::EntityNotFound {
                collection: collection.to_string(),
                name: name.to_string(),
            }),
            1 => Ok(Target::Entity {
                collection,
                name: name.to_string(),
            }),
            _ => Err(E2eError::ManyEntitiesFound {
                collection: collection.to_string(),
                name: name.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fill_then_refill_original_is_unchanged() {
        let sim = SimulatedAppliance::new(SimConfig::default());
        sim.navigate_to(&Target::Server, Destination::Server, NavigateOptions::default())
            .await
            .unwrap();

        let widget = crate::forms::Logging::widgets().remove(0);
        assert_eq!(sim.fill(&widget, &"debug".into()).await.unwrap(), Fill::Changed);
        assert_eq!(sim.fill(&widget, &"debug".into()).await.unwrap(), Fill::Unchanged);
        assert!(sim.has_pending_changes());
        assert!(sim.is_active(&ServerView::buttons().save).await.unwrap());
    }

    #[tokio::test]
    async fn test_widgets_off_page_unavailable() {
        let sim = SimulatedAppliance::new(SimConfig::default());
        sim.navigate_to(&Target::Server, Destination::Authentication, NavigateOptions::default())
            .await
            .unwrap();

        let widget = crate::forms::Logging::widgets().remove(0);
        assert_eq!(sim.fill(&widget, &"debug".into()).await.unwrap(), Fill::Unavailable);
        assert!(sim.read(&widget).await.is_err());
    }

    #[tokio::test]
    async fn test_save_without_changes_unavailable() {
        let sim = SimulatedAppliance::new(SimConfig::default());
        sim.navigate_to(&Target::Server, Destination::Server, NavigateOptions::default())
            .await
            .unwrap();
        assert_eq!(
            sim.click(&ServerView::buttons().save).await.unwrap(),
            Click::Unavailable
        );
        assert_eq!(sim.counters().saves, 0);
    }

    #[tokio::test]
    async fn test_ambiguous_entity() {
        let mut config = SimConfig::default();
        config.inventory.insert(
            NetworkCollection::CloudNetworks,
            vec!["public".to_string(), "public".to_string()],
        );
        let sim = SimulatedAppliance::new(config);
        let err = sim
            .instantiate(NetworkCollection::CloudNetworks, "public")
            .await
            .unwrap_err();
        assert!(matches!(err, E2eError::ManyEntitiesFound { .. }));
    }
}
