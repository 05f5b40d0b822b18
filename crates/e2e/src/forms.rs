//! Typed sub-forms of the server settings tab.
//!
//! Each sub-form is a plain record whose members are all optional: `None`
//! leaves the field untouched on fill and marks it unset in remembered state.
//! The widget declaration of the panel lives next to the record.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use appliance_common::{FieldMap, FieldValue};

use crate::browser::Browser;
use crate::error::{E2eError, E2eResult};
use crate::protocol::Staged;
use crate::widget::{Locator, Widget};

/// A panel of related fields backed by a typed record
pub trait SubForm: Serialize + DeserializeOwned + Default + Clone + Send + Sync {
    /// Panel name used in logs and errors
    const PANEL: &'static str;

    fn widgets() -> Vec<Widget>;

    /// Set members as a field map
    fn values(&self) -> E2eResult<FieldMap> {
        let mut map = FieldMap::new();
        if let serde_json::Value::Object(fields) = serde_json::to_value(self)? {
            for (name, value) in fields {
                if value.is_null() {
                    continue;
                }
                let value = FieldValue::from_json(&name, &value)?;
                map.insert(name, value);
            }
        }
        Ok(map)
    }

    /// Build the record from a field map; names outside the panel are rejected
    fn from_values(values: FieldMap) -> E2eResult<Self> {
        let widgets = Self::widgets();
        let mut fields = serde_json::Map::new();
        for (name, value) in values {
            if !widgets.iter().any(|w| w.name == name && w.kind.is_readable()) {
                return Err(E2eError::Config(format!(
                    "{} is not a field of {}",
                    name,
                    Self::PANEL
                )));
            }
            fields.insert(name, value.to_json());
        }
        Ok(serde_json::from_value(serde_json::Value::Object(fields))?)
    }

    /// Overlay the set members of `other` onto this record
    fn merge(&mut self, other: &Self) -> E2eResult<()> {
        let mut values = self.values()?;
        values.extend(other.values()?);
        *self = Self::from_values(values)?;
        Ok(())
    }

    fn field_names() -> Vec<String> {
        Self::widgets()
            .into_iter()
            .filter(|w| w.kind.is_readable())
            .map(|w| w.name)
            .collect()
    }
}

/// Check every value against its widget before anything is written
fn resolve<'a>(
    panel: &str,
    widgets: &'a [Widget],
    values: &'a FieldMap,
) -> E2eResult<Vec<(&'a Widget, &'a FieldValue)>> {
    values
        .iter()
        .map(|(name, value)| {
            let widget = widgets
                .iter()
                .find(|w| &w.name == name)
                .ok_or_else(|| E2eError::Config(format!("{} is not a field of {}", name, panel)))?;
            if !widget.kind.is_fillable() {
                return Err(E2eError::Config(format!(
                    "{} of {} is read-only",
                    name, panel
                )));
            }
            if widget.kind.is_boolean() != value.as_bool().is_some() {
                return Err(E2eError::Config(format!(
                    "{} of {} expects a {} value, got {}",
                    name,
                    panel,
                    if widget.kind.is_boolean() { "boolean" } else { "text" },
                    value
                )));
            }
            Ok((widget, value))
        })
        .collect()
}

/// Fill the given values into the panel's widgets
pub async fn fill_widgets(
    browser: &dyn Browser,
    panel: &str,
    widgets: &[Widget],
    values: &FieldMap,
) -> E2eResult<Staged> {
    let resolved = resolve(panel, widgets, values)?;

    let mut staged = Staged::Unchanged;
    for (widget, value) in resolved {
        staged = staged.record(browser.fill(widget, value).await?);
        if staged == Staged::Unavailable {
            tracing::debug!("{} not rendered while filling {}", widget, panel);
            break;
        }
    }
    Ok(staged)
}

/// Read every value-carrying widget
pub async fn read_widgets(browser: &dyn Browser, widgets: &[Widget]) -> E2eResult<FieldMap> {
    let mut values = FieldMap::new();
    for widget in widgets.iter().filter(|w| w.kind.is_readable()) {
        values.insert(widget.name.clone(), browser.read(widget).await?);
    }
    Ok(values)
}

pub async fn fill_form<F: SubForm>(browser: &dyn Browser, form: &F) -> E2eResult<Staged> {
    fill_widgets(browser, F::PANEL, &F::widgets(), &form.values()?).await
}

pub async fn read_form<F: SubForm>(browser: &dyn Browser) -> E2eResult<F> {
    let values = read_widgets(browser, &F::widgets()).await?;
    F::from_values(values)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BasicInformation {
    /// Read-only
    pub hostname: Option<String>,
    pub company_name: Option<String>,
    pub appliance_name: Option<String>,
    pub appliance_zone: Option<String>,
    pub time_zone: Option<String>,
    pub locale: Option<String>,
}

impl SubForm for BasicInformation {
    const PANEL: &'static str = "Basic Information";

    fn widgets() -> Vec<Widget> {
        vec![
            Widget::text(
                "hostname",
                Locator::xpath(".//label[normalize-space(.)=\"Hostname\"]/../div"),
            ),
            Widget::input("company_name", "server_company"),
            Widget::input("appliance_name", "server_name"),
            Widget::select("appliance_zone", "server_zone"),
            Widget::select("time_zone", "server_timezone"),
            Widget::select("locale", "locale"),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct VmwareConsole {
    pub console_type: Option<String>,
}

impl SubForm for VmwareConsole {
    const PANEL: &'static str = "VMware Console Support";

    fn widgets() -> Vec<Widget> {
        vec![Widget::select("console_type", "console_type")]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NtpServers {
    pub ntp_server_1: Option<String>,
    pub ntp_server_2: Option<String>,
    pub ntp_server_3: Option<String>,
}

impl SubForm for NtpServers {
    const PANEL: &'static str = "NTP Servers";

    fn widgets() -> Vec<Widget> {
        vec![
            Widget::input("ntp_server_1", "ntp_server_1"),
            Widget::input("ntp_server_2", "ntp_server_2"),
            Widget::input("ntp_server_3", "ntp_server_3"),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SmtpServer {
    pub host: Option<String>,
    pub port: Option<String>,
    pub domain: Option<String>,
    pub start_tls: Option<bool>,
    pub ssl_verify: Option<String>,
    pub auth: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_email: Option<String>,
    /// Destination of the test e-mail
    pub to_email: Option<String>,
}

impl SubForm for SmtpServer {
    const PANEL: &'static str = "SMTP Server";

    fn widgets() -> Vec<Widget> {
        vec![
            Widget::input("host", "smtp_host"),
            Widget::input("port", "smtp_port"),
            Widget::input("domain", "smtp_domain"),
            Widget::checkbox("start_tls", "smtp_enable_starttls_auto"),
            Widget::select("ssl_verify", "smtp_openssl_verify_mode"),
            Widget::select("auth", "smtp_authentication"),
            Widget::input("username", "smtp_user_name"),
            Widget::input("password", "smtp_password"),
            Widget::input("from_email", "smtp_from"),
            Widget::input("to_email", "smtp_test_to"),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WebServices {
    pub mode: Option<String>,
    pub security: Option<String>,
}

impl SubForm for WebServices {
    const PANEL: &'static str = "Web Services";

    fn widgets() -> Vec<Widget> {
        vec![
            Widget::select("mode", "webservices_mode"),
            Widget::select("security", "webservices_security"),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Logging {
    pub log_level: Option<String>,
}

impl SubForm for Logging {
    const PANEL: &'static str = "Logging";

    fn widgets() -> Vec<Widget> {
        vec![Widget::select("log_level", "log_level")]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomSupportUrl {
    pub url: Option<String>,
    pub description: Option<String>,
}

impl SubForm for CustomSupportUrl {
    const PANEL: &'static str = "Custom Support URL";

    fn widgets() -> Vec<Widget> {
        vec![
            Widget::input("url", "custom_support_url"),
            Widget::input("description", "custom_support_url_description"),
        ]
    }
}

/// Sub-forms addressable by name from scenarios
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormName {
    BasicInformation,
    VmwareConsole,
    NtpServers,
    SmtpServer,
    WebServices,
    Logging,
    CustomSupportUrl,
}

impl FormName {
    pub fn widgets(&self) -> Vec<Widget> {
        match self {
            FormName::BasicInformation => BasicInformation::widgets(),
            FormName::VmwareConsole => VmwareConsole::widgets(),
            FormName::NtpServers => NtpServers::widgets(),
            FormName::SmtpServer => SmtpServer::widgets(),
            FormName::WebServices => WebServices::widgets(),
            FormName::Logging => Logging::widgets(),
            FormName::CustomSupportUrl => CustomSupportUrl::widgets(),
        }
    }
}
