//! Page-level widgets of the server settings tabs

use appliance_common::{FieldValue, Version};

use crate::auth::{self, AuthMode};
use crate::browser::{Browser, Destination};
use crate::error::E2eResult;
use crate::forms::{
    BasicInformation, CustomSupportUrl, Logging, NtpServers, SmtpServer, SubForm, VmwareConsole,
    WebServices,
};
use crate::gate;
use crate::protocol::FormButtons;
use crate::roles;
use crate::widget::{Locator, Widget};

/// Server tab of the server settings
pub struct ServerView;

impl ServerView {
    pub const TITLE: &'static str = "Basic Information";

    pub fn title() -> Widget {
        Widget::text("title", Locator::xpath("//div[@id='settings_server']/h3[1]"))
    }

    pub fn buttons() -> FormButtons {
        FormButtons {
            save: Widget::button("save", Locator::button_text("Save")),
            reset: Widget::button("reset", Locator::button_text("Reset")),
        }
    }

    /// SMTP verify button, sends the test e-mail
    pub fn smtp_verify() -> Widget {
        Widget::button("verify", Locator::button_text("Verify"))
    }

    /// Every widget rendered on the tab for the given version
    pub fn widgets(version: &Version) -> Vec<Widget> {
        let buttons = Self::buttons();
        let mut widgets = vec![Self::title(), buttons.save, buttons.reset, Self::smtp_verify()];
        widgets.extend(BasicInformation::widgets());
        widgets.extend(gate::supported_roles(version).iter().map(|r| r.widget()));
        widgets.push(roles::default_smart_proxy_widget());
        if gate::is_supported(gate::Gated::VmwareConsole, version) {
            widgets.extend(VmwareConsole::widgets());
        }
        widgets.extend(NtpServers::widgets());
        widgets.extend(SmtpServer::widgets());
        widgets.extend(WebServices::widgets());
        widgets.extend(Logging::widgets());
        widgets.extend(CustomSupportUrl::widgets());
        widgets
    }
}

/// Authentication tab of the server settings
pub struct AuthenticationView;

impl AuthenticationView {
    pub const TITLE: &'static str = "Authentication";

    pub fn title() -> Widget {
        Widget::text(
            "title",
            Locator::xpath("//div[@id='settings_authentication']/h3[1]"),
        )
    }

    pub fn buttons() -> FormButtons {
        FormButtons {
            save: Widget::button("save", Locator::title("Save Changes")),
            reset: Widget::button("reset", Locator::title("Reset Changes")),
        }
    }

    pub fn hours_timeout() -> Widget {
        Widget::select("hours_timeout", "session_timeout_hours")
    }

    pub fn minutes_timeout() -> Widget {
        Widget::select("minutes_timeout", "session_timeout_mins")
    }

    /// Widgets rendered while `mode` is the selected authentication mode
    pub fn widgets(mode: AuthMode) -> Vec<Widget> {
        let buttons = Self::buttons();
        let mut widgets = vec![
            Self::title(),
            buttons.save,
            buttons.reset,
            Self::hours_timeout(),
            Self::minutes_timeout(),
            auth::mode_widget(),
        ];
        widgets.extend(auth::variant_widgets(mode));
        widgets.extend(auth::validate_button(mode));
        widgets
    }
}

/// Title widget and its expected text once a destination is displayed
pub fn readiness(destination: Destination) -> Option<(Widget, &'static str)> {
    match destination {
        Destination::Server => Some((ServerView::title(), ServerView::TITLE)),
        Destination::Authentication => {
            Some((AuthenticationView::title(), AuthenticationView::TITLE))
        }
        Destination::All | Destination::Details => None,
    }
}

/// Whether the destination view is currently displayed
pub async fn is_displayed(browser: &dyn Browser, destination: Destination) -> E2eResult<bool> {
    match readiness(destination) {
        Some((title, expected)) => match browser.read(&title).await {
            Ok(FieldValue::Text(text)) => Ok(text.trim() == expected),
            Ok(_) => Ok(false),
            Err(crate::error::E2eError::WidgetNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        },
        None => Ok(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_server_tab_controls_unique() {
        let widgets = ServerView::widgets(&Version::Latest);
        let keys: HashSet<_> = widgets.iter().map(|w| w.key()).collect();
        assert_eq!(keys.len(), widgets.len());
    }

    #[test]
    fn test_old_versions_hide_gated_widgets() {
        let widgets = ServerView::widgets(&Version::new(&[5, 7]));
        assert!(!widgets.iter().any(|w| w.name == "embedded_ansible"));
        assert!(!widgets.iter().any(|w| w.name == "console_type"));
        assert!(widgets.iter().any(|w| w.name == "automate"));
    }

    #[test]
    fn test_auth_tab_follows_mode() {
        assert!(!AuthenticationView::widgets(AuthMode::Database)
            .iter()
            .any(|w| w.name == "host1"));
        assert!(AuthenticationView::widgets(AuthMode::Ldaps)
            .iter()
            .any(|w| w.name == "bind_password"));
    }
}
