//! Authentication tab of the server settings

use tracing::{info, warn};

use appliance_common::FieldMap;

use crate::appliance::Appliance;
use crate::auth::{AuthForm, AuthMode, AuthProvider, AuthSettings, UserType};
use crate::browser::{Click, Destination, NavigateOptions, Target};
use crate::error::{E2eError, E2eResult};
use crate::forms::fill_widgets;
use crate::protocol::{
    assert_message, assert_success_message, verify_no_error, SaveAction, Staged, RESET_MESSAGE,
};
use crate::views::AuthenticationView;

/// Options of [`AuthenticationSetting::configure`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigureOptions {
    pub user_type: Option<UserType>,
    /// Reset the page after filling instead of saving
    pub reset: bool,
    /// Validate provider-backed settings before saving
    pub validate: bool,
}

impl Default for ConfigureOptions {
    fn default() -> Self {
        Self {
            user_type: None,
            reset: false,
            validate: true,
        }
    }
}

/// Authentication settings of the appliance server
pub struct AuthenticationSetting {
    appliance: Appliance,
}

impl AuthenticationSetting {
    pub fn new(appliance: Appliance) -> Self {
        Self { appliance }
    }

    async fn navigate(&self, options: NavigateOptions) -> E2eResult<()> {
        self.appliance
            .navigate_to(&Target::Server, Destination::Authentication, options)
            .await
    }

    fn saved_message(&self) -> String {
        self.appliance.settings_saved_message("Authentication")
    }

    /// Mode currently selected in the UI
    pub async fn auth_mode(&self) -> E2eResult<AuthMode> {
        self.navigate(NavigateOptions::wait()).await?;
        AuthForm::new(self.appliance.browser.as_ref()).mode().await
    }

    /// Switch to database or external authentication, which need no
    /// provider settings
    pub async fn set_auth_mode(&self, mode: AuthMode) -> E2eResult<SaveAction> {
        if !matches!(mode, AuthMode::Database | AuthMode::External) {
            return Err(E2eError::Config(
                "Setting auth_mode directly only allows for Database and External".to_string(),
            ));
        }

        self.navigate(NavigateOptions::wait()).await?;
        let browser = self.appliance.browser.as_ref();
        let staged = AuthForm::new(browser).select_mode(mode).await?;
        match staged {
            Staged::Changed => self.click_save().await,
            Staged::Unchanged => Ok(SaveAction::Unchanged),
            Staged::Unavailable => Err(E2eError::WidgetNotFound(
                "authentication mode dropdown".to_string(),
            )),
        }
    }

    /// Set the session timeout; `None` leaves a part untouched
    pub async fn set_session_timeout(
        &self,
        hours: Option<&str>,
        minutes: Option<&str>,
    ) -> E2eResult<SaveAction> {
        let mut values = FieldMap::new();
        if let Some(hours) = hours {
            values.insert("hours_timeout".to_string(), hours.into());
        }
        if let Some(minutes) = minutes {
            values.insert("minutes_timeout".to_string(), minutes.into());
        }

        self.navigate(NavigateOptions::wait()).await?;
        let browser = self.appliance.browser.as_ref();
        let widgets = [
            AuthenticationView::hours_timeout(),
            AuthenticationView::minutes_timeout(),
        ];
        let staged = fill_widgets(browser, AuthenticationView::TITLE, &widgets, &values).await?;
        match staged {
            Staged::Changed => {
                let buttons = AuthenticationView::buttons();
                match browser.click(&buttons.save).await? {
                    Click::Clicked => {
                        assert_message(browser, &self.saved_message()).await?;
                        Ok(SaveAction::Committed)
                    }
                    Click::Unavailable => Err(E2eError::WidgetNotFound(
                        "authentication save button".to_string(),
                    )),
                }
            }
            Staged::Unchanged => Ok(SaveAction::Unchanged),
            Staged::Unavailable => Err(E2eError::WidgetNotFound(
                "session timeout selects".to_string(),
            )),
        }
    }

    /// Mode and active variant fields as shown in the UI
    pub async fn auth_settings(&self) -> E2eResult<AuthSettings> {
        self.navigate(NavigateOptions::default()).await?;
        AuthForm::new(self.appliance.browser.as_ref()).read().await
    }

    /// Fill mode and variant fields and save, without provider handling
    pub async fn set_auth_settings(&self, settings: &AuthSettings) -> E2eResult<SaveAction> {
        self.navigate(NavigateOptions::wait()).await?;
        let staged = AuthForm::new(self.appliance.browser.as_ref())
            .fill(settings)
            .await?;
        match staged {
            Staged::Changed => self.click_save().await,
            Staged::Unchanged => Ok(SaveAction::Unchanged),
            Staged::Unavailable => Err(E2eError::WidgetNotFound(format!(
                "{} authentication fields",
                settings.mode()
            ))),
        }
    }

    /// Configure an authentication mode, taking provider-backed settings
    /// from `provider`. `None` selects database authentication.
    pub async fn configure(
        &self,
        mode: Option<AuthMode>,
        provider: Option<&dyn AuthProvider>,
        options: ConfigureOptions,
    ) -> E2eResult<SaveAction> {
        let mode = mode.unwrap_or(AuthMode::Database);
        let settings = match mode {
            AuthMode::Database => {
                if provider.is_some() {
                    warn!("auth_mode is Database, ignoring auth_provider");
                }
                AuthSettings::Database
            }
            AuthMode::External => AuthSettings::External(
                provider
                    .map(|p| p.as_fill_external_value())
                    .unwrap_or_default(),
            ),
            _ => match provider {
                Some(provider) => provider.as_fill_value(mode, options.user_type)?,
                None => {
                    return Err(E2eError::Config(format!(
                        "{} authentication requires an auth provider",
                        mode
                    )))
                }
            },
        };
        if settings.mode() != mode {
            return Err(E2eError::Config(format!(
                "provider returned {} settings for {} authentication",
                settings.mode(),
                mode
            )));
        }

        self.navigate(NavigateOptions::wait()).await?;
        let browser = self.appliance.browser.as_ref();
        let form = AuthForm::new(browser);
        let staged = form.fill(&settings).await?;

        if options.reset {
            let buttons = AuthenticationView::buttons();
            if browser.click(&buttons.reset).await? == Click::Unavailable {
                warn!("Reset unavailable, nothing to reset on the authentication form");
                return Ok(SaveAction::RevertUnavailable);
            }
            assert_message(browser, RESET_MESSAGE).await?;
            info!("Authentication form reset, returning");
            return Ok(SaveAction::Reverted);
        }

        match staged {
            Staged::Changed => {
                if options.validate && mode.requires_provider() {
                    form.validate(mode).await?;
                    verify_no_error(browser).await?;
                }
                self.click_save_and_confirm().await
            }
            Staged::Unchanged => {
                info!("No authentication settings changed, not saving form.");
                Ok(SaveAction::Unchanged)
            }
            Staged::Unavailable => Err(E2eError::WidgetNotFound(format!(
                "{} authentication fields",
                mode
            ))),
        }
    }

    /// Save, tolerating a disabled button after a no-op password change.
    /// An error flash after the click fails the save.
    async fn click_save(&self) -> E2eResult<SaveAction> {
        let browser = self.appliance.browser.as_ref();
        let buttons = AuthenticationView::buttons();
        match browser.click(&buttons.save).await? {
            Click::Clicked => {
                verify_no_error(browser).await?;
                Ok(SaveAction::Committed)
            }
            Click::Unavailable => {
                warn!(
                    "Save unavailable when trying to save auth settings, \
                     assuming auth settings unchanged"
                );
                Ok(SaveAction::SaveUnavailable)
            }
        }
    }

    async fn click_save_and_confirm(&self) -> E2eResult<SaveAction> {
        let action = self.click_save().await?;
        if action == SaveAction::Committed {
            assert_success_message(self.appliance.browser.as_ref(), &self.saved_message()).await?;
        }
        Ok(action)
    }
}
