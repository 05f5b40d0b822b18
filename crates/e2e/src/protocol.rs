//! Commit/revert lifecycle shared by every settings form:
//! stage → decide commit-or-revert → execute → verify.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::browser::{Browser, Click, Fill, FlashLevel};
use crate::error::{E2eError, E2eResult};
use crate::widget::Widget;

/// Flash text confirming a reset
pub const RESET_MESSAGE: &str = "All changes have been reset";

/// Outcome of staging field values into a form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Staged {
    Changed,
    Unchanged,
    /// A target widget was not rendered; staging stopped there
    Unavailable,
}

impl Staged {
    /// Fold one widget fill into the running result
    pub fn record(self, fill: Fill) -> Staged {
        match (self, fill) {
            (Staged::Unavailable, _) | (_, Fill::Unavailable) => Staged::Unavailable,
            (Staged::Changed, _) | (_, Fill::Changed) => Staged::Changed,
            _ => Staged::Unchanged,
        }
    }

    pub fn changed(&self) -> bool {
        *self == Staged::Changed
    }
}

/// The single action taken after staging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveAction {
    Committed,
    /// Save was not offered by the page after a change was staged
    SaveUnavailable,
    Reverted,
    /// Reset was not offered, nothing to revert
    RevertUnavailable,
    Unchanged,
}

/// Save and reset buttons of a form
#[derive(Debug, Clone)]
pub struct FormButtons {
    pub save: Widget,
    pub reset: Widget,
}

/// Decide and execute exactly one of commit, revert, or nothing.
pub async fn save_action(
    browser: &dyn Browser,
    buttons: &FormButtons,
    staged: Staged,
    revert: bool,
) -> E2eResult<SaveAction> {
    if revert {
        return match browser.click(&buttons.reset).await? {
            Click::Clicked => {
                if has_message(browser, RESET_MESSAGE).await? {
                    Ok(SaveAction::Reverted)
                } else {
                    warn!("Reset clicked but no reset confirmation shown");
                    Ok(SaveAction::RevertUnavailable)
                }
            }
            Click::Unavailable => {
                warn!("No values was changed, nothing to reset");
                Ok(SaveAction::RevertUnavailable)
            }
        };
    }

    match staged {
        Staged::Changed => match browser.click(&buttons.save).await? {
            Click::Clicked => {
                verify_no_error(browser).await?;
                Ok(SaveAction::Committed)
            }
            Click::Unavailable => {
                warn!("Save button unavailable after changing fields, assuming settings unchanged");
                Ok(SaveAction::SaveUnavailable)
            }
        },
        Staged::Unchanged => {
            info!("Settings were not changed");
            Ok(SaveAction::Unchanged)
        }
        Staged::Unavailable => Err(E2eError::WidgetNotFound(
            "form field not rendered while staging changes".to_string(),
        )),
    }
}

/// Fail if any error flash is shown
pub async fn verify_no_error(browser: &dyn Browser) -> E2eResult<()> {
    let messages = browser.flash_messages().await?;
    let errors: Vec<&str> = messages
        .iter()
        .filter(|m| m.is_error())
        .map(|m| m.text.as_str())
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(E2eError::Verification(errors.join("; ")))
    }
}

/// Fail unless a non-error flash with exactly this text is shown
pub async fn assert_message(browser: &dyn Browser, text: &str) -> E2eResult<()> {
    if has_message(browser, text).await? {
        Ok(())
    } else {
        Err(E2eError::Verification(format!("expected flash message: {}", text)))
    }
}

/// Fail unless a success flash with exactly this text is shown
pub async fn assert_success_message(browser: &dyn Browser, text: &str) -> E2eResult<()> {
    let messages = browser.flash_messages().await?;
    if messages
        .iter()
        .any(|m| m.level == FlashLevel::Success && m.text == text)
    {
        Ok(())
    } else {
        Err(E2eError::Verification(format!("expected success message: {}", text)))
    }
}

async fn has_message(browser: &dyn Browser, text: &str) -> E2eResult<bool> {
    let messages = browser.flash_messages().await?;
    Ok(messages.iter().any(|m| !m.is_error() && m.text == text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_record() {
        let staged = Staged::Unchanged.record(Fill::Unchanged);
        assert_eq!(staged, Staged::Unchanged);
        let staged = staged.record(Fill::Changed).record(Fill::Unchanged);
        assert_eq!(staged, Staged::Changed);
        assert_eq!(staged.record(Fill::Unavailable), Staged::Unavailable);
        assert_eq!(Staged::Unavailable.record(Fill::Changed), Staged::Unavailable);
    }
}
