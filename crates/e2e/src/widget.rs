//! Declarative widgets bound to locatable UI controls

use serde::{Deserialize, Serialize};
use std::fmt;

/// How a control is found on the rendered page
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    /// `name` attribute of a form control
    Name(String),
    /// `id` attribute
    Id(String),
    /// Raw XPath expression
    XPath(String),
    /// `title` attribute, used by the authentication tab buttons
    Title(String),
    /// Visible button text
    ButtonText(String),
}

impl Locator {
    pub fn name(name: impl Into<String>) -> Self {
        Locator::Name(name.into())
    }

    pub fn id(id: impl Into<String>) -> Self {
        Locator::Id(id.into())
    }

    pub fn xpath(xpath: impl Into<String>) -> Self {
        Locator::XPath(xpath.into())
    }

    pub fn title(title: impl Into<String>) -> Self {
        Locator::Title(title.into())
    }

    pub fn button_text(text: impl Into<String>) -> Self {
        Locator::ButtonText(text.into())
    }

    /// Selector string understood by Playwright's `page.locator()`
    pub fn selector(&self) -> String {
        match self {
            Locator::Name(name) => format!("[name=\"{}\"]", name),
            Locator::Id(id) => format!("[id=\"{}\"]", id),
            Locator::XPath(xpath) => format!("xpath={}", xpath),
            Locator::Title(title) => format!("[title=\"{}\"]", title),
            Locator::ButtonText(text) => format!("button:has-text(\"{}\")", text),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Name(name) => write!(f, "name={}", name),
            Locator::Id(id) => write!(f, "id={}", id),
            Locator::XPath(xpath) => write!(f, "xpath={}", xpath),
            Locator::Title(title) => write!(f, "title={}", title),
            Locator::ButtonText(text) => write!(f, "button={}", text),
        }
    }
}

/// Kind of control behind a widget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WidgetKind {
    /// Read-only text
    Text,
    Input,
    /// Bootstrap select, holds the visible option label
    Select,
    /// Bootstrap on/off switch
    Switch,
    Checkbox,
    Button,
    /// Toolbar menu with selectable items
    Dropdown,
}

impl WidgetKind {
    /// Whether the widget carries a value that can be filled
    pub fn is_fillable(&self) -> bool {
        matches!(
            self,
            WidgetKind::Input | WidgetKind::Select | WidgetKind::Switch | WidgetKind::Checkbox
        )
    }

    /// Whether the widget carries a value that can be read
    pub fn is_readable(&self) -> bool {
        self.is_fillable() || *self == WidgetKind::Text
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self, WidgetKind::Switch | WidgetKind::Checkbox)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WidgetKind::Text => "text",
            WidgetKind::Input => "input",
            WidgetKind::Select => "select",
            WidgetKind::Switch => "switch",
            WidgetKind::Checkbox => "checkbox",
            WidgetKind::Button => "button",
            WidgetKind::Dropdown => "dropdown",
        }
    }
}

/// A named, typed slot bound to one control
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Widget {
    pub name: String,
    pub kind: WidgetKind,
    pub locator: Locator,
}

impl Widget {
    pub fn new(name: impl Into<String>, kind: WidgetKind, locator: Locator) -> Self {
        Self {
            name: name.into(),
            kind,
            locator,
        }
    }

    pub fn text(name: &str, locator: Locator) -> Self {
        Self::new(name, WidgetKind::Text, locator)
    }

    pub fn input(name: &str, control_name: &str) -> Self {
        Self::new(name, WidgetKind::Input, Locator::name(control_name))
    }

    pub fn select(name: &str, id: &str) -> Self {
        Self::new(name, WidgetKind::Select, Locator::id(id))
    }

    pub fn switch(name: &str, control_name: &str) -> Self {
        Self::new(name, WidgetKind::Switch, Locator::name(control_name))
    }

    pub fn checkbox(name: &str, control_name: &str) -> Self {
        Self::new(name, WidgetKind::Checkbox, Locator::name(control_name))
    }

    pub fn button(name: &str, locator: Locator) -> Self {
        Self::new(name, WidgetKind::Button, locator)
    }

    /// Key identifying the underlying control, unique per page
    pub fn key(&self) -> String {
        self.locator.to_string()
    }
}

impl fmt::Display for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} {})", self.name, self.kind.as_str(), self.locator)
    }
}
