//! Playwright browser automation
//!
//! A long-lived node process hosts one Playwright page. Commands go over its
//! stdin as one JSON object per line and each gets exactly one JSON reply on
//! stdout, so the page keeps its state between a fill and the save that
//! follows it. Replies echo the command id; a reply that arrives after its
//! command timed out is dropped instead of answering the next one.

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command as TokioCommand};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use appliance_common::FieldValue;

use crate::browser::{
    Browser, Click, Destination, Fill, FlashMessage, NavigateOptions, Navigator, Target,
};
use crate::downloads::NetworkCollection;
use crate::error::{E2eError, E2eResult};
use crate::views;
use crate::widget::{Widget, WidgetKind};

/// Node side of the bridge
const BRIDGE_SCRIPT: &str = r#"
const readline = require('readline');
const playwright = require('playwright');

const options = JSON.parse(process.argv[2]);

let currentId = null;

function reply(value) {
  process.stdout.write(JSON.stringify({ id: currentId, ok: true, value: value === undefined ? null : value }) + '\n');
}

function fail(error) {
  process.stdout.write(JSON.stringify({ id: currentId, ok: false, error: String(error && error.message || error) }) + '\n');
}

async function current(loc, kind) {
  switch (kind) {
    case 'text': return (await loc.innerText()).trim();
    case 'input': return await loc.inputValue();
    case 'select': return await loc.evaluate(el => el.selectedIndex < 0 ? '' : el.options[el.selectedIndex].text.trim());
    case 'switch':
    case 'checkbox': return await loc.isChecked();
    default: throw new Error('widget kind ' + kind + ' carries no value');
  }
}

async function present(page, selector) {
  const loc = page.locator(selector).first();
  return (await page.locator(selector).count()) > 0 ? loc : null;
}

(async () => {
  const browser = await playwright[options.browser].launch({ headless: options.headless });
  const context = await browser.newContext({
    viewport: { width: options.viewport_width, height: options.viewport_height },
    ignoreHTTPSErrors: true,
    acceptDownloads: true,
  });
  const page = await context.newPage();
  page.setDefaultTimeout(options.action_timeout_ms);

  const lines = readline.createInterface({ input: process.stdin });
  for await (const line of lines) {
    let cmd;
    currentId = null;
    try {
      cmd = JSON.parse(line);
      currentId = cmd.id;
    } catch (e) {
      fail(e);
      continue;
    }
    try {
      switch (cmd.op) {
        case 'goto':
          await page.goto(cmd.url);
          reply(page.url());
          break;
        case 'url':
          reply(page.url());
          break;
        case 'read': {
          const loc = await present(page, cmd.selector);
          reply(loc ? { found: true, value: await current(loc, cmd.kind) } : { found: false });
          break;
        }
        case 'fill': {
          const loc = await present(page, cmd.selector);
          if (!loc || !(await loc.isEnabled())) { reply('unavailable'); break; }
          if ((await current(loc, cmd.kind)) === cmd.value) { reply('unchanged'); break; }
          if (cmd.kind === 'select') await loc.selectOption({ label: cmd.value });
          else if (cmd.kind === 'switch' || cmd.kind === 'checkbox') await loc.setChecked(cmd.value, { force: true });
          else await loc.fill(cmd.value);
          reply('changed');
          break;
        }
        case 'click': {
          const loc = await present(page, cmd.selector);
          if (!loc || !(await loc.isVisible()) || !(await loc.isEnabled())) { reply('unavailable'); break; }
          await loc.click();
          await page.waitForLoadState('networkidle');
          reply('clicked');
          break;
        }
        case 'is_active': {
          const loc = await present(page, cmd.selector);
          reply(!!loc && (await loc.isVisible()) && (await loc.isEnabled()));
          break;
        }
        case 'select_item': {
          const loc = await present(page, cmd.selector);
          if (!loc || !(await loc.isEnabled())) { reply('unavailable'); break; }
          await loc.click();
          const item = page.locator('ul.dropdown-menu li a', { hasText: cmd.item }).first();
          if ((await item.count()) === 0 || !(await item.isVisible())) { reply('unavailable'); break; }
          const download = page.waitForEvent('download', { timeout: options.action_timeout_ms }).catch(() => null);
          await item.click();
          const file = await download;
          if (file) await file.path();
          reply('clicked');
          break;
        }
        case 'flash': {
          const messages = await page.locator('#flash_msg_div .alert, .flash_text_div .alert').evaluateAll(els =>
            els.map(el => {
              const c = el.className;
              const level = c.includes('alert-danger') ? 'error'
                : c.includes('alert-warning') ? 'warning'
                : c.includes('alert-success') ? 'success' : 'info';
              return { level, text: el.innerText.trim() };
            }));
          reply(messages);
          break;
        }
        case 'refresh':
          await page.reload();
          reply(null);
          break;
        case 'close':
          reply(null);
          await browser.close();
          process.exit(0);
        default:
          fail('unknown op ' + cmd.op);
      }
    } catch (e) {
      fail(e);
    }
  }
  await browser.close();
})().catch(e => {
  console.error(e);
  process.exit(1);
});
"#;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrowserEngine {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl BrowserEngine {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserEngine::Chromium => "chromium",
            BrowserEngine::Firefox => "firefox",
            BrowserEngine::Webkit => "webkit",
        }
    }
}

/// Configuration for Playwright
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaywrightConfig {
    pub browser: BrowserEngine,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Per-action timeout inside the page
    pub action_timeout_ms: u64,

    /// How long a navigation may take to show its view
    pub view_timeout_ms: u64,

    /// Interval between view readiness checks
    pub poll_interval_ms: u64,

    /// Where `require('playwright')` resolves from, if not global
    pub node_path: Option<PathBuf>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            browser: BrowserEngine::Chromium,
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            action_timeout_ms: 10_000,
            view_timeout_ms: 30_000,
            poll_interval_ms: 500,
            node_path: None,
        }
    }
}

impl PlaywrightConfig {
    /// Launch options handed to the bridge script
    fn launch_options(&self) -> serde_json::Value {
        serde_json::json!({
            "browser": self.browser.as_str(),
            "headless": self.headless,
            "viewport_width": self.viewport_width,
            "viewport_height": self.viewport_height,
            "action_timeout_ms": self.action_timeout_ms,
        })
    }
}

/// URL path templates per destination.
///
/// `{sid}` expands to the server id and `{controller}` to the UI controller
/// of a network collection. Entity summaries get the name as a search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteTable {
    pub server: String,
    pub authentication: String,
    pub all: String,
    pub details: String,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self {
            server: "/ops/explorer?id=svr-{sid}&tab=settings_server".to_string(),
            authentication: "/ops/explorer?id=svr-{sid}&tab=settings_authentication".to_string(),
            all: "/{controller}/show_list".to_string(),
            details: "/{controller}/show_list".to_string(),
        }
    }
}

/// UI controller serving a network collection
fn controller(collection: NetworkCollection) -> &'static str {
    match collection {
        NetworkCollection::NetworkProviders => "ems_network",
        NetworkCollection::Balancers => "load_balancer",
        NetworkCollection::CloudNetworks => "cloud_network",
        NetworkCollection::NetworkPorts => "network_port",
        NetworkCollection::NetworkSecurityGroups => "security_group",
        NetworkCollection::NetworkSubnets => "cloud_subnet",
        NetworkCollection::NetworkRouters => "network_router",
    }
}

impl RouteTable {
    /// Absolute URL of a destination
    pub fn url(
        &self,
        base_url: &str,
        sid: u32,
        target: &Target,
        destination: Destination,
    ) -> E2eResult<String> {
        let (template, collection) = match (target, destination) {
            (Target::Server, Destination::Server) => (&self.server, None),
            (Target::Server, Destination::Authentication) => (&self.authentication, None),
            (Target::Collection(collection), Destination::All) => (&self.all, Some(*collection)),
            (Target::Entity { collection, .. }, Destination::Details) => {
                (&self.details, Some(*collection))
            }
            _ => {
                return Err(E2eError::Navigation(format!(
                    "no route to {} of {}",
                    destination.as_str(),
                    target
                )))
            }
        };

        let mut path = template.replace("{sid}", &sid.to_string());
        if let Some(collection) = collection {
            path = path.replace("{controller}", controller(collection));
        }

        let base = Url::parse(base_url)
            .map_err(|e| E2eError::Config(format!("invalid base_url {}: {}", base_url, e)))?;
        let mut url = base
            .join(&path)
            .map_err(|e| E2eError::Navigation(format!("invalid route {}: {}", path, e)))?;
        if let Target::Entity { name, .. } = target {
            url.query_pairs_mut().append_pair("search_text", name);
        }
        Ok(url.to_string())
    }
}

/// One request to the bridge
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum BridgeCommand<'a> {
    Goto { url: &'a str },
    Url,
    Read { selector: String, kind: WidgetKind },
    Fill {
        selector: String,
        kind: WidgetKind,
        value: serde_json::Value,
    },
    Click { selector: String },
    IsActive { selector: String },
    SelectItem { selector: String, item: &'a str },
    Flash,
    Refresh,
    Close,
}

/// A command with the id its reply must echo
#[derive(Debug, Serialize)]
struct Envelope<'a> {
    id: u64,
    #[serde(flatten)]
    command: &'a BridgeCommand<'a>,
}

#[derive(Debug, Deserialize)]
struct BridgeReply {
    #[serde(default)]
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    value: serde_json::Value,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadReply {
    found: bool,
    #[serde(default)]
    value: serde_json::Value,
}

struct Bridge {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    _script_dir: tempfile::TempDir,
}

impl Bridge {
    /// Read lines until the reply to `id` shows up
    async fn reply_to(&mut self, id: u64) -> E2eResult<BridgeReply> {
        loop {
            let line = self
                .stdout
                .next_line()
                .await?
                .ok_or_else(|| E2eError::Playwright("bridge exited".to_string()))?;
            debug!("bridge -> {}", line);
            if let Some(reply) = pair_reply(id, &line)? {
                return Ok(reply);
            }
        }
    }
}

/// Parse a reply line for command `id`; `None` for a late reply to an
/// earlier command
fn pair_reply(id: u64, line: &str) -> E2eResult<Option<BridgeReply>> {
    let reply: BridgeReply = serde_json::from_str(line)?;
    match reply.id {
        Some(got) if got == id => Ok(Some(reply)),
        Some(got) if got < id => {
            warn!("Dropping late bridge reply to command {} while waiting for {}", got, id);
            Ok(None)
        }
        Some(got) => Err(E2eError::Playwright(format!(
            "bridge answered command {} before it was sent",
            got
        ))),
        None => Err(E2eError::Playwright(format!(
            "bridge reply without command id: {}",
            reply.error.unwrap_or_default()
        ))),
    }
}

/// Browser driven through a Playwright page
pub struct PlaywrightBrowser {
    bridge: Mutex<Bridge>,
    timeout: Duration,
}

impl PlaywrightBrowser {
    /// Start node with the bridge script and wait for nothing; the first
    /// command blocks until the page is up.
    pub async fn launch(config: &PlaywrightConfig) -> E2eResult<Self> {
        Self::check_playwright_installed()?;

        let script_dir = tempfile::tempdir()?;
        let script_path = script_dir.path().join("bridge.js");
        std::fs::write(&script_path, BRIDGE_SCRIPT)?;

        let mut command = TokioCommand::new("node");
        command
            .arg(&script_path)
            .arg(config.launch_options().to_string())
            .current_dir(script_dir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);
        if let Some(node_path) = &config.node_path {
            command.env("NODE_PATH", node_path);
        }

        let mut child = command.spawn()?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| E2eError::Playwright("bridge stdout not captured".to_string()))?;

        info!(
            "Launched {} bridge ({})",
            config.browser.as_str(),
            if config.headless { "headless" } else { "headed" }
        );

        Ok(Self {
            bridge: Mutex::new(Bridge {
                child,
                stdin,
                stdout: BufReader::new(stdout).lines(),
                next_id: 0,
                _script_dir: script_dir,
            }),
            // navigation and save round trips include page loads
            timeout: Duration::from_millis(config.action_timeout_ms * 3),
        })
    }

    /// Check if Playwright is installed
    fn check_playwright_installed() -> E2eResult<()> {
        let output = Command::new("npx")
            .args(["playwright", "--version"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();

        match output {
            Ok(status) if status.success() => Ok(()),
            _ => Err(E2eError::PlaywrightNotFound),
        }
    }

    async fn request(&self, command: BridgeCommand<'_>) -> E2eResult<serde_json::Value> {
        let mut bridge = self.bridge.lock().await;
        bridge.next_id += 1;
        let id = bridge.next_id;

        let line = serde_json::to_string(&Envelope {
            id,
            command: &command,
        })?;
        debug!("bridge <- {}", line);
        bridge.stdin.write_all(line.as_bytes()).await?;
        bridge.stdin.write_all(b"\n").await?;
        bridge.stdin.flush().await?;

        let reply = tokio::time::timeout(self.timeout, bridge.reply_to(id))
            .await
            .map_err(|_| E2eError::Timeout(format!("bridge reply to {}", line)))??;
        if reply.ok {
            Ok(reply.value)
        } else {
            Err(E2eError::Playwright(
                reply.error.unwrap_or_else(|| "unknown bridge error".to_string()),
            ))
        }
    }

    async fn outcome(&self, command: BridgeCommand<'_>) -> E2eResult<String> {
        match self.request(command).await? {
            serde_json::Value::String(outcome) => Ok(outcome),
            other => Err(E2eError::Playwright(format!(
                "unexpected bridge outcome {}",
                other
            ))),
        }
    }

    pub async fn goto(&self, url: &str) -> E2eResult<()> {
        self.request(BridgeCommand::Goto { url }).await?;
        Ok(())
    }

    pub async fn current_url(&self) -> E2eResult<String> {
        match self.request(BridgeCommand::Url).await? {
            serde_json::Value::String(url) => Ok(url),
            other => Err(E2eError::Playwright(format!("unexpected page url {}", other))),
        }
    }

    /// Close the browser and wait for node to exit
    pub async fn close(&self) -> E2eResult<()> {
        if let Err(e) = self.request(BridgeCommand::Close).await {
            warn!("Bridge did not acknowledge close: {}", e);
        }
        let mut bridge = self.bridge.lock().await;
        bridge.child.wait().await?;
        Ok(())
    }
}

fn click_outcome(outcome: &str) -> E2eResult<Click> {
    match outcome {
        "clicked" => Ok(Click::Clicked),
        "unavailable" => Ok(Click::Unavailable),
        other => Err(E2eError::Playwright(format!("unexpected click outcome {}", other))),
    }
}

#[async_trait]
impl Browser for PlaywrightBrowser {
    async fn read(&self, widget: &Widget) -> E2eResult<FieldValue> {
        let value = self
            .request(BridgeCommand::Read {
                selector: widget.locator.selector(),
                kind: widget.kind,
            })
            .await?;
        let reply: ReadReply = serde_json::from_value(value)?;
        if !reply.found {
            return Err(E2eError::WidgetNotFound(widget.to_string()));
        }
        Ok(FieldValue::from_json(&widget.name, &reply.value)?)
    }

    async fn fill(&self, widget: &Widget, value: &FieldValue) -> E2eResult<Fill> {
        let outcome = self
            .outcome(BridgeCommand::Fill {
                selector: widget.locator.selector(),
                kind: widget.kind,
                value: value.to_json(),
            })
            .await?;
        match outcome.as_str() {
            "changed" => Ok(Fill::Changed),
            "unchanged" => Ok(Fill::Unchanged),
            "unavailable" => Ok(Fill::Unavailable),
            other => Err(E2eError::Playwright(format!("unexpected fill outcome {}", other))),
        }
    }

    async fn click(&self, widget: &Widget) -> E2eResult<Click> {
        let outcome = self
            .outcome(BridgeCommand::Click {
                selector: widget.locator.selector(),
            })
            .await?;
        click_outcome(&outcome)
    }

    async fn is_active(&self, widget: &Widget) -> E2eResult<bool> {
        let value = self
            .request(BridgeCommand::IsActive {
                selector: widget.locator.selector(),
            })
            .await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn select_item(&self, widget: &Widget, item: &str) -> E2eResult<Click> {
        let outcome = self
            .outcome(BridgeCommand::SelectItem {
                selector: widget.locator.selector(),
                item,
            })
            .await?;
        click_outcome(&outcome)
    }

    async fn flash_messages(&self) -> E2eResult<Vec<FlashMessage>> {
        let value = self.request(BridgeCommand::Flash).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn refresh(&self) -> E2eResult<()> {
        self.request(BridgeCommand::Refresh).await?;
        Ok(())
    }
}

/// Navigates a [`PlaywrightBrowser`] by URL
pub struct RouteNavigator {
    browser: Arc<PlaywrightBrowser>,
    routes: RouteTable,
    base_url: String,
    sid: u32,
    view_timeout: Duration,
    poll_interval: Duration,
}

impl RouteNavigator {
    pub fn new(
        browser: Arc<PlaywrightBrowser>,
        routes: RouteTable,
        base_url: impl Into<String>,
        sid: u32,
        config: &PlaywrightConfig,
    ) -> Self {
        Self {
            browser,
            routes,
            base_url: base_url.into(),
            sid,
            view_timeout: Duration::from_millis(config.view_timeout_ms),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        }
    }

    async fn wait_for_view(&self, destination: Destination) -> E2eResult<()> {
        let deadline = tokio::time::Instant::now() + self.view_timeout;
        loop {
            if views::is_displayed(self.browser.as_ref(), destination).await? {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(E2eError::Timeout(format!(
                    "{} view not displayed after {:?}",
                    destination.as_str(),
                    self.view_timeout
                )));
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl Navigator for RouteNavigator {
    async fn navigate_to(
        &self,
        target: &Target,
        destination: Destination,
        options: NavigateOptions,
    ) -> E2eResult<()> {
        let url = self.routes.url(&self.base_url, self.sid, target, destination)?;

        let here = self.browser.current_url().await?;
        if options.use_resetter || here != url {
            debug!("Navigating to {} of {}: {}", destination.as_str(), target, url);
            self.browser.goto(&url).await?;
        } else {
            debug!("Already at {} of {}", destination.as_str(), target);
        }

        if options.wait_for_view {
            self.wait_for_view(destination).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_routes_carry_sid() {
        let routes = RouteTable::default();
        let url = routes
            .url("https://10.0.0.5", 2, &Target::Server, Destination::Authentication)
            .unwrap();
        assert_eq!(
            url,
            "https://10.0.0.5/ops/explorer?id=svr-2&tab=settings_authentication"
        );
    }

    #[test]
    fn test_entity_name_is_encoded() {
        let routes = RouteTable::default();
        let target = Target::Entity {
            collection: NetworkCollection::CloudNetworks,
            name: "ext net".to_string(),
        };
        let url = routes
            .url("https://10.0.0.5/", 1, &target, Destination::Details)
            .unwrap();
        assert_eq!(
            url,
            "https://10.0.0.5/cloud_network/show_list?search_text=ext+net"
        );
    }

    #[test]
    fn test_mismatched_route_rejected() {
        let routes = RouteTable::default();
        let err = routes
            .url("https://10.0.0.5", 1, &Target::Server, Destination::All)
            .unwrap_err();
        assert!(matches!(err, E2eError::Navigation(_)));
    }

    #[test]
    fn test_commands_serialize_tagged() {
        let line = serde_json::to_value(BridgeCommand::Fill {
            selector: "[name=\"smtp_host\"]".to_string(),
            kind: WidgetKind::Input,
            value: serde_json::json!("mail.example.com"),
        })
        .unwrap();
        assert_eq!(line["op"], "fill");
        assert_eq!(line["kind"], "input");
        assert_eq!(line["value"], "mail.example.com");

        let line = serde_json::to_value(BridgeCommand::IsActive {
            selector: "x".to_string(),
        })
        .unwrap();
        assert_eq!(line["op"], "is_active");
    }

    #[test]
    fn test_commands_carry_their_id() {
        let command = BridgeCommand::Click {
            selector: "#save".to_string(),
        };
        let line = serde_json::to_value(Envelope {
            id: 7,
            command: &command,
        })
        .unwrap();
        assert_eq!(line["id"], 7);
        assert_eq!(line["op"], "click");
        assert_eq!(line["selector"], "#save");

        let line = serde_json::to_value(Envelope {
            id: 8,
            command: &BridgeCommand::Flash,
        })
        .unwrap();
        assert_eq!(line["id"], 8);
        assert_eq!(line["op"], "flash");
    }

    /// A fill that timed out must not answer the click sent after it
    #[test]
    fn test_late_reply_is_not_paired_with_next_command() {
        let late = r#"{"id":3,"ok":true,"value":"changed"}"#;
        let current = r#"{"id":4,"ok":true,"value":"clicked"}"#;

        assert!(pair_reply(4, late).unwrap().is_none());
        let reply = pair_reply(4, current).unwrap().unwrap();
        assert_eq!(reply.value, "clicked");
    }

    #[test]
    fn test_unpaired_replies_are_errors() {
        let err = pair_reply(4, r#"{"id":5,"ok":true,"value":null}"#).unwrap_err();
        assert!(matches!(err, E2eError::Playwright(_)));

        let err = pair_reply(4, r#"{"id":null,"ok":false,"error":"bad json"}"#).unwrap_err();
        assert!(matches!(err, E2eError::Playwright(ref m) if m.contains("bad json")));
    }

    #[test]
    fn test_launch_options() {
        let options = PlaywrightConfig::default().launch_options();
        assert_eq!(options["browser"], "chromium");
        assert_eq!(options["headless"], true);
    }
}
