//! Remote commands over ssh

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use crate::browser::{CommandOutput, RemoteShell};
use crate::config::ApplianceConfig;
use crate::error::E2eResult;

/// Runs commands on the appliance host through the system ssh client.
/// Key-based access is required; password prompts are disabled.
pub struct SshShell {
    user: String,
    host: String,
    port: u16,
}

impl SshShell {
    pub fn new(config: &ApplianceConfig) -> E2eResult<Self> {
        Ok(Self {
            user: config.ssh_user.clone(),
            host: config.host()?,
            port: config.ssh_port,
        })
    }

    fn args(&self, command: &str) -> Vec<String> {
        vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-p".to_string(),
            self.port.to_string(),
            format!("{}@{}", self.user, self.host),
            command.to_string(),
        ]
    }
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn run_command(&self, command: &str) -> E2eResult<CommandOutput> {
        debug!("ssh {}@{}: {}", self.user, self.host, command);
        let output = Command::new("ssh")
            .args(self.args(command))
            .stdin(Stdio::null())
            .output()
            .await?;

        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_target_appliance_host() {
        let config = ApplianceConfig {
            base_url: "https://10.1.2.3:8443/".to_string(),
            ssh_port: 2222,
            ..Default::default()
        };
        let shell = SshShell::new(&config).unwrap();
        let args = shell.args("uptime");
        assert_eq!(args[5], "2222");
        assert_eq!(args[6], "root@10.1.2.3");
        assert_eq!(args.last().map(String::as_str), Some("uptime"));
    }
}
