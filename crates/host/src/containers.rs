//! Containers via the `docker` CLI

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use warden_core::{Error, Result};

use crate::command;
use crate::services::ServiceAction;

const DOCKER: &str = "docker";
const SHORT_ID_LEN: usize = 12;
const STOP_TIMEOUT_SECS: &str = "30";
const ACTION_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_TAIL: &str = "100";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContainerInfo {
    pub id: String,
    pub name: String,
    pub image: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub image_id: String,
    pub state: String,
    pub status: String,
    pub created: String,
    pub ports: String,
    pub labels: BTreeMap<String, String>,
    pub networks: Vec<String>,
    pub mounts: Vec<Mount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mount {
    #[serde(rename = "type")]
    pub kind: String,
    pub source: String,
    pub destination: String,
    pub mode: String,
    pub rw: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerList {
    pub containers: Vec<ContainerInfo>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContainerActionResult {
    pub id: String,
    pub action: String,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    pub tail: Option<String>,
    pub since: Option<String>,
    pub until: Option<String>,
    pub timestamps: bool,
}

/// Trait for talking to a container engine
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list(&self, all: bool) -> Result<Vec<ContainerInfo>>;

    async fn inspect(&self, id: &str) -> Result<ContainerInfo>;

    async fn act(&self, id: &str, action: ServiceAction) -> Result<ContainerActionResult>;

    async fn logs(&self, id: &str, options: &LogOptions) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Default)]
pub struct DockerCli;

impl DockerCli {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn list(&self, all: bool) -> Result<Vec<ContainerInfo>> {
        let mut args = vec!["ps", "--no-trunc", "--format", "{{json .}}"];
        if all {
            args.push("--all");
        }
        let output = command::run_checked(DOCKER, &args, command::DEFAULT_TIMEOUT).await?;

        command::stdout_text(&output)
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(parse_ps_line)
            .collect()
    }

    async fn inspect(&self, id: &str) -> Result<ContainerInfo> {
        validate_id(id)?;
        let output = command::run(DOCKER, &["inspect", "--type", "container", id], command::DEFAULT_TIMEOUT)
            .await?;

        if !output.status.success() {
            let stderr = command::stderr_text(&output);
            if stderr.contains("No such") {
                return Err(Error::not_found(id, format!("container '{id}' not found")));
            }
            return Err(Error::command_execution(DOCKER, stderr, output.status.code()));
        }

        let mut inspected: Vec<InspectOutput> = serde_json::from_slice(&output.stdout)?;
        inspected
            .pop()
            .map(ContainerInfo::from)
            .ok_or_else(|| Error::not_found(id, format!("container '{id}' not found")))
    }

    async fn act(&self, id: &str, action: ServiceAction) -> Result<ContainerActionResult> {
        validate_id(id)?;
        let args: Vec<&str> = match action {
            ServiceAction::Start => vec!["start", id],
            ServiceAction::Stop => vec!["stop", "-t", STOP_TIMEOUT_SECS, id],
            ServiceAction::Restart => vec!["restart", "-t", STOP_TIMEOUT_SECS, id],
        };
        let output = command::run(DOCKER, &args, ACTION_TIMEOUT).await?;

        let success = output.status.success();
        let message = if success {
            match action {
                ServiceAction::Start => "container started",
                ServiceAction::Stop => "container stopped",
                ServiceAction::Restart => "container restarted",
            }
            .to_string()
        } else {
            format!("failed to {action} container: {}", command::stderr_text(&output))
        };

        tracing::info!(container = id, %action, success, "container action");
        Ok(ContainerActionResult {
            id: id.to_string(),
            action: action.to_string(),
            success,
            message,
        })
    }

    async fn logs(&self, id: &str, options: &LogOptions) -> Result<Vec<String>> {
        validate_id(id)?;
        let args = log_args(id, options);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = command::run_checked(DOCKER, &args, command::DEFAULT_TIMEOUT).await?;

        // `docker logs` replays the container's stderr on ours
        let mut lines: Vec<String> = command::stdout_text(&output)
            .lines()
            .map(str::to_string)
            .collect();
        lines.extend(
            String::from_utf8_lossy(&output.stderr)
                .lines()
                .map(str::to_string),
        );
        Ok(lines)
    }
}

/// Container references are names or hex ids; anything else never reaches docker
fn validate_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && !id.starts_with('-')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if valid {
        Ok(())
    } else {
        Err(Error::bad_request(format!("invalid container id '{id}'")))
    }
}

fn log_args(id: &str, options: &LogOptions) -> Vec<String> {
    let tail = options
        .tail
        .clone()
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TAIL.to_string());
    let mut args = vec!["logs".to_string(), "--tail".to_string(), tail];
    if let Some(since) = &options.since {
        args.extend(["--since".to_string(), since.clone()]);
    }
    if let Some(until) = &options.until {
        args.extend(["--until".to_string(), until.clone()]);
    }
    if options.timestamps {
        args.push("--timestamps".to_string());
    }
    args.push(id.to_string());
    args
}

fn short_id(id: &str) -> String {
    id.chars().take(SHORT_ID_LEN).collect()
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PsLine {
    #[serde(rename = "ID")]
    id: String,
    names: String,
    image: String,
    state: String,
    status: String,
    #[serde(default)]
    created_at: String,
    #[serde(default)]
    ports: String,
    #[serde(default)]
    labels: String,
    #[serde(default)]
    networks: String,
}

fn parse_ps_line(line: &str) -> Result<ContainerInfo> {
    let ps: PsLine = serde_json::from_str(line)?;
    Ok(ContainerInfo {
        id: short_id(&ps.id),
        name: ps.names.split(',').next().unwrap_or_default().to_string(),
        image: ps.image,
        image_id: String::new(),
        state: ps.state,
        status: ps.status,
        created: ps.created_at,
        ports: ps.ports,
        labels: ps
            .labels
            .split(',')
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        networks: ps
            .networks
            .split(',')
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect(),
        mounts: Vec::new(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectOutput {
    id: String,
    name: String,
    image: String,
    created: String,
    state: InspectState,
    config: InspectConfig,
    #[serde(default)]
    network_settings: InspectNetworks,
    #[serde(default)]
    mounts: Vec<InspectMount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    image: String,
    #[serde(default)]
    labels: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetworks {
    #[serde(default)]
    networks: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectMount {
    #[serde(rename = "Type", default)]
    kind: String,
    #[serde(default)]
    source: String,
    destination: String,
    #[serde(default)]
    mode: String,
    #[serde(rename = "RW", default)]
    rw: bool,
}

impl From<InspectOutput> for ContainerInfo {
    fn from(raw: InspectOutput) -> Self {
        ContainerInfo {
            id: short_id(&raw.id),
            name: raw.name.trim_start_matches('/').to_string(),
            image: raw.config.image,
            image_id: raw.image,
            state: raw.state.status.clone(),
            status: raw.state.status,
            created: raw.created,
            ports: String::new(),
            labels: raw.config.labels.unwrap_or_default(),
            networks: raw.network_settings.networks.into_keys().collect(),
            mounts: raw
                .mounts
                .into_iter()
                .map(|m| Mount {
                    kind: m.kind,
                    source: m.source,
                    destination: m.destination,
                    mode: m.mode,
                    rw: m.rw,
                })
                .collect(),
        }
    }
}
