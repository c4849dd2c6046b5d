//! systemd units via `systemctl`

use async_trait::async_trait;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use warden_core::{Error, Result};

use crate::command;

const SYSTEMCTL: &str = "systemctl";
const UNIT_SUFFIX: &str = ".service";
const ACTION_TIMEOUT: Duration = Duration::from_secs(30);

const SHOW_PROPERTIES: &str = "Description,LoadState,ActiveState,SubState,MainPID,ExecStart,User,Group,MemoryCurrent,TasksCurrent,ActiveEnterTimestamp";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServiceInfo {
    pub name: String,
    pub description: String,
    pub load_state: String,
    pub active_state: String,
    pub sub_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub main_pid: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exec_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tasks: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceList {
    pub services: Vec<ServiceInfo>,
    pub total: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceAction {
    Start,
    Stop,
    Restart,
}

impl ServiceAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceAction::Start => "start",
            ServiceAction::Stop => "stop",
            ServiceAction::Restart => "restart",
        }
    }
}

impl fmt::Display for ServiceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceAction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start" => Ok(ServiceAction::Start),
            "stop" => Ok(ServiceAction::Stop),
            "restart" => Ok(ServiceAction::Restart),
            other => Err(Error::bad_request(format!("unknown action: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceActionResult {
    pub name: String,
    pub action: String,
    pub success: bool,
    pub message: String,
}

/// Trait for managing system services.
/// The agent only ever calls it for names that passed the allow-list.
#[async_trait]
pub trait ServiceManager: Send + Sync {
    /// Every loaded service unit; the caller filters
    async fn list(&self) -> Result<Vec<ServiceInfo>>;

    async fn get(&self, name: &str) -> Result<ServiceInfo>;

    async fn act(&self, name: &str, action: ServiceAction) -> Result<ServiceActionResult>;
}

#[derive(Debug, Clone, Default)]
pub struct Systemctl;

impl Systemctl {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ServiceManager for Systemctl {
    async fn list(&self) -> Result<Vec<ServiceInfo>> {
        let output = command::run_checked(
            SYSTEMCTL,
            &["list-units", "--type=service", "--all", "--no-legend", "--plain", "--no-pager"],
            command::DEFAULT_TIMEOUT,
        )
        .await?;

        Ok(parse_list_units(&command::stdout_text(&output)))
    }

    async fn get(&self, name: &str) -> Result<ServiceInfo> {
        let unit = unit_name(name);
        let property_arg = format!("--property={SHOW_PROPERTIES}");
        let output = command::run_checked(
            SYSTEMCTL,
            &["show", &unit, &property_arg, "--no-pager"],
            command::DEFAULT_TIMEOUT,
        )
        .await?;

        let info = parse_show(short_name(name), &command::stdout_text(&output));
        if info.load_state == "not-found" {
            return Err(Error::not_found(name, format!("service '{name}' not found")));
        }
        Ok(info)
    }

    async fn act(&self, name: &str, action: ServiceAction) -> Result<ServiceActionResult> {
        let unit = unit_name(name);
        let output = match command::run(SYSTEMCTL, &[action.as_str(), &unit], ACTION_TIMEOUT).await {
            Ok(output) => output,
            Err(Error::Timeout { .. }) => {
                return Ok(ServiceActionResult {
                    name: name.to_string(),
                    action: action.to_string(),
                    success: false,
                    message: "operation timed out".to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        let success = output.status.success();
        let message = if success {
            format!("service {} {action}: done", short_name(name))
        } else {
            format!("failed to {action} service: {}", command::stderr_text(&output))
        };

        tracing::info!(service = name, %action, success, "service action");
        Ok(ServiceActionResult {
            name: name.to_string(),
            action: action.to_string(),
            success,
            message,
        })
    }
}

fn unit_name(name: &str) -> String {
    if name.ends_with(UNIT_SUFFIX) {
        name.to_string()
    } else {
        format!("{name}{UNIT_SUFFIX}")
    }
}

fn short_name(name: &str) -> &str {
    name.strip_suffix(UNIT_SUFFIX).unwrap_or(name)
}

/// Lines of `UNIT LOAD ACTIVE SUB DESCRIPTION...`
fn parse_list_units(stdout: &str) -> Vec<ServiceInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let unit = fields.next()?;
            if !unit.ends_with(UNIT_SUFFIX) {
                return None;
            }
            let load_state = fields.next()?.to_string();
            let active_state = fields.next()?.to_string();
            let sub_state = fields.next()?.to_string();
            let description = fields.collect::<Vec<_>>().join(" ");

            Some(ServiceInfo {
                name: short_name(unit).to_string(),
                description,
                load_state,
                active_state,
                sub_state,
                ..ServiceInfo::default()
            })
        })
        .collect()
}

/// `KEY=value` lines from `systemctl show`
fn parse_show(name: &str, stdout: &str) -> ServiceInfo {
    let props: HashMap<&str, &str> = stdout
        .lines()
        .filter_map(|line| line.split_once('='))
        .collect();

    let text = |key: &str| props.get(key).map(|v| v.trim().to_string());
    let non_empty = |key: &str| text(key).filter(|v| !v.is_empty());
    // systemd prints "[not set]" or u64::MAX for unavailable counters
    let counter = |key: &str| {
        props
            .get(key)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|v| *v != u64::MAX)
    };

    ServiceInfo {
        name: name.to_string(),
        description: text("Description").unwrap_or_default(),
        load_state: text("LoadState").unwrap_or_default(),
        active_state: text("ActiveState").unwrap_or_default(),
        sub_state: text("SubState").unwrap_or_default(),
        main_pid: props
            .get("MainPID")
            .and_then(|v| v.trim().parse::<u32>().ok())
            .filter(|pid| *pid != 0),
        exec_start: props.get("ExecStart").and_then(|v| exec_path(v)),
        user: non_empty("User"),
        group: non_empty("Group"),
        started_at: non_empty("ActiveEnterTimestamp"),
        memory: counter("MemoryCurrent"),
        tasks: counter("TasksCurrent"),
    }
}

/// `{ path=/usr/sbin/nginx ; argv[]=... }` -> `/usr/sbin/nginx`
fn exec_path(raw: &str) -> Option<String> {
    let rest = &raw[raw.find("path=")? + "path=".len()..];
    let end = rest.find([' ', ';']).unwrap_or(rest.len());
    Some(rest[..end].to_string()).filter(|p| !p.is_empty())
}
