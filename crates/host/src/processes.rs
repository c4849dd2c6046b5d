//! Process listing and signalling

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;
use sysinfo::{Pid, Process, Signal, System, Users};
use warden_core::{Error, Result};

pub const DEFAULT_LIMIT: usize = 50;
const SIGTERM: i32 = 15;

#[derive(Debug, Clone, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub username: String,
    pub status: String,
    pub cpu_percent: f32,
    pub mem_percent: f64,
    pub mem_rss: u64,
    pub cmdline: String,
    pub create_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessList {
    pub processes: Vec<ProcessInfo>,
    /// Processes on the host, before the limit was applied
    pub total: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct KillRequest {
    /// Signal number; SIGTERM when absent or zero
    #[serde(default)]
    pub signal: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KillResponse {
    pub pid: u32,
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ProcessManager {
    system: Arc<Mutex<System>>,
    own_pid: u32,
}

impl ProcessManager {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
            own_pid: std::process::id(),
        }
    }

    /// The `limit` busiest processes by CPU
    pub async fn list_top(&self, limit: usize) -> Result<ProcessList> {
        let system = Arc::clone(&self.system);
        tokio::task::spawn_blocking(move || {
            let mut sys = system.lock();
            sys.refresh_memory();
            sys.refresh_processes();
            let users = Users::new_with_refreshed_list();
            top_processes(&sys, &users, limit)
        })
        .await
        .map_err(|e| Error::internal(format!("process listing panicked: {e}")))
    }

    /// Send `signal` to `pid`.
    ///
    /// Init and the agent itself are refused outright; an unknown pid is
    /// `NotFound`.
    pub async fn kill(&self, pid: u32, signal: Option<i32>) -> Result<KillResponse> {
        if pid == 1 || pid == self.own_pid {
            return Err(Error::forbidden(
                pid.to_string(),
                format!("killing process {pid} is not allowed"),
            ));
        }

        let signo = signal.filter(|s| *s != 0).unwrap_or(SIGTERM);
        let signal = signal_from_number(signo)
            .ok_or_else(|| Error::bad_request(format!("unsupported signal {signo}")))?;

        let system = Arc::clone(&self.system);
        tokio::task::spawn_blocking(move || {
            let mut sys = system.lock();
            let target = Pid::from_u32(pid);
            sys.refresh_process(target);

            let process = sys
                .process(target)
                .ok_or_else(|| Error::not_found(pid.to_string(), format!("process {pid} not found")))?;

            match process.kill_with(signal) {
                Some(true) => {
                    tracing::info!(pid, signal = signo, name = %process.name(), "signal sent");
                    Ok(KillResponse {
                        pid,
                        success: true,
                        message: format!("signal {signo} sent to process {pid}"),
                    })
                }
                Some(false) => Err(Error::command_execution(
                    "kill",
                    format!("failed to send signal {signo} to process {pid}"),
                    None,
                )),
                None => Err(Error::bad_request(format!(
                    "signal {signo} is not supported on this platform"
                ))),
            }
        })
        .await
        .map_err(|e| Error::internal(format!("kill panicked: {e}")))?
    }
}

impl Default for ProcessManager {
    fn default() -> Self {
        Self::new()
    }
}

fn top_processes(sys: &System, users: &Users, limit: usize) -> ProcessList {
    let total_memory = sys.total_memory();
    let mut processes: Vec<ProcessInfo> = sys
        .processes()
        .iter()
        .map(|(pid, process)| describe(*pid, process, users, total_memory))
        .collect();

    processes.sort_by(|a, b| {
        b.cpu_percent
            .partial_cmp(&a.cpu_percent)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.pid.cmp(&b.pid))
    });

    let total = processes.len();
    processes.truncate(limit);
    ProcessList { processes, total }
}

#[allow(clippy::cast_precision_loss)]
fn describe(pid: Pid, process: &Process, users: &Users, total_memory: u64) -> ProcessInfo {
    let username = process
        .user_id()
        .and_then(|uid| users.get_user_by_id(uid))
        .map(|u| u.name().to_string())
        .unwrap_or_default();

    let mem_percent = if total_memory == 0 {
        0.0
    } else {
        process.memory() as f64 / total_memory as f64 * 100.0
    };

    ProcessInfo {
        pid: pid.as_u32(),
        name: process.name().to_string(),
        username,
        status: process.status().to_string(),
        cpu_percent: process.cpu_usage(),
        mem_percent,
        mem_rss: process.memory(),
        cmdline: process.cmd().join(" "),
        create_time: i64::try_from(process.start_time())
            .ok()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
    }
}

/// Map a POSIX signal number onto the portable `sysinfo` signal set
pub fn signal_from_number(signo: i32) -> Option<Signal> {
    Some(match signo {
        1 => Signal::Hangup,
        2 => Signal::Interrupt,
        3 => Signal::Quit,
        6 => Signal::Abort,
        9 => Signal::Kill,
        10 => Signal::User1,
        12 => Signal::User2,
        15 => Signal::Term,
        18 => Signal::Continue,
        19 => Signal::Stop,
        _ => return None,
    })
}
