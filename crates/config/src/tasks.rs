use warden_core::TaskDefinition;

/// The built-in task table
#[must_use]
pub fn default_tasks() -> Vec<TaskDefinition> {
    vec![
        TaskDefinition::new("apt-update", "apt update", "Update package lists", false),
        TaskDefinition::new("apt-upgrade", "apt upgrade -y", "Upgrade packages", false),
        TaskDefinition::new("df", "df -h", "Check disk space", false),
        TaskDefinition::new("free", "free -m", "Check memory", false),
        TaskDefinition::new("uptime", "uptime", "System uptime", false),
        TaskDefinition::new("who", "who", "Logged-in users", false),
        TaskDefinition::new("pi-temp", "vcgencmd measure_temp", "Pi temperature", false),
        TaskDefinition::new("reboot", "reboot", "Reboot system", true),
    ]
}
