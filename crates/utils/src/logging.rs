use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Handle on the installed level filter
///
/// Logging starts before settings are loaded so loader warnings are not
/// lost; once `LOG_LEVEL` is known from the env file the filter is swapped
/// in place.
#[derive(Debug, Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
}

impl LogHandle {
    /// Switch the filter to `level`, falling back to `info` if it does not
    /// parse. No-op when `RUST_LOG` chose the filter at init.
    pub fn set_level(&self, level: &str) -> Result<(), BoxError> {
        if self.pinned {
            return Ok(());
        }
        let filter = EnvFilter::try_new(level).or_else(|_| EnvFilter::try_new("info"))?;
        self.filter.reload(filter)?;
        Ok(())
    }
}

/// Initialize the tracing system
///
/// `RUST_LOG` takes precedence; otherwise `default_level` is used, falling
/// back to `info` if it does not parse.
/// Interactive terminals get the pretty formatter, everything else a compact
/// line format without ANSI colours so journald captures it cleanly.
pub fn init(default_level: &str) -> Result<LogHandle, BoxError> {
    let (filter, pinned) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (
            EnvFilter::try_new(default_level).or_else(|_| EnvFilter::try_new("info"))?,
            false,
        ),
    };
    let (filter, handle) = reload::Layer::new(filter);

    if is_tty() {
        let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .with_level(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()?;
    }

    Ok(LogHandle {
        filter: handle,
        pinned,
    })
}

fn is_tty() -> bool {
    std::io::IsTerminal::is_terminal(&std::io::stderr())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    // The global subscriber can only be installed once per test binary
    #[test]
    fn test_level_follows_settings_loaded_after_init() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        let handle = init("warn").unwrap();
        assert!(tracing::enabled!(Level::WARN));
        assert!(!tracing::enabled!(Level::INFO));

        handle.set_level("debug").unwrap();
        assert!(tracing::enabled!(Level::DEBUG));

        handle.set_level("error").unwrap();
        assert!(!tracing::enabled!(Level::WARN));
    }
}
