use clap::Subcommand;
use std::path::PathBuf;
use warden_config::{Settings, SettingsLoader};

pub mod keygen;
pub mod serve;
pub mod token;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the agent (the default when no command is given)
    Serve {
        /// Override the bind host
        #[arg(long)]
        host: Option<String>,

        /// Override the bind port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate a new shared secret
    Keygen {
        /// Write it to the env file as API_KEY
        #[arg(long)]
        save: bool,
    },

    /// Issue a session token signed with the configured secret
    Token {
        /// Role recorded in the token
        #[arg(long, default_value = "admin")]
        role: String,

        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl: i64,
    },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Serve {
            host: None,
            port: None,
        }
    }
}

impl Commands {
    pub async fn execute(self, env_file: Option<PathBuf>) -> eyre::Result<()> {
        match self {
            Commands::Serve { host, port } => serve::execute(env_file, host, port).await,
            Commands::Keygen { save } => keygen::execute(env_file, save),
            Commands::Token { role, ttl } => token::execute(env_file, &role, ttl),
        }
    }
}

pub(crate) fn load_settings(env_file: Option<PathBuf>) -> eyre::Result<Settings> {
    let loader = match env_file {
        Some(path) => SettingsLoader::new().env_file(path),
        None => SettingsLoader::new(),
    };
    Ok(loader.load()?)
}
