use std::path::PathBuf;
use warden_config::EnvFile;
use warden_core::constants::API_KEY_VAR;
use warden_security::generate_secret;

pub fn execute(env_file: Option<PathBuf>, save: bool) -> eyre::Result<()> {
    let key = generate_secret();

    if save {
        let settings = super::load_settings(env_file)?;
        let env = EnvFile::new(settings.env_file);
        env.update(&[(API_KEY_VAR, key.clone())])?;
        eprintln!("saved {API_KEY_VAR} to {}", env.path().display());
    }

    println!("{key}");
    Ok(())
}
