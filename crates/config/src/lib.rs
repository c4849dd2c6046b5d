//! Configuration for the warden agent
//!
//! Settings come from process environment variables, optionally seeded from an
//! env file. The resulting [`Settings`] value is immutable; runtime changes
//! produce a new value that replaces the old one wholesale.

pub mod env_file;
pub mod loader;
pub mod settings;
pub mod tasks;

pub use env_file::EnvFile;
pub use loader::SettingsLoader;
pub use settings::Settings;
pub use tasks::default_tasks;
