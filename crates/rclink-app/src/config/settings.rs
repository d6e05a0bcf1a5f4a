//! Settings file loading and saving

use std::path::{Path, PathBuf};

use rclink_core::prelude::*;

use super::types::Settings;

const CONFIG_DIR: &str = "rclink";
const CONFIG_FILENAME: &str = "config.toml";

/// `<config dir>/rclink/config.toml`, falling back to the working directory
/// when the platform has no config directory.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|dir| dir.join(CONFIG_DIR))
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_FILENAME)
}

/// Load settings from `config_path`.
///
/// A missing or unreadable file yields the defaults.
pub fn load_settings(config_path: &Path) -> Settings {
    if !config_path.exists() {
        debug!("No config file at {:?}, using defaults", config_path);
        return Settings::default();
    }

    match std::fs::read_to_string(config_path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(settings) => {
                debug!("Loaded settings from {:?}", config_path);
                settings
            }
            Err(e) => {
                warn!("Failed to parse {:?}: {}", config_path, e);
                Settings::default()
            }
        },
        Err(e) => {
            warn!("Failed to read {:?}: {}", config_path, e);
            Settings::default()
        }
    }
}

/// Save settings to `config_path`.
///
/// Writes a temp file next to the target and renames it into place.
pub fn save_settings(config_path: &Path, settings: &Settings) -> Result<()> {
    ensure_parent_dir(config_path)?;

    let content = toml::to_string_pretty(settings)
        .map_err(|e| Error::config(format!("Failed to serialize settings: {}", e)))?;
    let full_content = format!("{}{}", generate_config_header(), content);

    let temp_path = config_path.with_extension("toml.tmp");
    std::fs::write(&temp_path, &full_content)
        .map_err(|e| Error::config(format!("Failed to write temp file: {}", e)))?;
    std::fs::rename(&temp_path, config_path)
        .map_err(|e| Error::config(format!("Failed to rename temp file: {}", e)))?;

    info!("Saved settings to {:?}", config_path);
    Ok(())
}

/// Write a commented default config unless one already exists.
///
/// Returns `true` if a file was created.
pub fn init_config_file(config_path: &Path) -> Result<bool> {
    if config_path.exists() {
        debug!("Config file already exists at {:?}", config_path);
        return Ok(false);
    }
    ensure_parent_dir(config_path)?;

    let default_content = r#"# rclink configuration

[connection]
host = "127.0.0.1"
port = 8000
# credential = ""      # Prefer --credential or RCLINK_CREDENTIAL

[session]
max_payload_bytes = 65536
connect_timeout_ms = 5000
handshake_timeout_ms = 5000
shutdown_timeout_ms = 5000
event_capacity = 64

[controls]
disengage_on_exit = true  # Switch autonomous modes off when quitting
"#;

    std::fs::write(config_path, default_content)
        .map_err(|e| Error::config(format!("Failed to write config.toml: {}", e)))?;
    info!("Created default config at {:?}", config_path);
    Ok(true)
}

fn ensure_parent_dir(config_path: &Path) -> Result<()> {
    match config_path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() && !dir.exists() => std::fs::create_dir_all(dir)
            .map_err(|e| Error::config(format!("Failed to create {:?}: {}", dir, e))),
        _ => Ok(()),
    }
}

fn generate_config_header() -> String {
    r#"# rclink configuration
# Generated by rclink

"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_settings_missing_file() {
        let temp = tempdir().unwrap();
        let settings = load_settings(&temp.path().join("config.toml"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_load_settings_custom() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[connection]
host = "10.0.0.7"
port = 9001
credential = "69420"

[controls]
disengage_on_exit = false
"#,
        )
        .unwrap();

        let settings = load_settings(&path);
        assert_eq!(settings.connection.host, "10.0.0.7");
        assert_eq!(settings.connection.port, 9001);
        assert_eq!(settings.connection.credential.as_deref(), Some("69420"));
        assert!(!settings.controls.disengage_on_exit);
    }

    #[test]
    fn test_load_settings_invalid_toml() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        assert_eq!(load_settings(&path), Settings::default());
    }

    #[test]
    fn test_save_then_load() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.connection.port = 8100;
        settings.session.event_capacity = 16;
        save_settings(&path, &settings).unwrap();

        assert!(!path.with_extension("toml.tmp").exists());
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("# rclink configuration"));
        assert_eq!(load_settings(&path), settings);
    }

    #[test]
    fn test_init_config_file_is_idempotent() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("rclink").join("config.toml");

        assert!(init_config_file(&path).unwrap());
        assert!(!init_config_file(&path).unwrap());
        assert_eq!(load_settings(&path), Settings::default());
    }

    #[test]
    fn test_default_config_path_file_name() {
        let path = default_config_path();
        assert!(path.ends_with("rclink/config.toml"));
    }
}
