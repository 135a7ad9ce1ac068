#![allow(clippy::unwrap_used)]
// Env overrides live in their own test binary: they mutate process env.

use std::path::Path;
use std::time::Duration;

use naari_config::load_config;

#[test]
fn test_env_overrides_file_values() {
    figment::Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[settings]\nretries = 1\nconnect_timeout = 4\n")?;
        jail.set_env("NAARI_SETTINGS__RETRIES", "6");

        let config = load_config(Path::new("config.toml")).map_err(|e| e.to_string())?;
        let (settings, warnings) = config.resolve_settings();

        assert_eq!(settings.retries, 6);
        assert_eq!(settings.connect_timeout, Duration::from_secs(4));
        assert!(warnings.is_empty());
        Ok(())
    });
}

#[test]
fn test_env_overrides_legacy_settings_table() {
    figment::Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            "[ui_settings]\nretries = { value = 1, type = \"int\" }\nread_timeout = 7\n",
        )?;
        jail.set_env("NAARI_SETTINGS__RETRIES", "5");

        let config = load_config(Path::new("config.toml")).map_err(|e| e.to_string())?;
        let (settings, warnings) = config.resolve_settings();

        assert_eq!(settings.retries, 5);
        assert_eq!(settings.read_timeout, Duration::from_secs(7));
        assert!(warnings.is_empty());
        Ok(())
    });
}
