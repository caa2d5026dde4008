#![allow(clippy::unwrap_used)]
// Tests for layered config loading. Every test that reads the environment
// runs inside a `Jail` so env overrides never leak between tests.

use std::path::Path;

use figment::Jail;
use pretty_assertions::assert_eq;

use rfevents_config::{ConfigError, load_config, render_config, save_config, validate};
use rfevents_core::{EventServiceConfig, TlsVerification};

#[test]
fn test_file_overrides_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
[delivery]
retry_attempts = 5
tls = "accept_invalid"

[plugin_status_polling]
start_up_resource_batch_size = 25

[url_translation.north_bound]
"/ODIM/v1" = "/redfish/v1"
"/OEM/v1" = "/redfish/v1"
"#,
        )?;

        let config = load_config(Some(Path::new("config.toml"))).map_err(|e| e.to_string())?;
        assert_eq!(config.delivery.retry_attempts, 5);
        assert_eq!(config.delivery.tls, TlsVerification::AcceptInvalid);
        assert_eq!(config.delivery.retry_interval_secs, 60);
        assert_eq!(config.plugin_status_polling.start_up_resource_batch_size, 25);
        assert_eq!(config.url_translation.north_bound.len(), 2);
        assert_eq!(config.plugin.scheme, "https");
        Ok(())
    });
}

#[test]
fn test_missing_explicit_file_is_an_error() {
    let err = load_config(Some(Path::new("/nonexistent/rfevents.toml"))).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_environment_overrides_file() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[delivery]\nretry_attempts = 5\n")?;
        jail.set_env("RFEVENTS_DELIVERY__RETRY_ATTEMPTS", "7");
        jail.set_env("RFEVENTS_PLUGIN__SCHEME", "http");

        let config = load_config(Some(Path::new("config.toml"))).map_err(|e| e.to_string())?;
        assert_eq!(config.delivery.retry_attempts, 7);
        assert_eq!(config.plugin.scheme, "http");
        Ok(())
    });
}

#[test]
fn test_invalid_values_are_rejected() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[plugin]\nscheme = \"ftp\"\n")?;
        let err = load_config(Some(Path::new("config.toml"))).unwrap_err();
        assert!(
            matches!(err, ConfigError::Validation { ref field, .. } if field == "plugin.scheme")
        );
        Ok(())
    });

    let mut config = EventServiceConfig::default();
    config.plugin_status_polling.start_up_resource_batch_size = 0;
    assert!(validate(&config).is_err());
}

#[test]
fn test_wrong_types_surface_as_figment_errors() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[delivery]\nretry_attempts = \"many\"\n")?;
        let err = load_config(Some(Path::new("config.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Figment(_)));
        Ok(())
    });
}

#[test]
fn test_saved_config_loads_back() {
    Jail::expect_with(|jail| {
        let path = jail.directory().join("nested").join("config.toml");

        let mut config = EventServiceConfig::default();
        config.cache.refresh_interval_secs = 300;
        save_config(&config, &path).map_err(|e| e.to_string())?;

        let loaded = load_config(Some(&path)).map_err(|e| e.to_string())?;
        assert_eq!(loaded, config);
        let rendered = render_config(&config).map_err(|e| e.to_string())?;
        assert!(rendered.contains("refresh_interval_secs = 300"));
        Ok(())
    });
}
