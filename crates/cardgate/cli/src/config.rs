use std::path::{Path, PathBuf};

use cardgate::ClientConfig;
use eyre::OptionExt;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Returns the base config directory for cardgate.
pub(crate) fn config_dir() -> eyre::Result<PathBuf> {
    Ok(std::env::home_dir()
        .ok_or_eyre("home directory not found")?
        .join(".cardgate"))
}

/// Defaults, then the TOML file, then `CARDGATE_*` environment variables.
///
/// Nested keys use a double underscore, e.g. `CARDGATE_SYNC__MAX_RETRIES`.
pub(crate) fn figment(path: &Path) -> Figment {
    Figment::from(Serialized::defaults(ClientConfig::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CARDGATE_").split("__"))
}

pub(crate) fn load_config(path: Option<&Path>) -> eyre::Result<ClientConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_dir()?.join("cardgate.toml"),
    };
    Ok(figment(&path).extract()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_file_and_env_layers() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "cardgate.toml",
                r#"
                    distribution_url = "https://ds.example.com/v1"
                    api_key = "from-file"
                    force_hardware_pinpad = true

                    [sync]
                    max_retries = 5
                "#,
            )?;
            jail.set_env("CARDGATE_API_KEY", "from-env");
            jail.set_env("CARDGATE_SYNC__TIMEOUT_SECS", "60");

            let config: ClientConfig = figment(Path::new("cardgate.toml")).extract()?;
            assert_eq!(config.api_key.as_deref(), Some("from-env"));
            assert!(config.force_hardware_pinpad);
            assert_eq!(config.sync.max_retries, 5);
            assert_eq!(config.sync.timeout_secs, 60);
            assert_eq!(config.sync.poll_interval_ms, 1_000);
            assert_eq!(config.agent_url, cardgate::DEFAULT_AGENT_URL);
            Ok(())
        });
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        Jail::expect_with(|_| {
            let config: ClientConfig = figment(Path::new("absent.toml")).extract()?;
            assert_eq!(config, ClientConfig::default());
            Ok(())
        });
    }
}
