use serde::{Deserialize, Serialize};

use crate::verifier::ChainParams;

/// Blob verifier configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlobVerifierConfig {
    /// Consensus parameters. Missing fields take the chain defaults.
    #[serde(default)]
    pub chain: ChainParams,
    /// Worker threads used to verify blocks. 0 uses one thread per core.
    #[serde(default)]
    pub num_threads: usize,
}

/// Reads a TOML file into `R`
#[cfg(feature = "native")]
pub fn from_toml_path<P: AsRef<std::path::Path>, R: serde::de::DeserializeOwned>(
    path: P,
) -> anyhow::Result<R> {
    use anyhow::Context;

    let path = path.as_ref();
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let result: R = toml::from_str(&contents)?;
    Ok(result)
}

#[cfg(feature = "native")]
impl BlobVerifierConfig {
    /// Loads the configuration and checks the chain parameters
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let config: Self = from_toml_path(path)?;
        config.chain.validate()?;
        Ok(config)
    }
}

#[cfg(all(test, feature = "native"))]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;

    use super::*;

    fn create_config_from(content: &str) -> NamedTempFile {
        let mut config_file = NamedTempFile::new().unwrap();
        config_file.write_all(content.as_bytes()).unwrap();
        config_file
    }

    #[test]
    fn test_correct_config() {
        let config = r#"
            num_threads = 8
            [chain]
            min_square_size = 2
            max_square_size = 64
            max_tx_bytes = 2000000
        "#;

        let config_file = create_config_from(config);

        let config = BlobVerifierConfig::load(config_file.path()).unwrap();
        let expected = BlobVerifierConfig {
            chain: ChainParams {
                min_square_size: 2,
                max_square_size: 64,
                max_tx_bytes: 2_000_000,
            },
            num_threads: 8,
        };
        assert_eq!(config, expected);
    }

    #[test]
    fn test_defaults() {
        let config_file = create_config_from("[chain]\nmax_square_size = 32\n");
        let config: BlobVerifierConfig = from_toml_path(config_file.path()).unwrap();
        assert_eq!(config.num_threads, 0);
        assert_eq!(config.chain.max_square_size, 32);
        assert_eq!(config.chain.min_square_size, ChainParams::default().min_square_size);

        let empty = create_config_from("");
        let config: BlobVerifierConfig = from_toml_path(empty.path()).unwrap();
        assert_eq!(config, BlobVerifierConfig::default());
    }

    #[test]
    fn test_invalid_config() {
        let config_file = create_config_from("[chain]\nmax_square_size = 100\n");
        let err = BlobVerifierConfig::load(config_file.path()).unwrap_err();
        assert!(err.to_string().contains("powers of two"));

        let garbage = create_config_from("num_threads = \"many\"");
        assert!(from_toml_path::<_, BlobVerifierConfig>(garbage.path()).is_err());

        assert!(from_toml_path::<_, BlobVerifierConfig>("/nonexistent/config.toml").is_err());
    }
}
