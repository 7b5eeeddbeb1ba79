//! Filesystem stores: configuration documents in, spectrum data out

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use spectrum_core::{ConfigError, Configuration, SpectrumSink};
use tracing::debug;

/// Source of configuration documents
pub trait ConfigSource: Send + Sync {
    fn load(&self, config_id: &str) -> Result<Configuration, ConfigError>;
}

/// Body of a configuration file; the id comes from the file name
#[derive(Debug, Deserialize)]
struct ConfigDocument {
    #[serde(default)]
    values: BTreeMap<String, Value>,
}

/// Configuration documents stored as `<dir>/<id>.json`, `.yaml` or `.yml`
#[derive(Debug, Clone)]
pub struct FsConfigStore {
    dir: PathBuf,
}

impl FsConfigStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Store a configuration as JSON
    pub fn save(&self, config: &Configuration) -> io::Result<PathBuf> {
        check_id(&config.id).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(format!("{}.json", config.id));
        let body = serde_json::to_vec_pretty(&serde_json::json!({ "values": config.values }))
            .map_err(io::Error::other)?;
        fs::write(&path, body)?;
        Ok(path)
    }
}

impl ConfigSource for FsConfigStore {
    fn load(&self, config_id: &str) -> Result<Configuration, ConfigError> {
        check_id(config_id)?;
        let invalid = |message: String| ConfigError::Invalid {
            id: config_id.to_string(),
            message,
        };

        for ext in ["json", "yaml", "yml"] {
            let path = self.dir.join(format!("{}.{}", config_id, ext));
            let body = match fs::read_to_string(&path) {
                Ok(body) => body,
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => return Err(invalid(e.to_string())),
            };
            let doc: ConfigDocument = if ext == "json" {
                serde_json::from_str(&body).map_err(|e| invalid(e.to_string()))?
            } else {
                serde_yaml::from_str(&body).map_err(|e| invalid(e.to_string()))?
            };
            debug!(path = %path.display(), "Loaded configuration");
            return Ok(Configuration {
                id: config_id.to_string(),
                values: doc.values,
            });
        }
        Err(ConfigError::NotFound(config_id.to_string()))
    }
}

/// Config ids name files; refuse anything that could leave the directory
fn check_id(config_id: &str) -> Result<(), ConfigError> {
    let bad = config_id.is_empty()
        || config_id.starts_with('.')
        || config_id.contains(['/', '\\', '\0']);
    if bad {
        Err(ConfigError::NotFound(config_id.to_string()))
    } else {
        Ok(())
    }
}

/// Spectrum data as `<dir>/<config_id>.csv`, one `timestamp,v0,v1,...` line
/// per sweep
#[derive(Debug, Clone)]
pub struct FsSpectrumStore {
    dir: PathBuf,
}

impl FsSpectrumStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self, config_id: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", config_id))
    }
}

impl SpectrumSink for FsSpectrumStore {
    fn sweep_count(&self, config_id: &str) -> io::Result<u64> {
        let file = match fs::File::open(self.path(config_id)) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let mut count = 0;
        for line in BufReader::new(file).lines() {
            if !line?.trim().is_empty() {
                count += 1;
            }
        }
        Ok(count)
    }

    fn write_spectrum(&self, config_id: &str, timestamp: i64, channels: &[i8]) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let mut line = timestamp.to_string();
        for value in channels {
            line.push(',');
            line.push_str(&value.to_string());
        }
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path(config_id))?;
        file.write_all(line.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use spectrum_core::ScanConfig;
    use tempfile::TempDir;

    #[test]
    fn test_load_json_and_yaml() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("1500.json"),
            r#"{"values": {"sensor": {"range": [88e6, 108e6, 0.1e6]}}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("1600.yaml"),
            "values:\n  rig:\n    freqs: [96100000.0]\n    mode: WFM\n",
        )
        .unwrap();
        let store = FsConfigStore::new(dir.path());

        let json_config = store.load("1500").unwrap();
        assert_eq!(json_config.id, "1500");
        let scan = json_config.scan_config("sensor").unwrap();
        assert_eq!(scan.range.unwrap().step, 0.1e6);

        let yaml_config = store.load("1600").unwrap();
        let scan = yaml_config.scan_config("rig").unwrap();
        assert_eq!(scan.freqs, vec![96.1e6]);
        assert_eq!(scan.mode.as_deref(), Some("WFM"));
    }

    #[test]
    fn test_missing_and_malformed() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("bad.json"), "{not json").unwrap();
        let store = FsConfigStore::new(dir.path());

        assert_eq!(
            store.load("nope"),
            Err(ConfigError::NotFound("nope".to_string()))
        );
        assert!(matches!(store.load("bad"), Err(ConfigError::Invalid { .. })));
        assert!(matches!(store.load("../etc"), Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = FsConfigStore::new(dir.path().join("configs"));
        let config = Configuration::new("c1").with_device("rig", &ScanConfig::freqs(vec![1e6]));
        store.save(&config).unwrap();
        assert_eq!(store.load("c1").unwrap(), config);
    }

    #[test]
    fn test_spectrum_lines_seed_sweep_count() {
        let dir = TempDir::new().unwrap();
        let store = FsSpectrumStore::new(dir.path().join("spectrum"));
        assert_eq!(store.sweep_count("c1").unwrap(), 0);

        store.write_spectrum("c1", 1000, &[-128, -60, 5]).unwrap();
        store.write_spectrum("c1", 2000, &[-90, -61, 4]).unwrap();

        assert_eq!(store.sweep_count("c1").unwrap(), 2);
        assert_eq!(store.sweep_count("c2").unwrap(), 0);
        assert_eq!(
            fs::read_to_string(store.path("c1")).unwrap(),
            "1000,-128,-60,5\n2000,-90,-61,4\n"
        );
    }
}
