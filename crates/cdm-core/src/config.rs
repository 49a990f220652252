use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Transfer limits for network sources (optional `[fetch]` section in config.toml).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-transfer timeout in seconds for one chapter.
    pub timeout_secs: u64,
    /// Optional receive speed cap in bytes per second.
    #[serde(default)]
    pub max_bytes_per_sec: Option<u64>,
    /// Optional User-Agent header.
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 300,
            max_bytes_per_sec: None,
            user_agent: None,
        }
    }
}

/// One `[sources.<id>]` entry. The manga catalog refers to sources by `<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// Local mirror: pages under `<root>/<manga>/<chapter>/`.
    Local { root: PathBuf },
    /// One GET per chapter; `{manga}` and `{chapter}` are substituted.
    Http {
        url_template: String,
        #[serde(default)]
        headers: BTreeMap<String, String>,
    },
}

/// Global configuration loaded from `~/.config/cdm/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CdmConfig {
    /// Number of chapters downloaded concurrently.
    pub workers: usize,
    /// Where downloaded chapters are stored (default: XDG data dir).
    #[serde(default)]
    pub download_dir: Option<PathBuf>,
    /// Catalog file (default: `library.json` next to config.toml).
    #[serde(default)]
    pub library_path: Option<PathBuf>,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
}

impl Default for CdmConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            download_dir: None,
            library_path: None,
            fetch: FetchConfig::default(),
            sources: BTreeMap::new(),
        }
    }
}

impl CdmConfig {
    /// Configured download dir, or `~/.local/share/cdm/chapters`.
    pub fn resolve_download_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.download_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("cdm")?;
        Ok(xdg_dirs.get_data_home().join("chapters"))
    }

    /// Configured catalog path, or `~/.config/cdm/library.json`.
    pub fn resolve_library_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.library_path {
            return Ok(path.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("cdm")?;
        Ok(xdg_dirs.get_config_home().join("library.json"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("cdm")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<CdmConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = CdmConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<CdmConfig> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    let cfg: CdmConfig =
        toml::from_str(&data).with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}
