use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const CONFIG_FILE_NAME: &str = ".gatorconfig.toml";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// SQLite connection string
    #[serde(default = "default_db_url")]
    pub db_url: String,
    /// Name of the user commands run as; absent until someone registers or logs in
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user_name: Option<String>,
}

fn default_db_url() -> String {
    "sqlite:gator.db?mode=rwc".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_url: default_db_url(),
            current_user_name: None,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Like [`Config::load`], but a missing file yields the defaults.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(content) => Self::parse(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = toml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn set_current_user(&mut self, name: impl Into<String>) {
        self.current_user_name = Some(name.into());
    }

    /// `$GATOR_CONFIG` if set, otherwise `.gatorconfig.toml` in the home directory.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        if let Some(path) = std::env::var_os("GATOR_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("could not determine the home directory"))?;
        Ok(home.join(CONFIG_FILE_NAME))
    }
}
