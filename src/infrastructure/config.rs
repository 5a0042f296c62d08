use crate::domain::config::{validate_flows, AtCliConfig, FlowDefinition, SerialSettings, TimingSettings};
use crate::domain::error::{AtCliError, AtCliResult};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

const PROJECT_DIR: &str = ".atcli";
const CONFIG_FILE: &str = "config.toml";

/// Project file overlay: only the sections it actually contains override the global file
#[derive(Debug, Default, Deserialize)]
struct ProjectConfig {
    serial: Option<SerialSettings>,
    timing: Option<TimingSettings>,
    #[serde(default)]
    flows: Vec<FlowDefinition>,
}

/// Configuration manager
pub struct ConfigManager {
    global_config_path: Option<PathBuf>,
    project_config_path: Option<PathBuf>,
}

impl ConfigManager {
    /// Create new configuration manager
    pub fn new() -> Self {
        let start = std::env::current_dir().ok();
        Self {
            global_config_path: Self::get_global_config_path(),
            project_config_path: start.as_deref().and_then(Self::find_project_config_path),
        }
    }

    /// Manager rooted at explicit locations, used by `--config` and tests
    pub fn with_paths(global: Option<PathBuf>, project: Option<PathBuf>) -> Self {
        Self {
            global_config_path: global,
            project_config_path: project,
        }
    }

    /// Load configuration from files
    ///
    /// The global file supplies settings and flows. A project file replaces the
    /// serial and timing sections it defines, replaces same-named flows and
    /// appends new ones.
    pub fn load_config(&self) -> AtCliResult<AtCliConfig> {
        let mut config = AtCliConfig::default();

        if let Some(global_path) = self.global_config_path.as_deref().filter(|p| p.exists()) {
            config = self.load_config_from_path(global_path)?;
        }

        if let Some(project_path) = self.project_config_path.as_deref().filter(|p| p.exists()) {
            let project = Self::load_project_config(project_path)?;
            if let Some(serial) = project.serial {
                config.serial = serial;
            }
            if let Some(timing) = project.timing {
                config.timing = timing;
            }
            for flow in project.flows {
                config.flows.retain(|existing| existing.name != flow.name);
                config.flows.push(flow);
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Get global configuration path
    fn get_global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("atcli").join(CONFIG_FILE))
    }

    /// Find project configuration path by walking up directory tree
    fn find_project_config_path(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(PROJECT_DIR).join(CONFIG_FILE))
            .find(|path| path.exists())
    }

    /// Load configuration from specific path
    pub fn load_config_from_path(&self, path: &Path) -> AtCliResult<AtCliConfig> {
        let content = fs::read_to_string(path).map_err(|e| AtCliError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let config: AtCliConfig = toml::from_str(&content).map_err(|e| AtCliError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn load_project_config(path: &Path) -> AtCliResult<ProjectConfig> {
        let content = fs::read_to_string(path).map_err(|e| AtCliError::Config {
            message: format!("Failed to read config file {}: {}", path.display(), e),
        })?;

        let project: ProjectConfig = toml::from_str(&content).map_err(|e| AtCliError::Config {
            message: format!("Failed to parse config file {}: {}", path.display(), e),
        })?;
        validate_flows(&project.flows)?;
        Ok(project)
    }

    /// Save configuration to specific path
    pub fn save_config_to_path(&self, path: &Path, config: &AtCliConfig) -> AtCliResult<()> {
        let content = toml::to_string_pretty(config).map_err(|e| AtCliError::Config {
            message: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| AtCliError::Config {
            message: format!("Failed to write config file {}: {}", path.display(), e),
        })
    }

    /// Create default project configuration under `path/.atcli/`
    pub fn init_project_config(&self, path: &Path) -> AtCliResult<PathBuf> {
        let config_dir = path.join(PROJECT_DIR);
        let config_file = config_dir.join(CONFIG_FILE);

        if config_file.exists() {
            return Err(AtCliError::Config {
                message: "Project configuration already exists".to_string(),
            });
        }

        fs::create_dir_all(&config_dir).map_err(|e| AtCliError::Config {
            message: format!("Failed to create {} directory: {}", PROJECT_DIR, e),
        })?;

        self.save_config_to_path(&config_file, &AtCliConfig::default())?;
        Ok(config_file)
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
