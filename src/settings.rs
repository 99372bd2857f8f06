use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use url::Url;

use crate::parser::rules::SourceProfile;

pub const DEFAULT_FILE: &str = "refdex.toml";

#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Absolute URL the page keys are joined onto.
    pub base_url: String,
    pub input_dir: PathBuf,
    pub output: PathBuf,
    pub database: PathBuf,
    pub source: SourceProfile,
}

/// Values given on the command line; they win over file and environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub base_url: Option<String>,
    pub input_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub database: Option<PathBuf>,
}

impl Settings {
    /// Layer defaults, the TOML file, `REFDEX__*` variables and overrides.
    ///
    /// A missing file is only an error when it was asked for explicitly.
    pub fn load(file: Option<&Path>, overrides: Overrides) -> Result<Self> {
        let (path, required) = match file {
            Some(p) => (p.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_FILE), false),
        };
        let builder = Config::builder()
            .add_source(File::from(path.as_path()).format(FileFormat::Toml).required(required));
        Self::build(builder, overrides)
            .with_context(|| format!("Failed to load settings from {}", path.display()))
    }

    pub fn from_toml(toml: &str, overrides: Overrides) -> Result<Self> {
        let builder = Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        Self::build(builder, overrides)
    }

    fn build(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        overrides: Overrides,
    ) -> Result<Self> {
        let path_str = |p: Option<PathBuf>| p.map(|p| p.to_string_lossy().into_owned());
        let settings: Settings = builder
            .set_default("output", "output.txt")?
            .set_default("database", crate::db::DB_PATH)?
            .add_source(Environment::with_prefix("REFDEX").separator("__"))
            .set_override_option("base_url", overrides.base_url)?
            .set_override_option("input_dir", path_str(overrides.input_dir))?
            .set_override_option("output", path_str(overrides.output))?
            .set_override_option("database", path_str(overrides.database))?
            .build()?
            .try_deserialize()?;
        settings.base_url()?;
        Ok(settings)
    }

    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("base_url `{}` is not an absolute URL", self.base_url))?;
        if url.cannot_be_a_base() {
            anyhow::bail!("base_url `{}` cannot be used as a base", self.base_url);
        }
        Ok(url)
    }
}
