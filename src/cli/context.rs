use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use platform_registry::PatternLibrary;
use profile_cache::ProfileCache;
use tracing::warn;

use super::output::OutputFormat;
use crate::config::EngineConfig;

pub struct CliContext {
    config: EngineConfig,
    config_path: Option<PathBuf>,
    output: OutputFormat,
}

impl CliContext {
    pub fn new(config: EngineConfig, config_path: Option<PathBuf>, output: OutputFormat) -> Self {
        Self {
            config,
            config_path,
            output,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }

    pub fn library(&self) -> Result<Arc<PatternLibrary>> {
        let library = self.config.library()?;
        if library.is_degraded() {
            warn!("platform catalog unavailable, using generic rules only");
        }
        Ok(library)
    }

    pub fn profile_cache(&self) -> Result<ProfileCache> {
        Ok(ProfileCache::from_config(self.config.profile.clone())?)
    }
}
