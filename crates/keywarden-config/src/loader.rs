use std::path::Path;

use crate::Config;

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Reads the file, expands `{{ env.VAR }}` placeholders, then
    /// deserializes and validates the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, environment variable
    /// expansion fails, TOML parsing fails, or validation fails
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

        Self::parse(&raw)
    }

    /// Parse and validate configuration from TOML text
    ///
    /// # Errors
    ///
    /// Returns an error if expansion, parsing, or validation fails
    pub fn parse(raw: &str) -> anyhow::Result<Self> {
        let expanded =
            crate::env::expand_env(raw).map_err(|e| anyhow::anyhow!("config variable expansion failed: {e}"))?;

        let config: Self = toml::from_str(&expanded).map_err(|e| anyhow::anyhow!("failed to parse config: {e}"))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate that the configuration is internally consistent
    ///
    /// # Errors
    ///
    /// Returns an error if a bound is zero or a name is unusable
    pub fn validate(&self) -> anyhow::Result<()> {
        self.validate_store()?;
        self.validate_timing()?;

        if self.repair.role.trim().is_empty() {
            anyhow::bail!("repair.role must not be empty");
        }

        if !self.api.session_path.starts_with('/') {
            anyhow::bail!("api.session_path must start with '/'");
        }

        Ok(())
    }

    fn validate_store(&self) -> anyhow::Result<()> {
        let store = &self.store;

        if store.max_entries == 0 {
            anyhow::bail!("store.max_entries must be at least 1");
        }

        if store.cookie_name.is_empty() {
            anyhow::bail!("store.cookie_name must not be empty");
        }

        if store
            .cookie_name
            .chars()
            .any(|c| c == ';' || c == '=' || c.is_whitespace())
        {
            anyhow::bail!("store.cookie_name '{}' is not a valid cookie name", store.cookie_name);
        }

        Ok(())
    }

    fn validate_timing(&self) -> anyhow::Result<()> {
        if self.store.retention.is_zero() {
            anyhow::bail!("store.retention must be greater than zero");
        }

        if self.store.cookie_ttl.is_zero() {
            anyhow::bail!("store.cookie_ttl must be greater than zero");
        }

        if self.poller.interval.is_zero() {
            anyhow::bail!("poller.interval must be greater than zero");
        }

        Ok(())
    }
}
