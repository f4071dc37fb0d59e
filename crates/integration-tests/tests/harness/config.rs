//! Configuration builder for integration tests
//!
//! Renders TOML and runs it through the real loader so validation and
//! defaults are exercised exactly as in production.

use std::path::Path;

use keywarden_config::Config;

/// Builder for constructing test configurations
pub struct ConfigBuilder {
    base_url: String,
    role: Option<String>,
    reload_delay: Option<String>,
    jar_path: Option<String>,
    max_entries: Option<usize>,
}

impl ConfigBuilder {
    /// Point the client at a mock backend
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_owned(),
            role: None,
            reload_delay: None,
            jar_path: None,
            max_entries: None,
        }
    }

    pub fn with_role(mut self, role: &str) -> Self {
        self.role = Some(role.to_owned());
        self
    }

    pub fn with_reload_delay(mut self, delay: &str) -> Self {
        self.reload_delay = Some(delay.to_owned());
        self
    }

    pub fn with_jar(mut self, path: &Path) -> Self {
        self.jar_path = Some(path.display().to_string());
        self
    }

    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = Some(max_entries);
        self
    }

    /// Build the configuration, panicking if it fails validation
    pub fn build(self) -> Config {
        let mut toml = format!("[api]\nbase_url = \"{}\"\ntimeout = \"5s\"\n", self.base_url);

        toml.push_str("\n[store]\n");
        if let Some(path) = &self.jar_path {
            toml.push_str(&format!("jar_path = {path:?}\n"));
        }
        if let Some(max_entries) = self.max_entries {
            toml.push_str(&format!("max_entries = {max_entries}\n"));
        }

        toml.push_str("\n[repair]\n");
        if let Some(role) = &self.role {
            toml.push_str(&format!("role = \"{role}\"\n"));
        }
        toml.push_str(&format!(
            "reload_delay = \"{}\"\n",
            self.reload_delay.as_deref().unwrap_or("10ms")
        ));

        Config::parse(&toml).expect("test config is valid")
    }
}
