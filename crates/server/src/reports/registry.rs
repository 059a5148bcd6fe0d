//! Platform registry: endpoint catalogs and renderers keyed by
//! `(platform, template)`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;
use tracing::{info, warn};

use taskpulse_connector::{builtin_catalog, canonical_platform, EndpointCatalog};
use taskpulse_render::{MarkdownRenderer, Renderer};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("unsupported template '{template}' for platform '{platform}'")]
    UnsupportedTemplate { platform: String, template: String },

    #[error("platform registry lock poisoned")]
    Poisoned,
}

struct PlatformEntry {
    catalog: EndpointCatalog,
    renderers: HashMap<String, Arc<dyn Renderer>>,
}

/// Everything the pipeline needs for one job, resolved from the registry.
#[derive(Clone)]
pub struct Dispatch {
    /// Canonical platform name (aliases resolved).
    pub platform: String,
    /// Template name as registered (trimmed, lowercase).
    pub template: String,
    pub catalog: EndpointCatalog,
    pub renderer: Arc<dyn Renderer>,
}

#[derive(Default)]
pub struct PlatformRegistry {
    platforms: RwLock<HashMap<String, PlatformEntry>>,
}

fn template_key(name: &str) -> String {
    name.trim().to_ascii_lowercase()
}

fn key(name: &str) -> String {
    let trimmed = name.trim().to_ascii_lowercase();
    canonical_platform(&trimmed)
        .map(str::to_string)
        .unwrap_or(trimmed)
}

impl PlatformRegistry {
    /// Registry with no platforms.
    pub fn empty() -> Self {
        Self::default()
    }

    /// jira, monday and trofos, each rendering every Markdown template.
    pub fn builtin() -> Self {
        let registry = Self::empty();
        let markdown: Arc<dyn Renderer> = Arc::new(MarkdownRenderer::new());
        for platform in ["jira", "monday", "trofos"] {
            let Some(catalog) = builtin_catalog(platform) else {
                continue;
            };
            if let Err(e) = registry.register(platform, catalog) {
                warn!(platform, error = %e, "Failed to register built-in platform");
                continue;
            }
            for template in MarkdownRenderer::TEMPLATES {
                if let Err(e) = registry.register_renderer(platform, template, markdown.clone()) {
                    warn!(platform, template, error = %e, "Failed to register built-in renderer");
                }
            }
        }
        registry
    }

    /// Add or replace a platform's endpoint catalog. Existing renderers are kept.
    pub fn register(&self, platform: &str, catalog: EndpointCatalog) -> Result<(), RegistryError> {
        let mut platforms = self.platforms.write().map_err(|_| RegistryError::Poisoned)?;
        let name = key(platform);
        match platforms.get_mut(&name) {
            Some(entry) => entry.catalog = catalog,
            None => {
                platforms.insert(
                    name.clone(),
                    PlatformEntry {
                        catalog,
                        renderers: HashMap::new(),
                    },
                );
            }
        }
        info!(platform = %name, "Platform registered");
        Ok(())
    }

    /// Attach a renderer for `template` to a registered platform.
    ///
    /// # Errors
    ///
    /// [`RegistryError::UnsupportedPlatform`] if the platform was never registered.
    pub fn register_renderer(
        &self,
        platform: &str,
        template: &str,
        renderer: Arc<dyn Renderer>,
    ) -> Result<(), RegistryError> {
        let mut platforms = self.platforms.write().map_err(|_| RegistryError::Poisoned)?;
        let name = key(platform);
        let entry = platforms
            .get_mut(&name)
            .ok_or(RegistryError::UnsupportedPlatform(name.clone()))?;
        entry.renderers.insert(template_key(template), renderer);
        Ok(())
    }

    /// Look up the catalog and renderer for a job. Names are case-insensitive
    /// and platform aliases resolve to their canonical name.
    ///
    /// # Errors
    ///
    /// Unknown platforms and templates are reported separately.
    pub fn resolve(&self, platform: &str, template: &str) -> Result<Dispatch, RegistryError> {
        let platforms = self.platforms.read().map_err(|_| RegistryError::Poisoned)?;
        let name = key(platform);
        let entry = platforms
            .get(&name)
            .ok_or_else(|| RegistryError::UnsupportedPlatform(platform.trim().to_string()))?;
        let template_name = template_key(template);
        let renderer = entry
            .renderers
            .get(&template_name)
            .cloned()
            .ok_or_else(|| RegistryError::UnsupportedTemplate {
                platform: name.clone(),
                template: template.to_string(),
            })?;
        Ok(Dispatch {
            platform: name,
            template: template_name,
            catalog: entry.catalog.clone(),
            renderer,
        })
    }

    /// Registered platforms with their templates, sorted by name.
    pub fn describe(&self) -> Vec<(String, Vec<String>)> {
        let Ok(platforms) = self.platforms.read() else {
            return Vec::new();
        };
        let mut out: Vec<(String, Vec<String>)> = platforms
            .iter()
            .map(|(name, entry)| {
                let mut templates: Vec<String> = entry.renderers.keys().cloned().collect();
                templates.sort();
                (name.clone(), templates)
            })
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}
