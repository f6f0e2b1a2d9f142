use crate::error::{ProviderError, Result};
use crate::Provider;
use std::collections::{HashMap, HashSet};

/// Operating system family used to pick platform-specific providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    MacOs,
    Other,
}

impl Platform {
    /// The platform this binary was built for.
    pub fn current() -> Self {
        if cfg!(target_os = "linux") {
            Platform::Linux
        } else if cfg!(target_os = "macos") {
            Platform::MacOs
        } else {
            Platform::Other
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Linux => "linux",
            Platform::MacOs => "macos",
            Platform::Other => "other",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Creates a fresh provider instance.
pub type ProviderFactory = fn() -> Box<dyn Provider>;

fn instantiate<P: Provider + Default + 'static>() -> Box<dyn Provider> {
    Box::new(P::default())
}

/// Explicit table of provider factories: a common set that runs everywhere
/// plus one ordered set per platform.
///
/// # Examples
///
/// ```
/// use doppler_provider::{Platform, ProviderRegistry};
///
/// let registry = ProviderRegistry::default();
/// let names = registry.provider_names(Platform::Linux);
/// assert!(names.contains(&"agent_events"));
/// assert!(names.contains(&"mpstat"));
/// assert!(!registry.provider_names(Platform::MacOs).contains(&"mpstat"));
/// ```
pub struct ProviderRegistry {
    common: Vec<ProviderFactory>,
    platforms: HashMap<Platform, Vec<ProviderFactory>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self {
            common: Vec::new(),
            platforms: HashMap::new(),
        }
    }

    pub fn register_common<P: Provider + Default + 'static>(&mut self) {
        self.common.push(instantiate::<P>);
    }

    pub fn register<P: Provider + Default + 'static>(&mut self, platform: Platform) {
        self.register_factory(Some(platform), instantiate::<P>);
    }

    /// Register a factory for `platform`, or for every platform when `None`.
    pub fn register_factory(&mut self, platform: Option<Platform>, factory: ProviderFactory) {
        match platform {
            Some(platform) => self.platforms.entry(platform).or_default().push(factory),
            None => self.common.push(factory),
        }
    }

    fn factories(&self, platform: Platform) -> impl Iterator<Item = &ProviderFactory> {
        self.common
            .iter()
            .chain(self.platforms.get(&platform).into_iter().flatten())
    }

    /// Names of the providers that would run on `platform`, in order.
    pub fn provider_names(&self, platform: Platform) -> Vec<&'static str> {
        self.factories(platform).map(|factory| factory().name()).collect()
    }

    /// Instantiate and validate the provider set for `platform`.
    ///
    /// Providers named in `disabled` are skipped. Any invalid descriptor or a
    /// name used twice is a configuration error.
    pub fn resolve(
        &self,
        platform: Platform,
        disabled: &[String],
    ) -> Result<Vec<Box<dyn Provider>>> {
        let mut seen = HashSet::new();
        let mut providers = Vec::new();

        for factory in self.factories(platform) {
            let provider = factory();
            let descriptor = provider.descriptor();
            descriptor.validate()?;

            if !seen.insert(descriptor.name) {
                return Err(ProviderError::InvalidDescriptor {
                    provider: descriptor.name,
                    reason: format!("provider name registered twice for {platform}"),
                });
            }
            if disabled.iter().any(|name| name == descriptor.name) {
                tracing::info!(provider = descriptor.name, "Provider disabled by configuration");
                continue;
            }
            providers.push(provider);
        }

        Ok(providers)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ProviderRegistry {
    /// Registry with every shipped provider.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        crate::providers::register_builtin(&mut registry);
        registry
    }
}
