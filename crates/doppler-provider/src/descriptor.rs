use crate::error::{ProviderError, Result};
use doppler_common::types::Category;
use std::time::Duration;

/// Display metadata for one metric, state or event name.
///
/// A per-instance spec names a prefix: the provider writes
/// `<name>:<instance>` (mount point, device) and never `name` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricSpec {
    pub name: &'static str,
    pub title: &'static str,
    pub unit: Option<&'static str>,
    pub per_instance: bool,
}

impl MetricSpec {
    pub const fn new(name: &'static str, title: &'static str) -> Self {
        Self {
            name,
            title,
            unit: None,
            per_instance: false,
        }
    }

    pub const fn with_unit(self, unit: &'static str) -> Self {
        Self {
            unit: Some(unit),
            ..self
        }
    }

    pub const fn per_instance(self) -> Self {
        Self {
            per_instance: true,
            ..self
        }
    }

    /// Whether `metric` is a name this spec describes.
    pub fn matches(&self, metric: &str) -> bool {
        if self.per_instance {
            metric
                .strip_prefix(self.name)
                .is_some_and(|rest| rest.starts_with(':'))
        } else {
            metric == self.name
        }
    }
}

/// How a provider obtains its raw data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acquisition {
    /// Run this command line (split on whitespace) and parse its stdout.
    Command(&'static str),
    /// Read this file and parse its content.
    File(&'static str),
    /// The provider computes its values itself.
    Direct,
}

/// Static metadata of a provider type.
#[derive(Debug)]
pub struct ProviderDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub metrics: &'static [MetricSpec],
    pub states: &'static [MetricSpec],
    pub events: &'static [MetricSpec],
    /// `None` means run once at startup.
    pub interval: Option<Duration>,
    pub acquisition: Acquisition,
}

impl ProviderDescriptor {
    /// Check the descriptor and return the category it writes to.
    ///
    /// Exactly one of `metrics`, `states` and `events` must be non-empty, and
    /// command or file providers need an interval.
    pub fn validate(&self) -> Result<Category> {
        let declared: Vec<Category> = [
            (Category::Metrics, self.metrics),
            (Category::States, self.states),
            (Category::Events, self.events),
        ]
        .into_iter()
        .filter(|(_, specs)| !specs.is_empty())
        .map(|(category, _)| category)
        .collect();

        let category = match declared.as_slice() {
            [category] => *category,
            [] => return Err(self.invalid("declares no metrics, states or events".to_string())),
            many => {
                let names: Vec<&str> = many.iter().map(|c| c.as_str()).collect();
                return Err(self.invalid(format!(
                    "declares more than one of metrics/states/events ({})",
                    names.join(", ")
                )));
            }
        };

        match self.acquisition {
            Acquisition::Command(template) if template.trim().is_empty() => {
                return Err(self.invalid("empty command template".to_string()));
            }
            Acquisition::Command(_) | Acquisition::File(_) if self.interval.is_none() => {
                return Err(self.invalid("command and file providers need an interval".to_string()));
            }
            _ => {}
        }

        if self.interval.is_some_and(|i| i.is_zero()) {
            return Err(self.invalid("interval must be greater than zero".to_string()));
        }

        Ok(category)
    }

    /// The declared specs of whichever category this provider writes to.
    pub fn specs(&self) -> (Category, &'static [MetricSpec]) {
        if !self.metrics.is_empty() {
            (Category::Metrics, self.metrics)
        } else if !self.states.is_empty() {
            (Category::States, self.states)
        } else {
            (Category::Events, self.events)
        }
    }

    /// Human readable summary of the declared names.
    pub fn provides(&self) -> String {
        let (_, specs) = self.specs();
        specs.iter().map(|s| s.name).collect::<Vec<_>>().join(", ")
    }

    fn invalid(&self, reason: String) -> ProviderError {
        ProviderError::InvalidDescriptor {
            provider: self.name,
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CPU: &[MetricSpec] = &[MetricSpec::new("system.cpu.idle", "CPU Idle").with_unit("%")];
    const VERSION: &[MetricSpec] = &[MetricSpec::new("os.version", "OS Version")];

    fn descriptor(
        metrics: &'static [MetricSpec],
        states: &'static [MetricSpec],
        interval: Option<Duration>,
        acquisition: Acquisition,
    ) -> ProviderDescriptor {
        ProviderDescriptor {
            name: "test",
            description: "test provider",
            metrics,
            states,
            events: &[],
            interval,
            acquisition,
        }
    }

    #[test]
    fn test_per_instance_spec_matches_prefixed_names() {
        let spec = MetricSpec::new("system.disk.total", "Disk Size").per_instance();
        assert!(spec.matches("system.disk.total:/"));
        assert!(spec.matches("system.disk.total:/var/lib"));
        assert!(!spec.matches("system.disk.total"));
        assert!(!spec.matches("system.disk.totals:/"));

        let plain = MetricSpec::new("system.cpu.idle", "CPU Idle");
        assert!(plain.matches("system.cpu.idle"));
        assert!(!plain.matches("system.cpu.idle:0"));
    }

    #[test]
    fn test_single_category_is_valid() {
        let d = descriptor(
            CPU,
            &[],
            Some(Duration::from_secs(5)),
            Acquisition::Command("mpstat 1 3"),
        );
        assert_eq!(d.validate().unwrap(), Category::Metrics);
        assert_eq!(d.provides(), "system.cpu.idle");
    }

    #[test]
    fn test_no_category_is_rejected() {
        let d = descriptor(&[], &[], Some(Duration::from_secs(5)), Acquisition::Direct);
        let err = d.validate().unwrap_err();
        assert!(err.to_string().contains("declares no metrics"));
    }

    #[test]
    fn test_two_categories_are_rejected() {
        let d = descriptor(CPU, VERSION, Some(Duration::from_secs(5)), Acquisition::Direct);
        assert!(matches!(
            d.validate(),
            Err(ProviderError::InvalidDescriptor { provider: "test", .. })
        ));
    }

    #[test]
    fn test_command_without_interval_is_rejected() {
        let d = descriptor(CPU, &[], None, Acquisition::Command("top -l 1"));
        assert!(d.validate().is_err());

        let once = descriptor(CPU, &[], None, Acquisition::Direct);
        assert!(once.validate().is_ok());
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let d = descriptor(CPU, &[], Some(Duration::ZERO), Acquisition::Direct);
        assert!(d.validate().is_err());
    }
}
