//! Ordered name → step registry

use std::sync::Arc;

use contracts::STANDARD_TRANSFORMS;

use crate::chain::TransformChain;
use crate::error::EnrichmentError;
use crate::step::TransformStep;
use crate::steps::{
    AddFeelsLikeTemp, AddHumidityLevel, AddIsRainy, AddWeatherScore, CleanDescription,
    FillMissing, KelvinToCelsius,
};

/// Fixed set of named steps, kept in registration order
#[derive(Clone, Default)]
pub struct TransformRegistry {
    steps: Vec<Arc<dyn TransformStep>>,
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The seven standard steps, in their default application order
    pub fn standard() -> Self {
        Self::new()
            .with(KelvinToCelsius)
            .with(AddFeelsLikeTemp)
            .with(AddHumidityLevel)
            .with(AddWeatherScore)
            .with(AddIsRainy)
            .with(CleanDescription)
            .with(FillMissing)
    }

    /// Register a step; a step with the same name is replaced in place
    pub fn with(mut self, step: impl TransformStep + 'static) -> Self {
        self.register(Arc::new(step));
        self
    }

    pub fn register(&mut self, step: Arc<dyn TransformStep>) {
        match self.steps.iter().position(|s| s.name() == step.name()) {
            Some(index) => self.steps[index] = step,
            None => self.steps.push(step),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn TransformStep>> {
        self.steps.iter().find(|s| s.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.steps.iter().any(|s| s.name() == name)
    }

    /// Registered names in order
    pub fn names(&self) -> Vec<String> {
        self.steps.iter().map(|s| s.name().to_string()).collect()
    }

    /// Build a chain from configured names
    ///
    /// # Errors
    /// `UnknownStep` for the first name the registry does not know.
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<TransformChain, EnrichmentError> {
        let steps = names
            .iter()
            .map(|name| {
                self.get(name.as_ref())
                    .ok_or_else(|| EnrichmentError::UnknownStep {
                        name: name.as_ref().to_string(),
                        available: self.names(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(TransformChain::new(steps))
    }

    /// Chain of every standard step
    pub fn standard_chain(&self) -> Result<TransformChain, EnrichmentError> {
        self.resolve(&STANDARD_TRANSFORMS)
    }
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry")
            .field("steps", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::FnStep;
    use contracts::Table;

    #[test]
    fn test_standard_names_match_default_chain() {
        let registry = TransformRegistry::standard();
        assert_eq!(registry.names(), STANDARD_TRANSFORMS.map(String::from).to_vec());
    }

    #[test]
    fn test_resolve_preserves_requested_order() {
        let chain = TransformRegistry::standard()
            .resolve(&["fill_missing", "kelvin_to_celsius"])
            .unwrap();
        assert_eq!(chain.names(), ["fill_missing", "kelvin_to_celsius"]);
    }

    #[test]
    fn test_unknown_name_fails_fast() {
        let err = TransformRegistry::standard()
            .resolve(&["kelvin_to_celsius", "to_fahrenheit"])
            .unwrap_err();
        let EnrichmentError::UnknownStep { name, available } = &err;
        assert_eq!(name, "to_fahrenheit");
        assert_eq!(available.len(), 7);
        assert!(err.to_string().contains("to_fahrenheit"));
    }

    #[test]
    fn test_register_replaces_same_name() {
        let registry = TransformRegistry::standard().with(FnStep::new(
            "fill_missing",
            [],
            |table: Table| Ok(table),
        ));
        assert_eq!(registry.names().len(), 7);
        assert_eq!(registry.names()[6], "fill_missing");
    }
}
