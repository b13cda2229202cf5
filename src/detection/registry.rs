//! Detectors keyed by "device:quantity".

use std::collections::HashMap;

use thiserror::Error;
use tracing::info;

use super::{DetectionError, Detector, DetectorSpec, Evaluation};

/// Quantity identifiers evaluated by the monitors.
pub mod quantities {
    pub const EL_CURRENT_INTEGRAL_PH1: &str = "el_current_integral_ph1";
    pub const EL_CURRENT_INTEGRAL_PH2: &str = "el_current_integral_ph2";
    pub const EL_CURRENT_INTEGRAL_PH3: &str = "el_current_integral_ph3";
    pub const EL_INRUSH_CURRENT_PH1: &str = "el_inrush_current_ph1";
    pub const EL_INRUSH_CURRENT_PH2: &str = "el_inrush_current_ph2";
    pub const EL_INRUSH_CURRENT_PH3: &str = "el_inrush_current_ph3";
    pub const VIB_TOTAL_RMS: &str = "vib_total_rms";

    /// Per-phase integral quantities, in phase order.
    pub const CURRENT_INTEGRALS: [&str; 3] = [
        EL_CURRENT_INTEGRAL_PH1,
        EL_CURRENT_INTEGRAL_PH2,
        EL_CURRENT_INTEGRAL_PH3,
    ];

    /// Per-phase inrush quantities, in phase order.
    pub const INRUSH_CURRENTS: [&str; 3] = [
        EL_INRUSH_CURRENT_PH1,
        EL_INRUSH_CURRENT_PH2,
        EL_INRUSH_CURRENT_PH3,
    ];
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No detector registered for '{0}'")]
    NotRegistered(String),

    #[error("Detector '{id}' could not be built: {source}")]
    InvalidSpec {
        id: String,
        #[source]
        source: DetectionError,
    },
}

/// Build a "device:quantity" composite ID string.
pub fn composite_id(device: &str, quantity: &str) -> String {
    format!("{device}:{quantity}")
}

/// Owns every detector of one monitor.
#[derive(Debug, Default)]
pub struct DetectorRegistry {
    detectors: HashMap<String, Detector>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a detector for `device:quantity`, replacing any existing one.
    pub fn register(
        &mut self,
        device: &str,
        quantity: &str,
        spec: &DetectorSpec,
    ) -> Result<(), RegistryError> {
        let id = composite_id(device, quantity);
        let detector = Detector::new(id.clone(), spec).map_err(|source| RegistryError::InvalidSpec {
            id: id.clone(),
            source,
        })?;
        info!(
            quantity = %id,
            policy = %spec.policy,
            model_size = spec.model_size,
            anomaly_list_size = spec.anomaly_list_size,
            "Detector registered"
        );
        self.detectors.insert(id, detector);
        Ok(())
    }

    /// Register every quantity in `quantities` for one device.
    pub fn register_all(
        &mut self,
        device: &str,
        quantities: &[&str],
        spec: &DetectorSpec,
    ) -> Result<(), RegistryError> {
        quantities
            .iter()
            .try_for_each(|quantity| self.register(device, quantity, spec))
    }

    pub fn contains(&self, device: &str, quantity: &str) -> bool {
        self.detectors.contains_key(&composite_id(device, quantity))
    }

    pub fn get(&self, device: &str, quantity: &str) -> Option<&Detector> {
        self.detectors.get(&composite_id(device, quantity))
    }

    pub fn evaluate(
        &mut self,
        device: &str,
        quantity: &str,
        value: f64,
    ) -> Result<Evaluation, RegistryError> {
        let id = composite_id(device, quantity);
        let detector = self
            .detectors
            .get_mut(&id)
            .ok_or(RegistryError::NotRegistered(id))?;
        Ok(detector.evaluate(value))
    }

    /// Reset every detector's learned state.
    pub fn reset_all(&mut self) {
        self.detectors.values_mut().for_each(Detector::reset);
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Registered composite IDs, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.detectors.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> DetectorSpec {
        DetectorSpec::z_score(3, 3, 2.0)
    }

    #[test]
    fn test_composite_id() {
        assert_eq!(composite_id("press-3", quantities::VIB_TOTAL_RMS), "press-3:vib_total_rms");
    }

    #[test]
    fn test_unknown_quantity_errors() {
        let mut registry = DetectorRegistry::new();
        let err = registry.evaluate("press-3", "nope", 1.0).unwrap_err();
        assert!(matches!(err, RegistryError::NotRegistered(id) if id == "press-3:nope"));
    }

    #[test]
    fn test_invalid_spec_surfaces_id() {
        let mut registry = DetectorRegistry::new();
        let err = registry
            .register("press-3", quantities::VIB_TOTAL_RMS, &DetectorSpec::z_score(1, 3, 2.0))
            .unwrap_err();
        assert!(err.to_string().contains("press-3:vib_total_rms"));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_detectors_are_independent() {
        let mut registry = DetectorRegistry::new();
        registry
            .register_all("press-3", &quantities::CURRENT_INTEGRALS, &spec())
            .unwrap();
        assert_eq!(registry.len(), 3);

        for v in [1.0, 2.0, 3.0] {
            registry
                .evaluate("press-3", quantities::EL_CURRENT_INTEGRAL_PH1, v)
                .unwrap();
        }
        let ph1 = registry.get("press-3", quantities::EL_CURRENT_INTEGRAL_PH1).unwrap();
        let ph2 = registry.get("press-3", quantities::EL_CURRENT_INTEGRAL_PH2).unwrap();
        assert!(ph1.model().is_complete());
        assert!(ph2.model().is_empty());

        registry.reset_all();
        let ph1 = registry.get("press-3", quantities::EL_CURRENT_INTEGRAL_PH1).unwrap();
        assert!(ph1.model().is_empty());
    }

    #[test]
    fn test_ids_sorted() {
        let mut registry = DetectorRegistry::new();
        registry.register("b", quantities::VIB_TOTAL_RMS, &spec()).unwrap();
        registry.register("a", quantities::VIB_TOTAL_RMS, &spec()).unwrap();
        assert_eq!(registry.ids(), vec!["a:vib_total_rms", "b:vib_total_rms"]);
    }
}
