pub mod graph;

use std::collections::BTreeMap;
use std::fmt;

pub use graph::{ChainGraph, GraphError};

/// One stompbox in a preset's signal chain.
///
/// The index is fixed when the owning [`ChainGraph`] is built and is the only
/// key used to address the unit from edges and control events.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectUnit {
    identity: String,
    index: usize,
    bypass: bool,
    parameters: BTreeMap<String, f32>,
}

impl EffectUnit {
    /// Create an unplaced unit. The graph assigns the real index.
    pub fn new(identity: impl Into<String>) -> Self {
        EffectUnit {
            identity: identity.into(),
            index: 0,
            bypass: false,
            parameters: BTreeMap::new(),
        }
    }

    /// Plugin URI (or other implementation identifier).
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn set_index(&mut self, index: usize) {
        self.index = index;
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    #[allow(dead_code)]
    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypass = bypass;
    }

    /// Flip the bypass flag and return the new state.
    pub fn toggle_bypass(&mut self) -> bool {
        self.bypass = !self.bypass;
        self.bypass
    }

    /// Parameters are absent until something writes them.
    #[allow(dead_code)]
    pub fn parameter(&self, symbol: &str) -> Option<f32> {
        self.parameters.get(symbol).copied()
    }

    pub fn set_parameter(&mut self, symbol: impl Into<String>, value: f32) {
        self.parameters.insert(symbol.into(), value);
    }

    #[allow(dead_code)]
    pub fn parameters(&self) -> impl Iterator<Item = (&str, f32)> {
        self.parameters.iter().map(|(k, &v)| (k.as_str(), v))
    }
}

impl fmt::Display for EffectUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] \"{}\"", self.index, self.identity)?;
        if self.bypass {
            write!(f, " (bypassed)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_unit_has_no_parameters_and_is_active() {
        let unit = EffectUnit::new("http://example.org/fuzz");
        assert_eq!(unit.identity(), "http://example.org/fuzz");
        assert!(!unit.is_bypassed());
        assert_eq!(unit.parameter("gain"), None);
        assert_eq!(unit.parameters().count(), 0);
    }

    #[test]
    fn toggle_bypass_flips_state() {
        let mut unit = EffectUnit::new("a");
        assert!(unit.toggle_bypass());
        assert!(unit.is_bypassed());
        assert!(!unit.toggle_bypass());
        assert!(!unit.is_bypassed());
    }

    #[test]
    fn set_parameter_overwrites() {
        let mut unit = EffectUnit::new("a");
        unit.set_parameter("gain", 0.25);
        unit.set_parameter("gain", 0.75);
        assert_eq!(unit.parameter("gain"), Some(0.75));
        assert_eq!(unit.parameters().collect::<Vec<_>>(), vec![("gain", 0.75)]);
    }

    #[test]
    fn display_shows_index_identity_and_bypass() {
        let mut unit = EffectUnit::new("urn:delay");
        unit.set_index(3);
        assert_eq!(unit.to_string(), "[3] \"urn:delay\"");
        unit.set_bypass(true);
        assert_eq!(unit.to_string(), "[3] \"urn:delay\" (bypassed)");
    }
}
