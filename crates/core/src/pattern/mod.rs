use std::sync::Arc;

use crate::{PulsedeckError, Result};

/// An ordered sequence of nonzero signed steps describing a rhythm.
///
/// Positive steps produce an audible pulse, negative steps a silent rest.
/// The magnitude divides the base beat interval, so a step of `2` lasts half
/// as long as a step of `1` at the same frequency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RhythmPattern {
    name: String,
    steps: Vec<i32>,
}

impl RhythmPattern {
    /// Validates and constructs a pattern. Every step must be nonzero and
    /// the sequence must not be empty.
    pub fn new(name: impl Into<String>, steps: Vec<i32>) -> Result<Self> {
        let name = name.into();
        if steps.is_empty() {
            return Err(PulsedeckError::InvalidPattern {
                name,
                reason: "pattern must contain at least one step".to_string(),
            });
        }
        if steps.iter().any(|step| *step == 0) {
            return Err(PulsedeckError::InvalidPattern {
                name,
                reason: "steps must be nonzero".to_string(),
            });
        }
        Ok(Self { name, steps })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[i32] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Read-only, insertion-ordered registry of named rhythm patterns.
///
/// Fixed after construction: patterns can be enumerated and looked up but
/// never added, replaced, or removed at runtime.
#[derive(Debug, Default, Clone)]
pub struct PatternCatalog {
    patterns: Vec<Arc<RhythmPattern>>,
}

impl PatternCatalog {
    /// Builds a catalog from the given patterns, rejecting duplicate names.
    pub fn new(patterns: Vec<RhythmPattern>) -> Result<Self> {
        let mut catalog = Self {
            patterns: Vec::with_capacity(patterns.len()),
        };
        for pattern in patterns {
            if catalog.contains(pattern.name()) {
                return Err(PulsedeckError::InvalidPattern {
                    name: pattern.name().to_string(),
                    reason: "duplicate pattern name".to_string(),
                });
            }
            catalog.patterns.push(Arc::new(pattern));
        }
        Ok(catalog)
    }

    /// The stock pattern set shipped with the application.
    pub fn builtin() -> Self {
        let defs: &[(&str, &[i32])] = &[
            ("Standard Beat", &[1]),
            ("Quick Swing", &[1, 2, 2, -1, -1]),
            ("Simple Bounce", &[1, 1, -1, 1, 1, -1]),
            ("Double Tap", &[2, 2, -2, 2, 2, -2]),
            ("Syncopated 4/4", &[1, -1, 1, -1, 1, 1, 1]),
            ("Long Rest", &[1, -2, -2, -2]),
            ("Double Tap Pause", &[2, 2, -1, -1, -1, -1]),
            ("Delayed Swing", &[1, -2, 2, -2, 1, -2, 2, -2]),
            ("Triple Quick Tap", &[1, 4, 4, -2, -2]),
            ("Missing Third", &[1, 1, -3, 1]),
            ("Build Up", &[1, 2, 3, 4, -4, -4]),
            ("Slow Down", &[4, 3, 2, 1, -2]),
            ("Speed Change", &[1, 1, 1, 1, 2, 2, 2, 2]),
        ];

        let patterns = defs
            .iter()
            .map(|(name, steps)| {
                RhythmPattern::new(*name, steps.to_vec())
                    .expect("builtin patterns are statically valid")
            })
            .collect();

        Self::new(patterns).expect("builtin pattern names are unique")
    }

    /// Looks up a pattern by display name.
    pub fn get(&self, name: &str) -> Result<Arc<RhythmPattern>> {
        self.patterns
            .iter()
            .find(|pattern| pattern.name() == name)
            .cloned()
            .ok_or_else(|| PulsedeckError::UnknownPattern(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.name() == name)
    }

    /// Pattern names in catalog order.
    pub fn names(&self) -> Vec<String> {
        self.patterns
            .iter()
            .map(|pattern| pattern.name().to_string())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RhythmPattern>> {
        self.patterns.iter()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
