//! Strategy registry: binds each source type to its parser, extractor and
//! enricher.
//!
//! Registration is explicit. [`RegistryBuilder::build`] validates every
//! binding up front and reports all problems at once, so a misconfigured
//! source type fails at startup instead of on the first request that hits it.

use std::collections::HashMap;

use tracing::debug;

use siphon_shared::{Result, SiphonError, SourceIdentity, SourceType};

use crate::strategy::{Enricher, Extractor, SourceParser};

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// The capabilities offered for one source type, possibly incomplete.
pub struct Registration {
    source_type: SourceType,
    parser: Option<Box<dyn SourceParser>>,
    extractor: Option<Box<dyn Extractor>>,
    enricher: Option<Box<dyn Enricher>>,
}

impl Registration {
    pub fn new(source_type: SourceType) -> Self {
        Self {
            source_type,
            parser: None,
            extractor: None,
            enricher: None,
        }
    }

    pub fn parser(mut self, parser: impl SourceParser + 'static) -> Self {
        self.parser = Some(Box::new(parser));
        self
    }

    pub fn extractor(mut self, extractor: impl Extractor + 'static) -> Self {
        self.extractor = Some(Box::new(extractor));
        self
    }

    pub fn enricher(self, enricher: impl Enricher + 'static) -> Self {
        self.boxed_enricher(Box::new(enricher))
    }

    /// Set an enricher chosen at runtime.
    pub fn boxed_enricher(mut self, enricher: Box<dyn Enricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }
}

/// Collects registrations in order; recognizers are tried in that order.
#[derive(Default)]
pub struct RegistryBuilder {
    registrations: Vec<Registration>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a complete set of strategies for `source_type`.
    pub fn register(
        self,
        source_type: SourceType,
        parser: impl SourceParser + 'static,
        extractor: impl Extractor + 'static,
        enricher: impl Enricher + 'static,
    ) -> Self {
        self.add(
            Registration::new(source_type)
                .parser(parser)
                .extractor(extractor)
                .enricher(enricher),
        )
    }

    /// Add a registration as-is; completeness is checked by [`Self::build`].
    pub fn add(mut self, registration: Registration) -> Self {
        self.registrations.push(registration);
        self
    }

    /// Validate every registration and produce a usable registry.
    ///
    /// Fails with [`SiphonError::RegistryValidation`] listing every problem
    /// found: a missing capability, a capability declaring a different source
    /// type, a source type registered twice, or no registrations at all.
    pub fn build(self) -> Result<StrategyRegistry> {
        let mut problems = Vec::new();
        let mut order = Vec::new();
        let mut entries = HashMap::new();

        if self.registrations.is_empty() {
            problems.push("no source types registered".to_string());
        }

        for reg in self.registrations {
            let st = reg.source_type;
            let before = problems.len();

            if order.contains(&st) {
                problems.push(format!("{st}: registered more than once"));
            }

            let declared = [
                ("parser", reg.parser.as_ref().map(|p| p.source_type())),
                ("extractor", reg.extractor.as_ref().map(|x| x.source_type())),
                ("enricher", reg.enricher.as_ref().map(|e| e.source_type())),
            ];
            for (capability, declared_type) in declared {
                match declared_type {
                    None => problems.push(format!("{st}: missing {capability}")),
                    Some(other) if other != st => {
                        problems.push(format!("{st}: {capability} declares source type {other}"))
                    }
                    Some(_) => {}
                }
            }

            if problems.len() > before {
                order.push(st);
                continue;
            }

            if let (Some(parser), Some(extractor), Some(enricher)) =
                (reg.parser, reg.extractor, reg.enricher)
            {
                order.push(st);
                entries.insert(
                    st,
                    Strategies {
                        parser,
                        extractor,
                        enricher,
                    },
                );
            }
        }

        if !problems.is_empty() {
            return Err(SiphonError::RegistryValidation { problems });
        }

        debug!(types = ?order, "strategy registry built");
        Ok(StrategyRegistry { order, entries })
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

struct Strategies {
    parser: Box<dyn SourceParser>,
    extractor: Box<dyn Extractor>,
    enricher: Box<dyn Enricher>,
}

/// Validated, read-only strategy bindings.
pub struct StrategyRegistry {
    order: Vec<SourceType>,
    entries: HashMap<SourceType, Strategies>,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("types", &self.order)
            .finish()
    }
}

impl StrategyRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::new()
    }

    /// Source types in recognition order.
    pub fn registered_types(&self) -> &[SourceType] {
        &self.order
    }

    /// The first source type, in registration order, whose recognizer claims `input`.
    pub fn dispatch_recognizer(&self, input: &str) -> Result<SourceType> {
        self.order
            .iter()
            .copied()
            .find(|st| {
                self.entries
                    .get(st)
                    .is_some_and(|s| s.parser.recognize(input))
            })
            .ok_or_else(|| SiphonError::Recognition {
                input: input.to_string(),
            })
    }

    /// Dispatch `input` and canonicalize it with the matching parser.
    pub fn canonicalize(&self, input: &str) -> Result<SourceIdentity> {
        let source_type = self.dispatch_recognizer(input)?;
        self.parser_for(source_type)?.canonicalize(input)
    }

    pub fn parser_for(&self, source_type: SourceType) -> Result<&dyn SourceParser> {
        self.strategies(source_type).map(|s| s.parser.as_ref())
    }

    pub fn extractor_for(&self, source_type: SourceType) -> Result<&dyn Extractor> {
        self.strategies(source_type).map(|s| s.extractor.as_ref())
    }

    pub fn enricher_for(&self, source_type: SourceType) -> Result<&dyn Enricher> {
        self.strategies(source_type).map(|s| s.enricher.as_ref())
    }

    /// Inputs claimed by more than one recognizer, with every claimant in order.
    ///
    /// An empty result means the recognizers are disjoint over `inputs`.
    pub fn overlapping(&self, inputs: &[&str]) -> Vec<(String, Vec<SourceType>)> {
        inputs
            .iter()
            .filter_map(|input| {
                let claimants: Vec<SourceType> = self
                    .order
                    .iter()
                    .copied()
                    .filter(|st| {
                        self.entries
                            .get(st)
                            .is_some_and(|s| s.parser.recognize(input))
                    })
                    .collect();
                (claimants.len() > 1).then(|| (input.to_string(), claimants))
            })
            .collect()
    }

    fn strategies(&self, source_type: SourceType) -> Result<&Strategies> {
        self.entries
            .get(&source_type)
            .ok_or(SiphonError::Unregistered { source_type })
    }
}
