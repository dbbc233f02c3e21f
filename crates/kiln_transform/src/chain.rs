//! Ordered transform chains, one per asset kind.

use crate::error::{StepFailure, TransformError};
use crate::step::{create, Transform};
use kiln_common::{AssetKind, ContentHash, ContentHasher, KILN_VERSION};
use kiln_config::ProjectConfig;

/// The ordered steps applied to one asset kind.
pub struct Chain {
    kind: AssetKind,
    steps: Vec<Box<dyn Transform>>,
    identity: ContentHash,
    tool_version: ContentHash,
}

impl Chain {
    /// Builds a chain from instantiated steps.
    pub fn new(kind: AssetKind, steps: Vec<Box<dyn Transform>>) -> Self {
        let mut identity = ContentHasher::new();
        identity.update_str(kind.name());
        let mut tool_version = ContentHasher::new();
        tool_version.update_str(KILN_VERSION);
        for step in &steps {
            identity
                .update_str(step.kind().name())
                .update_str(step.options());
            tool_version
                .update_str(step.kind().name())
                .update(&step.version().to_le_bytes());
        }
        Self {
            kind,
            steps,
            identity: identity.finish(),
            tool_version: tool_version.finish(),
        }
    }

    /// The asset kind this chain accepts.
    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    /// Fingerprint of the step names and their normalised options.
    pub fn identity(&self) -> ContentHash {
        self.identity
    }

    /// Fingerprint of the step implementation versions and the Kiln version.
    pub fn tool_version(&self) -> ContentHash {
        self.tool_version
    }

    /// The steps in application order.
    pub fn steps(&self) -> &[Box<dyn Transform>] {
        &self.steps
    }

    /// Returns `true` if the chain passes input through unchanged.
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Runs every step in order, piping each output into the next step.
    pub fn apply(&self, input: &[u8]) -> Result<Vec<u8>, StepFailure> {
        self.apply_with(input, |_| true)
            .map(|out| out.unwrap_or_default())
    }

    /// Like [`Chain::apply`], but consults `proceed` before each step and
    /// stops with `Ok(None)` as soon as it returns `false`.
    pub fn apply_with(
        &self,
        input: &[u8],
        mut proceed: impl FnMut(&dyn Transform) -> bool,
    ) -> Result<Option<Vec<u8>>, StepFailure> {
        let mut current = input.to_vec();
        for step in &self.steps {
            if !proceed(step.as_ref()) {
                return Ok(None);
            }
            current = step.apply(&current).map_err(|error| StepFailure {
                step: step.kind(),
                error,
            })?;
        }
        Ok(Some(current))
    }
}

/// One chain per asset kind, built from the project configuration.
pub struct ChainSet {
    chains: Vec<Chain>,
}

impl ChainSet {
    /// Instantiates the `[chains]` section with the `[transforms.*]` options.
    pub fn from_config(config: &ProjectConfig) -> Result<Self, TransformError> {
        let chains = AssetKind::ALL
            .into_iter()
            .map(|kind| -> Result<Chain, TransformError> {
                let steps = config
                    .chains
                    .for_kind(kind)
                    .iter()
                    .map(|&step| create(step, config.transform_options(step)))
                    .collect::<Result<Vec<_>, _>>()?;
                tracing::trace!(%kind, steps = steps.len(), "built transform chain");
                Ok(Chain::new(kind, steps))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { chains })
    }

    /// The chain for `kind`.
    pub fn get(&self, kind: AssetKind) -> &Chain {
        &self.chains[kind as usize]
    }

    /// Swaps in `chain` for its asset kind.
    pub fn replace(&mut self, chain: Chain) {
        let kind = chain.kind();
        self.chains[kind as usize] = chain;
    }
}
