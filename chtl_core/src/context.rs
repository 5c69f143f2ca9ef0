use crate::ChtlError;
use crate::ChtlResult;
use crate::Policy;
use crate::SourceConfiguration;
use crate::StrictConfig;
use crate::Warning;
use crate::ast::Reference;
use crate::registry::DEFAULT_NAMESPACE;
use crate::registry::DefinitionKind;
use crate::registry::Registry;

/// State owned by a single compilation and passed explicitly to every
/// stage.
#[derive(Debug, Clone, Default)]
pub struct CompileContext {
	pub registry: Registry,
	/// Namespace new definitions are registered under.
	pub namespace: String,
	pub source_config: SourceConfiguration,
	pub policies: StrictConfig,
	pub warnings: Vec<Warning>,
}

impl CompileContext {
	pub fn new(policies: StrictConfig) -> Self {
		Self {
			namespace: DEFAULT_NAMESPACE.to_string(),
			policies,
			..Self::default()
		}
	}

	pub fn in_default_namespace(&self) -> bool {
		self.namespace == DEFAULT_NAMESPACE
	}

	/// Report a usage whose definition could not be found. Under
	/// [`Policy::Warn`] the usage is skipped and a warning recorded.
	pub fn unresolved(&mut self, kind: DefinitionKind, reference: &Reference) -> ChtlResult<()> {
		let namespace = reference
			.namespace
			.clone()
			.unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

		match self.policies.unresolved_usage {
			Policy::Error => {
				Err(ChtlError::UnresolvedDefinition {
					kind: kind.to_string(),
					name: reference.name.clone(),
					namespace,
				})
			}
			Policy::Warn => {
				tracing::warn!(%kind, name = %reference.name, %namespace, "skipping unresolved usage");
				self.warnings.push(Warning::UnresolvedDefinition {
					kind: kind.to_string(),
					name: reference.name.clone(),
					namespace,
				});
				Ok(())
			}
		}
	}
}
