use crate::block::DataType;
use crate::function::{builtin, FunctionBinding, ScalarImplementation, Signature};
use log::trace;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Source of function implementations for the compiler
pub trait FunctionResolver: Send + Sync {
    /// Resolve a concrete signature. `None` means no such function.
    fn resolve(&self, signature: &Signature) -> Option<Arc<FunctionBinding>>;
}

type Specializer = dyn Fn(&Signature) -> Option<ScalarImplementation> + Send + Sync;

/// A registered function, possibly generic over its argument types
pub struct FunctionDefinition {
    pub name: String,
    specialize: Box<Specializer>,
    pub can_fail: bool,
    pub deterministic: bool,
}

impl FunctionDefinition {
    /// A definition that matches exactly one signature
    pub fn fixed(
        name: impl Into<String>,
        argument_types: Vec<DataType>,
        return_type: DataType,
        implementation: ScalarImplementation,
    ) -> Self {
        Self::generic(name, move |signature| {
            (signature.argument_types == argument_types && signature.return_type == return_type)
                .then(|| implementation.clone())
        })
    }

    /// A definition that inspects the requested signature and returns an
    /// implementation for the types it supports
    pub fn generic<F>(name: impl Into<String>, specialize: F) -> Self
    where
        F: Fn(&Signature) -> Option<ScalarImplementation> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            specialize: Box::new(specialize),
            can_fail: false,
            deterministic: true,
        }
    }

    pub fn can_fail(mut self) -> Self {
        self.can_fail = true;
        self
    }

    pub fn nondeterministic(mut self) -> Self {
        self.deterministic = false;
        self
    }

    fn bind(&self, signature: &Signature) -> Option<FunctionBinding> {
        let implementation = (self.specialize)(signature)?;
        Some(
            FunctionBinding::new(signature.clone(), implementation)
                .with_can_fail(self.can_fail)
                .with_deterministic(self.deterministic),
        )
    }
}

impl fmt::Debug for FunctionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDefinition")
            .field("name", &self.name)
            .field("can_fail", &self.can_fail)
            .field("deterministic", &self.deterministic)
            .finish()
    }
}

/// In-memory function catalog
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Vec<FunctionDefinition>>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in operators and functions
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Add a definition. Definitions registered earlier under the same name
    /// win when more than one matches a signature.
    pub fn register(&mut self, definition: FunctionDefinition) {
        self.functions
            .entry(definition.name.clone())
            .or_default()
            .push(definition);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.functions.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl FunctionResolver for FunctionRegistry {
    fn resolve(&self, signature: &Signature) -> Option<Arc<FunctionBinding>> {
        let binding = self
            .functions
            .get(&signature.name)?
            .iter()
            .find_map(|definition| definition.bind(signature))?;
        trace!(
            "Resolved {} ({:?})",
            signature,
            binding.null_convention()
        );
        Some(Arc::new(binding))
    }
}
