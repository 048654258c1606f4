use crate::{container::Injector, factories::InvokerKind, scanner::Module};

/// Default for [`InjectorOptions::max_depth`]
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Settings fixed when an injector is built
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InjectorOptions {
    /// Constructor invoker used for every type binding
    pub invoker: InvokerKind,
    /// Maximum number of nested resolutions in one call
    pub max_depth: usize,
}

impl Default for InjectorOptions {
    fn default() -> Self {
        InjectorOptions {
            invoker: InvokerKind::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Configures and creates an [`Injector`]
///
/// Registrations are added to the built injector, the builder only fixes the options and the
/// modules searched for implementations.
#[derive(Debug, Default)]
pub struct InjectorBuilder {
    options: InjectorOptions,
    modules: Vec<Module>,
}

impl InjectorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options(mut self, options: InjectorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn invoker(mut self, invoker: InvokerKind) -> Self {
        self.options.invoker = invoker;
        self
    }

    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.options.max_depth = max_depth;
        self
    }

    pub fn module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    pub fn build(self) -> Injector {
        Injector::from_parts(self.options, self.modules)
    }
}
