use std::{
    any::{Any, TypeId},
    fmt,
    str::FromStr,
    sync::Arc,
};

use dashmap::DashMap;

use crate::{
    errors::ResolveError,
    introspector::ConstructorDescriptor,
    resolver::{Argument, Arguments},
    types::{DynError, TypeInfo},
};

/// A freshly constructed, not yet shared, component
pub type Built = Box<dyn Any + Send + Sync>;

/// Invokes a constructor without arguments
pub type ParameterlessFactory = Arc<dyn Fn() -> Result<Built, DynError> + Send + Sync>;
/// Invokes a constructor with its resolved arguments, in parameter order
pub type ParameterizedFactory = Arc<dyn Fn(Vec<Argument>) -> Result<Built, DynError> + Send + Sync>;

/// Turns constructor descriptors into callable factories
///
/// Every call of a produced factory must construct a new value.
/// Caching instances is the job of the injector, never of the invoker.
pub trait ConstructorInvoker: Send + Sync {
    fn kind(&self) -> InvokerKind;

    fn parameterless_factory(
        &self,
        component: TypeInfo,
        constructor: &Arc<ConstructorDescriptor>,
    ) -> ParameterlessFactory;

    fn parameterized_factory(
        &self,
        component: TypeInfo,
        constructor: &Arc<ConstructorDescriptor>,
    ) -> ParameterizedFactory;
}

/// Available constructor invokers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum InvokerKind {
    /// Dispatches through the descriptor and checks every argument on every call
    Reflective,
    /// Builds one thunk per constructor and reuses it
    #[default]
    Compiled,
}

impl InvokerKind {
    pub fn create(self) -> Arc<dyn ConstructorInvoker> {
        match self {
            InvokerKind::Reflective => Arc::new(ReflectiveInvoker),
            InvokerKind::Compiled => Arc::new(CompiledInvoker::default()),
        }
    }
}

impl fmt::Display for InvokerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokerKind::Reflective => f.write_str("reflective"),
            InvokerKind::Compiled => f.write_str("compiled"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown invoker '{0}', expected 'reflective' or 'compiled'")]
pub struct UnknownInvoker(pub String);

impl FromStr for InvokerKind {
    type Err = UnknownInvoker;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reflective" => Ok(InvokerKind::Reflective),
            "compiled" => Ok(InvokerKind::Compiled),
            _ => Err(UnknownInvoker(s.to_string())),
        }
    }
}

/// Generic dispatch on every call
///
/// Re-validates the argument list against the descriptor each time it is invoked.
pub struct ReflectiveInvoker;

impl ReflectiveInvoker {
    fn check_arguments(
        component: TypeInfo,
        constructor: &ConstructorDescriptor,
        arguments: &[Argument],
    ) -> Result<(), ResolveError> {
        if arguments.len() != constructor.arity() {
            return Err(ResolveError::ArgumentCount {
                component,
                expected: constructor.arity(),
                received: arguments.len(),
            });
        }

        for (parameter, argument) in constructor.parameters.iter().zip(arguments) {
            if let Argument::Resolved(instance) = argument {
                if instance.info.type_id != parameter.dependency.type_info.type_id {
                    return Err(ResolveError::DowncastFailed {
                        required_type: parameter.dependency.type_info.type_name,
                        actual_type: instance.info.type_name,
                    });
                }
            }
        }
        Ok(())
    }
}

impl ConstructorInvoker for ReflectiveInvoker {
    fn kind(&self) -> InvokerKind {
        InvokerKind::Reflective
    }

    fn parameterless_factory(
        &self,
        component: TypeInfo,
        constructor: &Arc<ConstructorDescriptor>,
    ) -> ParameterlessFactory {
        let invoker = self.parameterized_factory(component, constructor);
        Arc::new(move || invoker(Vec::new()))
    }

    fn parameterized_factory(
        &self,
        component: TypeInfo,
        constructor: &Arc<ConstructorDescriptor>,
    ) -> ParameterizedFactory {
        let constructor = constructor.clone();
        Arc::new(move |arguments: Vec<Argument>| {
            Self::check_arguments(component, &constructor, &arguments)?;
            let mut arguments = Arguments::new(component, arguments);
            (constructor.body)(&mut arguments)
        })
    }
}

/// One prepared thunk per constructor, shared by all later resolutions of the type
///
/// The thunk only checks the argument count; casting happens inside the constructor body.
#[derive(Default)]
pub struct CompiledInvoker {
    parameterless: DashMap<(TypeId, usize), ParameterlessFactory>,
    parameterized: DashMap<(TypeId, usize), ParameterizedFactory>,
}

impl CompiledInvoker {
    /// Number of prepared thunks
    pub fn compiled(&self) -> usize {
        self.parameterless.len() + self.parameterized.len()
    }
}

impl ConstructorInvoker for CompiledInvoker {
    fn kind(&self) -> InvokerKind {
        InvokerKind::Compiled
    }

    fn parameterless_factory(
        &self,
        component: TypeInfo,
        constructor: &Arc<ConstructorDescriptor>,
    ) -> ParameterlessFactory {
        self.parameterless
            .entry((component.type_id, constructor.index))
            .or_insert_with(|| {
                tracing::trace!("Compiling parameterless constructor of {}", component.type_name);
                let body = constructor.body.clone();
                Arc::new(move || body(&mut Arguments::new(component, Vec::new())))
            })
            .clone()
    }

    fn parameterized_factory(
        &self,
        component: TypeInfo,
        constructor: &Arc<ConstructorDescriptor>,
    ) -> ParameterizedFactory {
        self.parameterized
            .entry((component.type_id, constructor.index))
            .or_insert_with(|| {
                tracing::trace!(
                    "Compiling constructor of {} with {} parameters",
                    component.type_name,
                    constructor.arity()
                );
                let body = constructor.body.clone();
                let arity = constructor.arity();
                Arc::new(move |arguments: Vec<Argument>| {
                    if arguments.len() != arity {
                        return Err(ResolveError::ArgumentCount {
                            component,
                            expected: arity,
                            received: arguments.len(),
                        }
                        .into());
                    }
                    body(&mut Arguments::new(component, arguments))
                })
            })
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::{
        component::{Component, ComponentManifest, Constructor},
        introspector::describe,
        types::Instance,
    };

    static COUNTER_BUILDS: AtomicUsize = AtomicUsize::new(0);

    struct Counter(usize);
    impl Component for Counter {
        fn manifest(manifest: &mut ComponentManifest<Self>) {
            manifest.constructor(Constructor::new(|_| {
                Ok(Counter(COUNTER_BUILDS.fetch_add(1, Ordering::SeqCst)))
            }));
        }
    }

    struct Sum(u32);
    impl Component for Sum {
        fn manifest(manifest: &mut ComponentManifest<Self>) {
            manifest.constructor(
                Constructor::new(|args| {
                    let a: Arc<u32> = args.next()?;
                    let b: Arc<u32> = args.next()?;
                    Ok(Sum(*a + *b))
                })
                .param::<Arc<u32>>("a")
                .param::<Arc<u32>>("b"),
            );
        }
    }

    fn numbers(a: u32, b: u32) -> Vec<Argument> {
        vec![
            Argument::Resolved(Instance::from_value(a)),
            Argument::Resolved(Instance::from_value(b)),
        ]
    }

    #[test]
    fn both_invokers_build_distinct_values() {
        let metadata = describe::<Counter>().unwrap();
        for kind in [InvokerKind::Reflective, InvokerKind::Compiled] {
            let invoker = kind.create();
            let factory = invoker.parameterless_factory(metadata.type_info, &metadata.constructor);

            let first = factory().unwrap().downcast::<Counter>().unwrap();
            let second = factory().unwrap().downcast::<Counter>().unwrap();
            assert_ne!(first.0, second.0, "{kind} invoker must not reuse values");
        }
    }

    #[test]
    fn both_invokers_pass_arguments_in_order() {
        let metadata = describe::<Sum>().unwrap();
        for kind in [InvokerKind::Reflective, InvokerKind::Compiled] {
            let factory = kind
                .create()
                .parameterized_factory(metadata.type_info, &metadata.constructor);
            let sum = factory(numbers(2, 3)).unwrap().downcast::<Sum>().unwrap();
            assert_eq!(sum.0, 5);
        }
    }

    #[test]
    fn compiled_invoker_reuses_thunks() {
        let metadata = describe::<Sum>().unwrap();
        let invoker = CompiledInvoker::default();

        let first = invoker.parameterized_factory(metadata.type_info, &metadata.constructor);
        let second = invoker.parameterized_factory(metadata.type_info, &metadata.constructor);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(invoker.compiled(), 1);
    }

    #[test]
    fn reflective_invoker_checks_argument_types() {
        let metadata = describe::<Sum>().unwrap();
        let factory =
            ReflectiveInvoker.parameterized_factory(metadata.type_info, &metadata.constructor);

        let arguments = vec![
            Argument::Resolved(Instance::from_value(1u32)),
            Argument::Resolved(Instance::from_value("two".to_string())),
        ];
        let error = factory(arguments).unwrap_err();
        assert!(error.to_string().contains("Failed to downcast"));

        let error = factory(Vec::new()).unwrap_err();
        assert!(error.to_string().contains("expects 2 constructor arguments"));
    }

    #[test]
    fn invoker_kind_parses_from_text() {
        assert_eq!("Compiled".parse::<InvokerKind>(), Ok(InvokerKind::Compiled));
        assert_eq!(" reflective ".parse::<InvokerKind>(), Ok(InvokerKind::Reflective));
        assert!("jit".parse::<InvokerKind>().is_err());
    }
}
