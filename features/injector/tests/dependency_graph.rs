use std::sync::Arc;

use injector::{
    Component, ComponentManifest, Constructor, DependencyGraphError, Injector, Lazy,
    ResolveError, ServiceKey, ValueOverrides,
};

struct Chicken {
    _egg: Arc<Egg>,
}
struct Egg {
    _chicken: Arc<Chicken>,
}
impl Component for Chicken {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(
            Constructor::new(|args| Ok(Chicken { _egg: args.next()? })).param::<Arc<Egg>>("egg"),
        );
    }
}
impl Component for Egg {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(
            Constructor::new(|args| Ok(Egg { _chicken: args.next()? }))
                .param::<Arc<Chicken>>("chicken"),
        );
    }
}

struct Parent {
    child: Arc<Child>,
}
struct Child {
    parent: Lazy<Parent>,
}
impl Component for Parent {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(
            Constructor::new(|args| Ok(Parent { child: args.next()? }))
                .param::<Arc<Child>>("child"),
        );
    }
}
impl Component for Child {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(
            Constructor::new(|args| Ok(Child { parent: args.next()? }))
                .param::<Lazy<Parent>>("parent"),
        );
    }
}

/// Accesses a lazy dependency on itself while being constructed
struct Impatient;
impl Component for Impatient {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(
            Constructor::new(|args| {
                let itself: Lazy<Impatient> = args.next()?;
                itself.try_get().map_err(Clone::clone)?;
                Ok(Impatient)
            })
            .param::<Lazy<Impatient>>("itself"),
        );
    }
}

trait Missing: Send + Sync {}

struct Tolerant {
    missing: Option<Arc<dyn Missing>>,
    later: Option<Lazy<dyn Missing>>,
}
impl Component for Tolerant {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(
            Constructor::new(|args| {
                Ok(Tolerant {
                    missing: args.next()?,
                    later: args.next()?,
                })
            })
            .param::<Option<Arc<dyn Missing>>>("missing")
            .param::<Option<Lazy<dyn Missing>>>("later"),
        );
    }
}

struct Broken;
impl Component for Broken {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(
            Constructor::new(|args| {
                let _missing: Arc<dyn Missing> = args.next()?;
                Ok(Broken)
            })
            .param::<Arc<dyn Missing>>("missing"),
        );
    }
}

/// Optional dependency on a registered component which cannot be built
struct TolerantOfBroken {
    _broken: Option<Arc<Broken>>,
}
impl Component for TolerantOfBroken {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(
            Constructor::new(|args| Ok(TolerantOfBroken { _broken: args.next()? }))
                .param::<Option<Arc<Broken>>>("broken"),
        );
    }
}

struct Unbuildable;
impl Component for Unbuildable {
    fn manifest(_: &mut ComponentManifest<Self>) {}
}

struct Level<const N: usize>;
impl Component for Level<0> {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(Constructor::new(|_| Ok(Level::<0>)));
    }
}
impl Component for Level<1> {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(
            Constructor::new(|args| {
                let _below: Arc<Level<0>> = args.next()?;
                Ok(Level::<1>)
            })
            .param::<Arc<Level<0>>>("below"),
        );
    }
}
impl Component for Level<2> {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(
            Constructor::new(|args| {
                let _below: Arc<Level<1>> = args.next()?;
                Ok(Level::<2>)
            })
            .param::<Arc<Level<1>>>("below"),
        );
    }
}

fn register_levels(injector: &Injector) {
    injector.register_type::<Level<0>, Level<0>>();
    injector.register_type::<Level<1>, Level<1>>();
    injector.register_type::<Level<2>, Level<2>>();
}

#[test]
fn circular_dependencies_fail_fast() {
    let injector = Injector::new();
    injector.register_type::<Chicken, Chicken>();
    injector.register_type::<Egg, Egg>();

    let error = injector.get_instance::<Chicken>().err().unwrap();
    let ResolveError::CircularDependency { key, path } = &error else {
        panic!("expected a circular dependency, got {error}");
    };
    assert_eq!(*key, ServiceKey::of::<Chicken>());
    assert_eq!(
        path.keys(),
        &[
            ServiceKey::of::<Chicken>(),
            ServiceKey::of::<Egg>(),
            ServiceKey::of::<Chicken>()
        ]
    );
}

#[test]
fn lazy_dependencies_break_cycles() {
    let injector = Injector::new();
    injector.register_singleton::<Parent, Parent>();
    injector.register_singleton::<Child, Child>();

    let parent = injector.get_instance::<Parent>().unwrap();

    assert!(!parent.child.parent.is_resolved());
    assert!(Arc::ptr_eq(parent.child.parent.get(), &parent));
    assert!(parent.child.parent.is_resolved());
}

#[test]
fn lazy_access_during_own_construction_is_a_cycle() {
    let injector = Injector::new();
    injector.register_singleton::<Impatient, Impatient>();

    let error = injector.get_instance::<Impatient>().err().unwrap();
    assert!(matches!(error, ResolveError::CircularDependency { .. }));
    assert!(!injector.is_cached::<Impatient>());
}

#[test]
fn depth_limit_is_enforced() {
    let shallow = Injector::builder().max_depth(2).build();
    register_levels(&shallow);
    assert!(shallow.get_instance::<Level<1>>().is_ok());
    assert!(matches!(
        shallow.get_instance::<Level<2>>(),
        Err(ResolveError::DepthExceeded { max_depth: 2, .. })
    ));

    let deep = Injector::new();
    register_levels(&deep);
    assert!(deep.get_instance::<Level<2>>().is_ok());
}

#[test]
fn missing_optional_dependencies_are_none() {
    let injector = Injector::new();
    injector.register_type::<Tolerant, Tolerant>();

    let tolerant = injector.get_instance::<Tolerant>().unwrap();
    assert!(tolerant.missing.is_none());
    assert!(tolerant.later.is_none());
}

#[test]
fn optional_dependencies_still_report_nested_failures() {
    let injector = Injector::new();
    injector.register_type::<Broken, Broken>();
    injector.register_type::<TolerantOfBroken, TolerantOfBroken>();

    let error = injector.get_instance::<TolerantOfBroken>().err().unwrap();
    assert_eq!(error.missing_key(), Some(&ServiceKey::of::<dyn Missing>()));
}

#[test]
fn unresolvable_lazy_fails_on_access() {
    struct WantsMissing {
        missing: Lazy<dyn Missing>,
    }
    impl Component for WantsMissing {
        fn manifest(manifest: &mut ComponentManifest<Self>) {
            manifest.constructor(
                Constructor::new(|args| Ok(WantsMissing { missing: args.next()? }))
                    .param::<Lazy<dyn Missing>>("missing"),
            );
        }
    }

    let injector = Injector::new();
    injector.register_type::<WantsMissing, WantsMissing>();

    let wants = injector.get_instance::<WantsMissing>().unwrap();
    let error = wants.missing.try_get().err().unwrap();
    assert_eq!(error.missing_key(), Some(&ServiceKey::of::<dyn Missing>()));
}

#[test]
fn lazy_fails_once_the_injector_is_dropped() {
    let injector = Injector::new();
    injector.register_type::<Child, Child>();
    injector.register_type::<Parent, Parent>();

    let child = injector.get_instance::<Child>().unwrap();
    drop(injector);

    assert!(matches!(
        child.parent.try_get(),
        Err(ResolveError::InjectorDropped(_))
    ));
}

#[test]
fn valid_graph_passes_validation() {
    let injector = Injector::new();
    register_levels(&injector);
    injector.register_singleton::<Parent, Parent>();
    injector.register_singleton::<Child, Child>();
    injector.register_type::<Tolerant, Tolerant>();

    let graph = injector.validate().unwrap();

    assert_eq!(graph.len(), 6);
    assert_eq!(
        graph.dependencies(&ServiceKey::of::<Level<2>>()),
        Some(vec![&ServiceKey::of::<Level<1>>()])
    );
}

#[test]
fn validation_reports_every_issue() {
    let injector = Injector::new();
    injector.register_type::<Chicken, Chicken>();
    injector.register_type::<Egg, Egg>();
    injector.register_type::<Broken, Broken>();
    injector.register_type::<Unbuildable, Unbuildable>();

    let errors = injector.validate().err().unwrap().errors;

    assert!(errors.iter().any(|error| matches!(
        error,
        DependencyGraphError::MissingDependency { dependency, required_by }
            if *dependency == ServiceKey::of::<dyn Missing>()
                && *required_by == ServiceKey::of::<Broken>()
    )));
    assert!(errors
        .iter()
        .any(|error| matches!(error, DependencyGraphError::CircularDependency { .. })));
    assert!(errors
        .iter()
        .any(|error| matches!(error, DependencyGraphError::InvalidComponent { .. })));
}

struct Port(u16);
struct Listener {
    port: u16,
}
impl Component for Listener {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(
            Constructor::new(|args| {
                let port: Arc<Port> = args.next()?;
                Ok(Listener { port: port.0 })
            })
            .param::<Arc<Port>>("port"),
        );
    }
}

#[test]
fn overridden_parameters_are_not_required() {
    let injector = Injector::new();
    injector
        .register_type::<Listener, Listener>()
        .with_value_overrides(ValueOverrides::new().named("port", Port(8443)));

    assert!(injector.validate().is_ok());
    assert_eq!(injector.get_instance::<Listener>().unwrap().port, 8443);
}
