use std::{any::TypeId, sync::Arc};

use injector::{
    implements, Component, ComponentManifest, Constructor, Injector, Lazy, Module, Property,
    ResolveError, ServiceKey, TypeInfo,
};

trait Greeter: Send + Sync {
    fn greet(&self) -> &'static str;
}

struct English;
struct German;
impl Greeter for English {
    fn greet(&self) -> &'static str {
        "hello"
    }
}
impl Greeter for German {
    fn greet(&self) -> &'static str {
        "hallo"
    }
}
impl Component for English {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(Constructor::new(|_| Ok(English)));
    }
}
impl Component for German {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(Constructor::new(|_| Ok(German)));
    }
}
implements!(English => dyn Greeter);
implements!(German => dyn Greeter);

struct Reception {
    greeter: Arc<dyn Greeter>,
}
impl Component for Reception {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(
            Constructor::new(|args| {
                Ok(Reception {
                    greeter: args.next()?,
                })
            })
            .param::<Arc<dyn Greeter>>("greeter"),
        );
    }
}

#[test]
fn unregistered_interface_is_resolved_by_scanning() {
    let injector = Injector::builder()
        .module(Module::new("greetings").implementation::<dyn Greeter, English>())
        .build();
    injector.register_type::<Reception, Reception>();

    let reception = injector.get_instance::<Reception>().unwrap();

    assert_eq!(reception.greeter.greet(), "hello");
    assert!(injector.scanner().is_cached(TypeId::of::<dyn Greeter>()));
    assert!(!injector.is_registered::<dyn Greeter>());
}

#[test]
fn scanned_implementations_are_not_singletons() {
    let injector = Injector::builder()
        .module(Module::new("greetings").implementation::<dyn Greeter, English>())
        .build();

    let first = injector.get_instance::<dyn Greeter>().unwrap();
    let second = injector.get_instance::<dyn Greeter>().unwrap();

    assert!(!Arc::ptr_eq(&first, &second));
    assert!(!injector.is_cached::<dyn Greeter>());
}

#[test]
fn several_implementations_without_preference_fail() {
    let injector = Injector::builder()
        .module(
            Module::new("greetings")
                .implementation::<dyn Greeter, English>()
                .implementation::<dyn Greeter, German>(),
        )
        .build();

    let error = injector.get_instance::<dyn Greeter>().err().unwrap();
    let ResolveError::AmbiguousImplementation {
        interface,
        candidates,
        ..
    } = &error
    else {
        panic!("expected an ambiguity error, got {error}");
    };
    assert_eq!(*interface, TypeInfo::of::<dyn Greeter>());
    assert!(candidates.contains(&TypeInfo::of::<English>()));
    assert!(candidates.contains(&TypeInfo::of::<German>()));
}

#[test]
fn ambiguity_also_fails_nested_resolutions() {
    let injector = Injector::builder()
        .module(
            Module::new("greetings")
                .implementation::<dyn Greeter, English>()
                .implementation::<dyn Greeter, German>(),
        )
        .build();
    injector.register_type::<Reception, Reception>();

    let error = injector.get_instance::<Reception>().err().unwrap();

    let ResolveError::AmbiguousImplementation { path, .. } = &error else {
        panic!("expected an ambiguity error, got {error}");
    };
    assert_eq!(
        path.keys(),
        &[
            ServiceKey::of::<Reception>(),
            ServiceKey::of::<dyn Greeter>()
        ]
    );
    assert_eq!(error.origin(), Some(&ServiceKey::of::<Reception>()));
}

#[test]
fn preferred_implementation_is_selected() {
    let injector = Injector::builder()
        .module(
            Module::new("greetings")
                .implementation::<dyn Greeter, English>()
                .preferred_implementation::<dyn Greeter, German>(),
        )
        .build();

    for _ in 0..3 {
        assert_eq!(injector.get_instance::<dyn Greeter>().unwrap().greet(), "hallo");
    }
}

#[test]
fn scan_results_are_never_refreshed() {
    let injector = Injector::builder()
        .module(Module::new("first").implementation::<dyn Greeter, English>())
        .build();
    assert_eq!(injector.get_instance::<dyn Greeter>().unwrap().greet(), "hello");

    injector.add_module(Module::new("second").preferred_implementation::<dyn Greeter, German>());
    assert_eq!(injector.get_instance::<dyn Greeter>().unwrap().greet(), "hello");

    injector.reset_metadata_caches();
    assert_eq!(injector.get_instance::<dyn Greeter>().unwrap().greet(), "hallo");
}

#[test]
fn registrations_take_precedence_over_scanning() {
    let injector = Injector::builder()
        .module(Module::new("greetings").implementation::<dyn Greeter, English>())
        .build();
    injector.register_type::<dyn Greeter, German>();

    assert_eq!(injector.get_instance::<dyn Greeter>().unwrap().greet(), "hallo");
    assert_eq!(injector.scanner().cached_interfaces(), 0);
}

#[test]
fn named_requests_are_not_scanned() {
    let injector = Injector::builder()
        .module(Module::new("greetings").implementation::<dyn Greeter, English>())
        .build();

    let error = injector.get_instance_named::<dyn Greeter>("formal").err().unwrap();
    assert!(matches!(error, ResolveError::Unresolvable { .. }));
}

/// Takes a greeter after construction, if there is one
struct Desk {
    greeter: Option<Lazy<dyn Greeter>>,
}
impl Component for Desk {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest
            .constructor(Constructor::new(|_| Ok(Desk { greeter: None })))
            .property(Property::new(
                "greeter",
                |desk: &mut Desk, greeter: Option<Lazy<dyn Greeter>>| desk.greeter = greeter,
            ));
    }
}

#[test]
fn optional_lazy_dependencies_report_ambiguity() {
    let injector = Injector::builder()
        .module(
            Module::new("greetings")
                .implementation::<dyn Greeter, English>()
                .implementation::<dyn Greeter, German>(),
        )
        .build();
    injector.register_type::<Desk, Desk>();

    let error = injector.get_instance::<Desk>().err().unwrap();

    assert!(matches!(error, ResolveError::AmbiguousImplementation { .. }));
    assert_eq!(error.origin(), Some(&ServiceKey::of::<Desk>()));
}

#[test]
fn optional_lazy_dependencies_use_a_unique_implementation() {
    let injector = Injector::builder()
        .module(Module::new("greetings").implementation::<dyn Greeter, English>())
        .build();
    injector.register_type::<Desk, Desk>();

    let desk = injector.get_instance::<Desk>().unwrap();

    let greeter = desk.greeter.as_ref().unwrap();
    assert_eq!(greeter.get().greet(), "hello");
}
