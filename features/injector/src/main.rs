use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use injector::{
    implements, Component, ComponentManifest, Constructor, Injector, InvokerKind, Lazy, Module,
    Property, ValueOverrides,
};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "debug".into()))
        .init();

    let invoker = std::env::var("INJECTOR_INVOKER")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(InvokerKind::Compiled);

    let app = Injector::builder()
        .invoker(invoker)
        .module(Module::new("storage").implementation::<dyn Storage, MemoryStorage>())
        .build();

    app.register_instance(Arc::new("demo".to_string()));
    app.register_singleton::<Repository, Repository>()
        .with_value_overrides(ValueOverrides::new().named("capacity", 16usize))
        .on_resolved(|registration, repository| {
            println!("{} resolved with capacity {}", registration.key, repository.capacity)
        });
    app.register_type::<Service, Service>();

    if let Err(errors) = app.validate() {
        println!("{errors}");
        return;
    }

    let first = app.get_instance::<Service>().unwrap();
    let second = app.get_instance::<Service>().unwrap();
    println!("{:?}", app);
    println!(
        "Services are distinct: {}, repository is shared: {}",
        !Arc::ptr_eq(&first, &second),
        Arc::ptr_eq(&first.repository, &second.repository)
    );
    println!("{}", first.describe());
}

trait Storage: Send + Sync {
    fn kind(&self) -> &'static str;
}

static STORAGES: AtomicUsize = AtomicUsize::new(0);

struct MemoryStorage;
impl Storage for MemoryStorage {
    fn kind(&self) -> &'static str {
        "memory"
    }
}
impl Component for MemoryStorage {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(Constructor::new(|_| {
            STORAGES.fetch_add(1, Ordering::SeqCst);
            Ok(MemoryStorage)
        }));
    }
}
implements!(MemoryStorage => dyn Storage);

struct Repository {
    storage: Arc<dyn Storage>,
    capacity: usize,
}
impl Component for Repository {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest.constructor(
            Constructor::new(|args| {
                let storage: Arc<dyn Storage> = args.next()?;
                let capacity: Arc<usize> = args.next()?;
                Ok(Repository {
                    storage,
                    capacity: *capacity,
                })
            })
            .param::<Arc<dyn Storage>>("storage")
            .param::<Arc<usize>>("capacity"),
        );
    }
}

struct Service {
    name: Arc<String>,
    repository: Arc<Repository>,
    audit: Option<Lazy<dyn Storage>>,
}
impl Service {
    fn describe(&self) -> String {
        format!(
            "Service '{}' stores in {} ({} storages built), audit: {}",
            self.name,
            self.repository.storage.kind(),
            STORAGES.load(Ordering::SeqCst),
            self.audit.as_ref().map(|audit| audit.kind()).unwrap_or("none")
        )
    }
}
impl Component for Service {
    fn manifest(manifest: &mut ComponentManifest<Self>) {
        manifest
            .constructor(
                Constructor::new(|args| {
                    Ok(Service {
                        name: args.next()?,
                        repository: args.next()?,
                        audit: None,
                    })
                })
                .param::<Arc<String>>("name")
                .param::<Arc<Repository>>("repository"),
            )
            .property(Property::new(
                "audit",
                |service: &mut Service, audit: Option<Lazy<dyn Storage>>| service.audit = audit,
            ));
    }
}
