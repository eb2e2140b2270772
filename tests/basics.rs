use jab::{
    BoxError, Capability, Component, Dependencies, Harness, JabError, Logger, Provider, Shape, Signature,
    TypeRef, DEFAULT_LOGGER,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

trait NumberProvider: Send + Sync {
    fn provide_number(&self) -> i64;
}

impl Capability for dyn NumberProvider {
    fn shape() -> Shape {
        Shape::new("NumberProvider").method("provide_number", Signature::new().returns(TypeRef::of::<i64>()))
    }
}

struct Seven;

impl Component for Seven {
    fn shape() -> Shape {
        Shape::of::<Self>().method("provide_number", Signature::new().returns(TypeRef::of::<i64>()))
    }
}

impl NumberProvider for Seven {
    fn provide_number(&self) -> i64 {
        7
    }
}

struct Doubler {
    value: i64,
}

impl Component for Doubler {}

fn seven() -> jab::ProviderBuilder<Seven> {
    Provider::constructor(|_| Ok(Seven))
        .no_dependencies()
        .exposes::<dyn NumberProvider>(|this| this)
}

fn doubler() -> jab::ProviderBuilder<Doubler> {
    Provider::constructor(|deps| {
        let n = deps.capability::<dyn NumberProvider>("n")?;
        Ok(Doubler { value: n.provide_number() * 2 })
    })
    .param("n", TypeRef::capability::<dyn NumberProvider>())
}

#[tokio::test]
async fn test_capability_dependency() {
    let mut harness = Harness::new();
    harness.provide(doubler()).unwrap().provide(seven()).unwrap();
    harness.build().await.unwrap();

    let doubled = harness.environment().unwrap().resolve::<Doubler>("Doubler").unwrap();
    assert_eq!(doubled.value, 14);
}

#[tokio::test]
async fn test_factory_is_awaited_before_dependents() {
    struct Slow(u32);
    impl Component for Slow {}

    struct AfterSlow(u32);
    impl Component for AfterSlow {}

    let mut harness = Harness::new();
    harness
        .provide(
            Provider::constructor(|deps| Ok(AfterSlow(deps.get::<Slow>("slow")?.0 + 1)))
                .param("slow", TypeRef::component::<Slow>()),
        )
        .unwrap()
        .provide(
            Provider::factory(|_| async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Ok::<_, BoxError>(Slow(41))
            })
            .no_dependencies(),
        )
        .unwrap();
    harness.build().await.unwrap();

    let after = harness.environment().unwrap().resolve::<AfterSlow>("AfterSlow").unwrap();
    assert_eq!(after.0, 42);
}

#[tokio::test]
async fn test_composition_copies_providers() {
    let mut numbers = Harness::new();
    numbers.provide(seven()).unwrap();

    let mut harness = Harness::new();
    harness.provide(&numbers).unwrap().provide(doubler()).unwrap();
    assert_eq!(harness.registry().len(), 2);
    harness.build().await.unwrap();
    assert!(harness.environment().unwrap().contains("Seven"));

    // Names stay unique across composed harnesses.
    let mut twice = Harness::new();
    twice.provide(&numbers).unwrap();
    assert!(matches!(twice.provide(&numbers), Err(JabError::DuplicateProvide { .. })));

    // A bare registry composes the same way.
    let mut from_registry = Harness::new();
    from_registry.provide(numbers.registry()).unwrap().provide(doubler()).unwrap();
    from_registry.build().await.unwrap();
    let seven = from_registry.environment().unwrap().get("Seven").unwrap().clone();
    let original = numbers.registry().get("Seven").unwrap();
    assert!(from_registry.registry().get("Seven").unwrap().ptr_eq(original));
    assert_eq!(from_registry.environment().unwrap().resolve::<Doubler>("Doubler").unwrap().value, 14);
    assert_eq!(seven.name(), "Seven");
}

#[tokio::test]
async fn test_duplicate_provide_in_either_order() {
    let constructor = || Provider::constructor(|_| Ok(Seven)).no_dependencies();
    let factory = || Provider::factory(|_| async { Ok::<_, BoxError>(Seven) }).no_dependencies();

    let mut first = Harness::new();
    first.provide(constructor()).unwrap();
    assert!(matches!(
        first.provide(factory()),
        Err(JabError::DuplicateProvide { ref name, .. }) if name == "Seven"
    ));

    let mut second = Harness::new();
    second.provide(factory()).unwrap();
    assert!(matches!(
        second.provide(constructor()),
        Err(JabError::DuplicateProvide { ref name, .. }) if name == "Seven"
    ));
}

#[tokio::test]
async fn test_missing_dependency_names_parameter() {
    let mut harness = Harness::new();
    harness.provide(doubler()).unwrap();

    let err = harness.build().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Can't build dependencies for Doubler. Missing suitable argument for parameter n [NumberProvider]"
    );
}

#[tokio::test]
async fn test_structural_match_without_view_is_missing() {
    let mut harness = Harness::new();
    harness
        .provide(doubler())
        .unwrap()
        .provide(Provider::constructor(|_| Ok(Seven)).no_dependencies())
        .unwrap();

    assert!(matches!(
        harness.build().await,
        Err(JabError::MissingDependency { ref parameter, .. }) if parameter == "n"
    ));
}

#[tokio::test]
async fn test_default_logger_injected() {
    struct Chatty {
        log: Arc<dyn Logger>,
    }
    impl Component for Chatty {}

    let mut harness = Harness::new();
    harness
        .provide(
            Provider::constructor(|deps| Ok(Chatty { log: deps.capability::<dyn Logger>("log")? }))
                .param("log", TypeRef::capability::<dyn Logger>()),
        )
        .unwrap();
    harness.build().await.unwrap();

    let env = harness.environment().unwrap();
    assert_eq!(env.order(), [DEFAULT_LOGGER, "Chatty"]);
    env.resolve::<Chatty>("Chatty").unwrap().log.info("constructed");
    assert!(harness.graph().unwrap().uses_default_logger());
}

#[tokio::test]
async fn test_provided_logger_preferred_over_default() {
    struct Quiet(AtomicUsize);
    impl Component for Quiet {
        fn shape() -> Shape {
            <dyn Logger as Capability>::shape()
        }
    }
    impl Logger for Quiet {
        fn debug(&self, _: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn info(&self, _: &str) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn warning(&self, _: &str) {}
        fn error(&self, _: &str) {}
        fn critical(&self, _: &str) {}
    }

    struct User;
    impl Component for User {}

    let mut harness = Harness::new();
    harness
        .provide(
            Provider::constructor(|deps| {
                deps.capability::<dyn Logger>("log")?.info("hello");
                Ok(User)
            })
            .param("log", TypeRef::capability::<dyn Logger>()),
        )
        .unwrap()
        .provide(
            Provider::constructor(|_| Ok(Quiet(AtomicUsize::new(0))))
                .no_dependencies()
                .exposes::<dyn Logger>(|this| this),
        )
        .unwrap();
    harness.build().await.unwrap();

    let env = harness.environment().unwrap();
    assert!(!env.contains(DEFAULT_LOGGER));
    assert_eq!(env.resolve::<Quiet>("Quiet").unwrap().0.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_registration_errors() {
    let mut harness = Harness::new();

    let no_ctor = harness.provide(jab::ProviderBuilder::<Seven>::new().no_dependencies());
    assert!(matches!(no_ctor, Err(JabError::NoConstructor { .. })));

    let no_annotation = harness.provide(Provider::constructor(|_| Ok(Seven)));
    assert!(matches!(no_annotation, Err(JabError::NoAnnotation { .. })));

    assert!(harness.registry().is_empty());
}

#[tokio::test]
async fn test_each_provider_constructed_once() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();

    struct Shared;
    impl Component for Shared {}
    struct A;
    impl Component for A {}
    struct B;
    impl Component for B {}

    let mut harness = Harness::new();
    harness
        .provide(Provider::constructor(|_: &Dependencies| Ok(A)).param("s", TypeRef::component::<Shared>()))
        .unwrap()
        .provide(Provider::constructor(|_: &Dependencies| Ok(B)).param("s", TypeRef::component::<Shared>()))
        .unwrap()
        .provide(
            Provider::constructor(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Shared)
            })
            .no_dependencies(),
        )
        .unwrap();
    harness.build().await.unwrap();

    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert_eq!(harness.environment().unwrap().order(), ["Shared", "A", "B"]);
}
