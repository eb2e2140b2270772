use jab::{
    Capability, Component, Harness, JabError, Logger, Provider, ProviderKind, Shape, Signature, TypeRef,
    DEFAULT_LOGGER,
};
use std::sync::Arc;

trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

impl Capability for dyn Clock {
    fn shape() -> Shape {
        Shape::new("Clock").method("now", Signature::new().returns(TypeRef::of::<u64>()))
    }
}

struct FixedClock;

impl Component for FixedClock {
    fn shape() -> Shape {
        Shape::of::<Self>().method("now", Signature::new().returns(TypeRef::of::<u64>()))
    }
}

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        1_700_000_000
    }
}

struct Scheduler {
    clock: Arc<dyn Clock>,
}

impl Component for Scheduler {}

async fn built() -> Harness {
    let mut harness = Harness::new();
    harness
        .provide(
            Provider::constructor(|deps| {
                deps.capability::<dyn Logger>("log")?.debug("scheduler ready");
                Ok(Scheduler {
                    clock: deps.capability("clock")?,
                })
            })
            .param("clock", TypeRef::capability::<dyn Clock>())
            .param("log", TypeRef::capability::<dyn Logger>())
            .on_stop(|_| async { Ok(()) }),
        )
        .unwrap()
        .provide(
            Provider::constructor(|_| Ok(FixedClock))
                .no_dependencies()
                .exposes::<dyn Clock>(|this| this),
        )
        .unwrap();
    harness.build().await.unwrap();
    harness
}

#[tokio::test]
async fn test_describe_in_registration_order() {
    let harness = built().await;
    let described = harness.describe().unwrap();

    let names: Vec<_> = described.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["Scheduler", "FixedClock"]);

    let scheduler = &described[0];
    assert_eq!(scheduler.provider.as_ref().map(|p| p.kind()), Some(ProviderKind::Constructor));
    assert_eq!(scheduler.dependencies.len(), 2);

    let clock = &scheduler.dependencies[0];
    assert_eq!(clock.parameter, "clock");
    assert_eq!(clock.required.to_string(), "Clock");
    assert_eq!(clock.provided.name, "FixedClock");

    let log = &scheduler.dependencies[1];
    assert_eq!(log.provided.name, DEFAULT_LOGGER);
    assert!(log.provided.provider.is_none());
}

#[tokio::test]
async fn test_described_instances_are_the_built_ones() {
    let harness = built().await;
    let scheduler = harness.describe_provider("Scheduler").unwrap();
    let clock = harness.describe_type::<FixedClock>().unwrap();

    assert!(scheduler.dependencies[0].provided.instance.same_instance(&clock.instance));
    let built = harness.environment().unwrap().resolve::<Scheduler>("Scheduler").unwrap();
    assert_eq!(built.clock.now(), 1_700_000_000);
}

#[tokio::test]
async fn test_unknown_names_and_types() {
    let harness = built().await;

    match harness.describe_provider("Nope") {
        Err(JabError::UnknownConstructor { name }) => assert_eq!(name, "Nope"),
        other => panic!("expected an unknown constructor, got {:?}", other.map(|p| p.name)),
    }
    assert!(matches!(harness.describe_type::<String>(), Err(JabError::UnknownConstructor { .. })));

    let mut unbuilt = Harness::new();
    assert!(unbuilt.describe().unwrap().is_empty());
    unbuilt.provide(Provider::constructor(|_| Ok(FixedClock)).no_dependencies()).unwrap();
    assert_eq!(
        unbuilt.describe().unwrap_err().to_string(),
        "FixedClock not registered with jab harness"
    );
}

#[tokio::test]
async fn test_snapshot_exports() {
    let harness = built().await;
    let snapshot = harness.snapshot().unwrap();

    let order: Vec<_> = snapshot.nodes.iter().map(|n| n.name.as_str()).collect();
    assert_eq!(order, ["FixedClock", DEFAULT_LOGGER, "Scheduler"]);
    assert_eq!(snapshot.nodes[1].kind, "default");
    assert_eq!(snapshot.nodes[2].hooks, ["on_stop"]);
    assert_eq!(snapshot.edges.len(), 2);

    let json: serde_json::Value = serde_json::from_str(&snapshot.to_json().unwrap()).unwrap();
    assert_eq!(json["edges"][0]["from"], "Scheduler");
    assert_eq!(json["edges"][0]["to"], "FixedClock");
    assert_eq!(json["edges"][0]["parameter"], "clock");

    let dot = snapshot.to_dot();
    assert!(dot.starts_with("digraph jab {"));
    assert!(dot.contains(r#""Scheduler" -> "FixedClock" [label="clock"];"#));
    assert!(dot.trim_end().ends_with('}'));

    assert!(Harness::new().snapshot().is_err());
}
