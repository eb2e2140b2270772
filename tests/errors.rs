use jab::{BoxError, Component, Harness, HookKind, JabError, Provider};
use std::time::Duration;

struct Thing;
impl Component for Thing {}

#[tokio::test]
async fn test_duplicate_provide_names_both_providers() {
    let mut harness = Harness::new();
    harness.provide(Provider::constructor(|_| Ok(Thing)).no_dependencies()).unwrap();

    let err = harness
        .provide(Provider::factory(|_| async { Ok::<_, BoxError>(Thing) }).no_dependencies())
        .unwrap_err();
    let message = err.to_string();
    assert!(message.starts_with("Cannot provide object factory Thing ("), "{message}");
    assert!(message.contains("under name \"Thing\""), "{message}");
    assert!(message.contains("Name is already taken by object constructor Thing ("), "{message}");
}

#[tokio::test]
async fn test_construction_failure_keeps_source() {
    let mut harness = Harness::new();
    harness
        .provide(Provider::constructor(|_| Err::<Thing, BoxError>("disk full".into())).no_dependencies())
        .unwrap();

    let err = harness.build().await.unwrap_err();
    assert_eq!(err.to_string(), "Constructing Thing failed: disk full");
    let source = std::error::Error::source(&err).map(ToString::to_string);
    assert_eq!(source.as_deref(), Some("disk full"));
}

#[test]
fn test_lifecycle_messages() {
    let invalid = JabError::InvalidLifecycleMethod {
        provider: "Server".into(),
        hook: HookKind::Run,
        reason: "run must be asynchronous",
    };
    assert_eq!(
        invalid.to_string(),
        "Server.run is not a valid lifecycle method: run must be asynchronous"
    );

    let timed_out = JabError::HookTimedOut {
        provider: "Pool".into(),
        hook: HookKind::OnStop,
        timeout: Duration::from_millis(250),
    };
    assert_eq!(timed_out.to_string(), "Pool.on_stop did not finish within 250ms");

    let ambiguous = JabError::AmbiguousReturnType {
        member: "Overloaded.names".into(),
        union: "Vec<String> | String".into(),
    };
    assert!(ambiguous.to_string().contains("Overloaded.names"));
}

#[test]
fn test_registration_messages() {
    assert_eq!(
        JabError::NoConstructor { provider: "Thing".into() }.to_string(),
        "Provided argument 'Thing' does not have a constructor function"
    );
    assert_eq!(
        JabError::NoAnnotation { provider: "Thing".into() }.to_string(),
        "Provided argument 'Thing' does not have a type-annotated constructor"
    );
    assert_eq!(
        JabError::UnknownConstructor { name: "Thing".into() }.to_string(),
        "Thing not registered with jab harness"
    );
}
