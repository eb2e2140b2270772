use jab::{Component, Dependencies, Harness, Provider, Shape, Signature, TypeRef};
use proptest::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

struct Node(usize);

impl Component for Node {}

fn node_shape(i: usize) -> Shape {
    Shape::new(format!("Node{i}")).method(format!("node_{i}"), Signature::new())
}

/// Random DAG: node `i` may depend on any node `j < i`, registered in a
/// shuffled order.
fn dag() -> impl Strategy<Value = (Vec<Vec<bool>>, Vec<usize>)> {
    (1usize..8).prop_flat_map(|n| {
        (
            prop::collection::vec(prop::collection::vec(any::<bool>(), n), n),
            Just((0..n).collect::<Vec<_>>()).prop_shuffle(),
        )
    })
}

fn depends(matrix: &[Vec<bool>], i: usize) -> Vec<usize> {
    (0..i).filter(|&j| matrix[i][j]).collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_every_dag_builds_dependencies_first((matrix, registration) in dag()) {
        let constructed = Arc::new(AtomicUsize::new(0));
        let mut harness = Harness::new();

        for &i in &registration {
            let counter = constructed.clone();
            let mut builder = Provider::constructor(move |_: &Dependencies| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Node(i))
            })
            .named(format!("node{i}"))
            .with_shape(node_shape(i))
            .no_dependencies();
            for j in depends(&matrix, i) {
                builder = builder.param(format!("dep{j}"), TypeRef::structural(node_shape(j)));
            }
            harness.provide(builder).unwrap();
        }

        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        runtime.block_on(harness.build()).unwrap();

        let n = registration.len();
        prop_assert_eq!(constructed.load(Ordering::SeqCst), n);

        let env = harness.environment().unwrap();
        let order = env.order();
        prop_assert_eq!(order.len(), n);
        let position = |i: usize| order.iter().position(|name| *name == format!("node{i}")).unwrap();

        for i in 0..n {
            prop_assert_eq!(env.resolve::<Node>(&format!("node{i}")).unwrap().0, i);
            for j in depends(&matrix, i) {
                prop_assert!(position(j) < position(i), "node{} built before its dependency node{}", i, j);
            }
        }

        let graph = harness.graph().unwrap();
        for i in 0..n {
            let targets: Vec<_> = graph.dependencies(&format!("node{i}")).iter().map(|e| e.target.clone()).collect();
            let expected: Vec<_> = depends(&matrix, i).into_iter().map(|j| format!("node{j}")).collect();
            prop_assert_eq!(targets, expected);
        }
    }
}
