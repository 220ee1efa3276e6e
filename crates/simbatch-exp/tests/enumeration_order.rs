use proptest::prelude::*;
use serde_json::{json, Value};
use simbatch_core::BatchError;
use simbatch_exp::ParameterSpace;

#[test]
fn last_declared_axis_varies_fastest() {
    let mut space = ParameterSpace::new();
    space.add_axis("A", [1, 2]).expect("axis A");
    space.add_axis("B", ["x", "y"]).expect("axis B");
    let points: Vec<Value> = space
        .enumerate()
        .map(|point| serde_json::to_value(&point).expect("json"))
        .collect();
    assert_eq!(
        points,
        vec![
            json!({"A": 1, "B": "x"}),
            json!({"A": 1, "B": "y"}),
            json!({"A": 2, "B": "x"}),
            json!({"A": 2, "B": "y"}),
        ]
    );
}

#[test]
fn point_keys_follow_declaration_order() {
    let mut space = ParameterSpace::new();
    space.add_axis("zeta", [0]).expect("zeta");
    space.add_fixed("alpha", "fixed").expect("alpha");
    let point = space.enumerate().next().expect("point");
    assert_eq!(point.names().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
    assert_eq!(point.get("alpha"), Some(&json!("fixed")));
}

#[test]
fn duplicate_axis_is_rejected() {
    let mut space = ParameterSpace::new();
    space.add_axis("mtu", [1024, 4096]).expect("mtu");
    let err = space.add_axis("mtu", [9000]).unwrap_err();
    assert!(matches!(err, BatchError::AxisNameConflict(_)));
    assert_eq!(space.axis("mtu").expect("axis").values(), &[json!(1024), json!(4096)]);
}

#[test]
fn empty_axis_is_rejected() {
    let mut space = ParameterSpace::new();
    let err = space.add_axis("parity", Vec::<i64>::new()).unwrap_err();
    assert!(matches!(err, BatchError::InvalidAxis(_)));
    assert_eq!(space.size(), 0);
}

#[test]
fn values_pass_through_unchanged() {
    let mut space = ParameterSpace::new();
    space
        .add_axis("mixed", vec![json!(1), json!(1.0), json!("1"), json!([1]), json!(null)])
        .expect("axis");
    let values: Vec<Value> = space
        .enumerate()
        .map(|point| point.get("mixed").cloned().expect("value"))
        .collect();
    assert_eq!(values, vec![json!(1), json!(1.0), json!("1"), json!([1]), json!(null)]);
}

fn build_space(lengths: &[usize]) -> ParameterSpace {
    let mut space = ParameterSpace::new();
    for (idx, len) in lengths.iter().enumerate() {
        space
            .add_axis(format!("axis{idx}"), (0..*len).map(|v| v as u64))
            .expect("axis");
    }
    space
}

proptest! {
    #[test]
    fn size_matches_product_and_enumeration_length(lengths in prop::collection::vec(1usize..5, 0..5)) {
        let space = build_space(&lengths);
        let expected = if lengths.is_empty() { 0 } else { lengths.iter().product() };
        prop_assert_eq!(space.size(), expected);
        prop_assert_eq!(space.enumerate().len(), expected);
        prop_assert_eq!(space.enumerate().count(), expected);
    }

    #[test]
    fn enumeration_is_restartable(lengths in prop::collection::vec(1usize..4, 1..4)) {
        let space = build_space(&lengths);
        let first: Vec<_> = space.enumerate().collect();
        let second: Vec<_> = space.enumerate().collect();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn enumeration_matches_nested_loops(lengths in prop::collection::vec(1usize..4, 1..4)) {
        let space = build_space(&lengths);
        let mut expected: Vec<Vec<u64>> = vec![Vec::new()];
        for len in &lengths {
            expected = expected
                .into_iter()
                .flat_map(|prefix| (0..*len as u64).map(move |v| {
                    let mut next = prefix.clone();
                    next.push(v);
                    next
                }))
                .collect();
        }
        let actual: Vec<Vec<u64>> = space
            .enumerate()
            .map(|point| point.iter().map(|(_, v)| v.as_u64().expect("u64")).collect())
            .collect();
        prop_assert_eq!(actual, expected);
    }
}
