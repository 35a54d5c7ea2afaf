//! Generators for property tests over node trees.

use proptest::prelude::*;

use crate::model::{Date, Dictionary, Node, Value};

/// Scalars that survive both codecs exactly: finite or infinite reals,
/// dates on whole seconds, strings without control characters.
pub fn arb_scalar() -> impl Strategy<Value = Node> {
    prop_oneof![
        any::<bool>().prop_map(Node::from),
        any::<i64>().prop_map(Node::from),
        prop_oneof![
            -1.0e12f64..1.0e12f64,
            Just(f64::INFINITY),
            Just(f64::NEG_INFINITY),
        ]
        .prop_map(Node::from),
        "[a-zA-Z0-9 _.<>&'\"é😂-]{0,20}".prop_map(Node::from),
        (-2_000_000_000i64..2_000_000_000i64)
            .prop_map(|s| Node::from(Date::from_apple_seconds(s as f64))),
        prop::collection::vec(any::<u8>(), 0..40).prop_map(Node::from),
        any::<u64>().prop_map(|u| Node::new(Value::Uid(u))),
    ]
}

pub fn arb_node() -> impl Strategy<Value = Node> {
    arb_scalar().prop_recursive(4, 64, 8, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..8).prop_map(Node::from),
            prop::collection::vec(("[a-z]{1,6}", inner), 0..8)
                .prop_map(|entries| Node::from(entries.into_iter().collect::<Dictionary>())),
        ]
    })
}
