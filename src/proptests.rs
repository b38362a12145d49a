use super::*;

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use proptest_derive::Arbitrary;

fn validate_map<V>(m: &ValueMap<V>) {
    assert_eq!(
        m.values.len(),
        m.registry.len(),
        "value store and key registry must have the same size"
    );

    for fingerprint in m.values.keys() {
        let key = m
            .registry
            .get(fingerprint)
            .expect("every stored fingerprint must have a registered key");
        assert_eq!(
            &m.fingerprint(key).unwrap(),
            fingerprint,
            "registered key must canonicalize to its own fingerprint"
        );
    }
}

/// Same key with every object's fields in reverse order.
fn reorder(key: &Key) -> Key {
    match key {
        Key::Array(items) => Key::Array(items.iter().map(reorder).collect()),
        Key::Object(fields) => Key::Object(
            fields
                .iter()
                .rev()
                .map(|(name, value)| (name.clone(), reorder(value)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn text_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z$]{0,6}",
        Just("1970-01-01T00:00:00.000Z".to_owned()),
        "\\PC{0,8}",
    ]
}

// Eighths have short exact decimal forms, so they survive a text round trip.
fn float_strategy() -> impl Strategy<Value = f64> {
    prop_oneof![
        (-8_000i64..8_000).prop_map(|i| i as f64 / 8.0),
        Just(-0.0),
    ]
}

// Instants stay within years 1..=9999 and have millisecond precision, so
// structural equality and fingerprint equality coincide.
#[derive(Clone, Debug, Arbitrary)]
enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    Float(#[proptest(strategy = "float_strategy()")] f64),
    Text(#[proptest(strategy = "text_strategy()")] String),
    Instant(#[proptest(strategy = "-62_135_596_800_000i64..253_402_300_799_999")] i64),
}

impl Scalar {
    fn into_key(self) -> Key {
        match self {
            Scalar::Null => Key::Null,
            Scalar::Bool(b) => Key::from(b),
            Scalar::Int(n) => Key::from(n),
            Scalar::Float(f) => Key::try_from(f).unwrap(),
            Scalar::Text(s) => Key::from(s),
            Scalar::Instant(ms) => Key::from(Utc.timestamp_millis_opt(ms).unwrap()),
        }
    }
}

fn field_name() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["", "a", "b", "ab", "$", "$$", "$date", "$$date", "$blob"])
        .prop_map(str::to_owned)
}

fn key_strategy() -> BoxedStrategy<Key> {
    any::<Scalar>()
        .prop_map(Scalar::into_key)
        .prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Key::Array),
                prop::collection::vec((field_name(), inner), 0..4)
                    .prop_map(|fields| Key::Object(fields.into_iter().collect())),
            ]
        })
        .boxed()
}

#[derive(Clone, Debug)]
enum Op {
    Set(Key, u64),
    Delete(Key),
    Get(Key),
    Clear,
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    // Draw keys from a small pool so overwrites and hits are common.
    prop::collection::vec(key_strategy(), 1..8).prop_flat_map(|pool| {
        let key = prop::sample::select(pool);
        let op = prop_oneof![
            50 => (key.clone(), any::<u64>()).prop_map(|(k, v)| Op::Set(k, v)),
            25 => key.clone().prop_map(|k| Op::Delete(reorder(&k))),
            24 => key.prop_map(|k| Op::Get(reorder(&k))),
            1 => Just(Op::Clear),
        ];
        prop::collection::vec(op, 0..=300)
    })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_with_model(ops in ops_strategy()) {
        let mut m: ValueMap<u64> = ValueMap::new();
        let mut model: Vec<(Key, u64)> = Vec::new();

        for op in ops {
            match op {
                Op::Set(key, value) => {
                    let old = m.insert(key.clone(), value).unwrap();
                    match model.iter().position(|(k, _)| *k == key) {
                        Some(i) => {
                            prop_assert_eq!(old, Some(model[i].1));
                            model[i] = (key, value);
                        }
                        None => {
                            prop_assert_eq!(old, None);
                            model.push((key, value));
                        }
                    }
                }
                Op::Delete(key) => {
                    let existed = m.delete(&key).unwrap();
                    let pos = model.iter().position(|(k, _)| *k == key);
                    prop_assert_eq!(existed, pos.is_some());
                    if let Some(i) = pos {
                        model.remove(i);
                    }
                }
                Op::Get(key) => {
                    let got = m.get(&key).unwrap().copied();
                    let expected = model.iter().find(|(k, _)| *k == key).map(|(_, v)| *v);
                    prop_assert_eq!(got, expected);
                    prop_assert_eq!(m.has(&key).unwrap(), expected.is_some());
                }
                Op::Clear => {
                    m.clear();
                    model.clear();
                }
            }

            prop_assert_eq!(m.len(), model.len());
        }

        validate_map(&m);
        let got: Vec<(Key, u64)> = m.entries().map(|(k, v)| (k.clone(), *v)).collect();
        prop_assert_eq!(got, model);
    }

    #[test]
    fn prop_fingerprint_equality_is_structural(a in key_strategy(), b in key_strategy()) {
        let fa = canonicalize(&a).unwrap();
        let fb = canonicalize(&b).unwrap();
        prop_assert_eq!(fa == fb, a == b);
        prop_assert_eq!(canonicalize(&reorder(&a)).unwrap(), fa);
    }

    #[test]
    fn prop_revive_restores_key(key in key_strategy()) {
        let c = Canonicalizer::new();
        let fingerprint = c.canonicalize(&key).unwrap();
        let revived = c.revive(fingerprint.as_str()).unwrap();
        prop_assert_eq!(&revived, &key);
        prop_assert_eq!(c.canonicalize(&revived).unwrap(), fingerprint);
    }
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

fn sample_keys() -> Vec<Key> {
    let epoch = Utc.timestamp_millis_opt(0).unwrap();
    vec![
        Key::from("a"),
        Key::array(["a"]),
        Key::object([("a", "a")]),
        Key::from(epoch),
        Key::from("1970-01-01T00:00:00.000Z"),
        Key::object([("$date", "1970-01-01T00:00:00.000Z")]),
    ]
}

#[test]
fn exhaustive_field_order() {
    let fields: Vec<(String, Key)> = vec![
        ("b".into(), Key::from(2)),
        ("a".into(), Key::from(1)),
        ("$date".into(), Key::from("x")),
        ("nested".into(), Key::object([("y", 1), ("x", 2)])),
        ("".into(), Key::Null),
    ];
    let baseline = canonicalize(&Key::Object(fields.iter().cloned().collect())).unwrap();

    let mut m: ValueMap<usize> = ValueMap::new();
    let mut last = Vec::new();
    let mut i = 0;
    for_each_permutation(&fields, |perm| {
        let key = Key::Object(perm.iter().cloned().collect());
        assert_eq!(canonicalize(&key).unwrap(), baseline);
        assert_eq!(m.insert(key, i).unwrap().is_some(), i > 0);
        last = perm.into_iter().map(|(name, _)| name).collect();
        i += 1;
    });

    validate_map(&m);
    assert_eq!(m.len(), 1);
    let stored: Vec<String> = m.keys().next().unwrap().as_object().unwrap().keys().cloned().collect();
    assert_eq!(stored, last, "latest original key must be kept");
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys = sample_keys();

    for_each_permutation(&keys, |perm| {
        let mut m: ValueMap<usize> = ValueMap::new();
        for (i, k) in perm.iter().enumerate() {
            assert_eq!(m.insert(k.clone(), i).unwrap(), None);
        }

        validate_map(&m);
        let got: Vec<Key> = m.keys().cloned().collect();
        assert_eq!(got, perm);
    });
}

#[test]
fn exhaustive_delete_order_small_set() {
    let keys = sample_keys();

    // Insert in a fixed order, then delete in all permutations.
    let mut base: ValueMap<usize> = ValueMap::new();
    for (i, k) in keys.iter().enumerate() {
        base.set(k.clone(), i).unwrap();
    }

    for_each_permutation(&keys, |perm| {
        let mut m = base.clone();
        let mut remaining = keys.clone();

        for k in perm {
            assert!(m.delete(&reorder(&k)).unwrap());
            remaining.retain(|r| *r != k);
            validate_map(&m);
            let got: Vec<Key> = m.keys().cloned().collect();
            assert_eq!(got, remaining);
        }
        assert!(m.is_empty());
        assert!(m.registry.is_empty());
    });
}
