#![cfg(test)]

// Property tests for NodeStore kept inside the crate so they can reach the
// crate-private tree API directly.

use crate::node_store::{NodeStore, Upsert};
use crate::payload::{Kind, Payload};
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

type Thunk = Rc<dyn Fn() -> i64>;
type Log = Rc<RefCell<Vec<(String, i64)>>>;

#[derive(Clone, Debug)]
enum Op {
    Insert(usize, Kind, i64),
    Lookup(usize),
    Absent(String),
    Walk,
}

fn arb_kind() -> impl Strategy<Value = Kind> {
    prop_oneof![
        Just(Kind::Callable),
        Just(Kind::OwnedValue),
        Just(Kind::OwnedHandle),
        Just(Kind::UnmanagedValue),
    ]
}

// Identifiers come from a small pool so updates are frequent; `Absent`
// draws from a disjoint alphabet so it never hits.
fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-f]{1,4}", 1..=10).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), arb_kind(), any::<i64>()).prop_map(|(i, k, v)| Op::Insert(i, k, v)),
            2 => idx.clone().prop_map(Op::Lookup),
            1 => "[x-z]{1,3}".prop_map(Op::Absent),
            1 => Just(Op::Walk),
        ];
        proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
    })
}

fn payload(id: &str, kind: Kind, v: i64, log: &Log) -> Payload {
    let id = id.to_owned();
    let log = log.clone();
    match kind {
        Kind::Callable => {
            let f: Thunk = Rc::new(move || v);
            Payload::callable(f)
        }
        Kind::OwnedValue => Payload::owned_with(v, move |b| {
            let got = *b.downcast::<i64>().expect("boxed i64");
            log.borrow_mut().push((id, got));
        }),
        Kind::OwnedHandle => Payload::handle(v, move |slot| {
            log.borrow_mut().push((id, slot.get::<i64>()));
        }),
        Kind::UnmanagedValue => Payload::unmanaged(v),
    }
}

fn destructible(kind: Kind) -> bool {
    matches!(kind, Kind::OwnedValue | Kind::OwnedHandle)
}

// Property: state-machine equivalence of a single bucket tree against a
// BTreeMap model.
// Invariants exercised across random operation sequences:
// - One node per identifier; re-insert updates in place (same key).
// - Overwrite releases exactly the prior payload, with the prior
//   destructor, during the insert call.
// - Lookup reads back the most recent payload; misses are absent and
//   release nothing.
// - In-order walk equals the model's sorted key list.
// - Teardown releases every remaining destructible payload exactly once.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_single_bucket_state_machine((pool, ops) in arb_scenario()) {
        let log: Log = Rc::new(RefCell::new(Vec::new()));
        let mut store = NodeStore::new();
        let mut root = None;
        let mut model: BTreeMap<String, (Kind, i64)> = BTreeMap::new();
        let mut keys = BTreeMap::new();

        for op in ops {
            let released_before = log.borrow().len();
            match op {
                Op::Insert(i, kind, v) => {
                    let id = &pool[i];
                    let out = store.insert_or_update(&mut root, id, payload(id, kind, v, &log));
                    match (out, model.insert(id.clone(), (kind, v))) {
                        (Upsert::Created(key), None) => {
                            keys.insert(id.clone(), key);
                            prop_assert_eq!(log.borrow().len(), released_before);
                        }
                        (Upsert::Updated { key, prior }, Some((pk, pv))) => {
                            prop_assert_eq!(Some(&key), keys.get(id));
                            prop_assert_eq!(prior, pk);
                            if destructible(pk) {
                                prop_assert_eq!(log.borrow().len(), released_before + 1);
                                let last = log.borrow().last().cloned();
                                prop_assert_eq!(last, Some((id.clone(), pv)));
                            } else {
                                prop_assert_eq!(log.borrow().len(), released_before);
                            }
                        }
                        (out, prev) => {
                            prop_assert!(false, "store {:?} disagrees with model {:?}", out, prev);
                        }
                    }
                }
                Op::Lookup(i) => {
                    let id = &pool[i];
                    let found = store.lookup(root, id);
                    prop_assert_eq!(found.is_some(), model.contains_key(id));
                    if let (Some(key), Some(&(kind, v))) = (found, model.get(id)) {
                        let node = store.node(key).expect("found key resolves");
                        prop_assert_eq!(node.identifier(), id.as_str());
                        let view = node.payload().view();
                        prop_assert_eq!(node.payload().kind(), kind);
                        match kind {
                            Kind::Callable => {
                                let f = view.as_callable().and_then(|m| m.downcast_ref::<Thunk>());
                                prop_assert_eq!(f.map(|f| f()), Some(v));
                            }
                            Kind::OwnedValue => {
                                prop_assert_eq!(view.downcast::<i64>(), Some(&v));
                            }
                            Kind::OwnedHandle | Kind::UnmanagedValue => {
                                prop_assert_eq!(view.read::<i64>(), Some(v));
                            }
                        }
                    }
                    prop_assert_eq!(log.borrow().len(), released_before);
                }
                Op::Absent(id) => {
                    prop_assert!(store.lookup(root, &id).is_none());
                    prop_assert_eq!(log.borrow().len(), released_before);
                }
                Op::Walk => {
                    let walked: Vec<&str> = store.in_order(root).map(|(_, n)| n.identifier()).collect();
                    let expected: Vec<&str> = model.keys().map(String::as_str).collect();
                    prop_assert_eq!(walked, expected);
                }
            }
            prop_assert_eq!(store.len(), model.len());
        }

        let released_before = log.borrow().len();
        let expected: usize = model.values().filter(|(k, _)| destructible(*k)).count();
        prop_assert_eq!(store.teardown(&mut root), model.len());
        prop_assert_eq!(log.borrow().len(), released_before + expected);
        prop_assert_eq!(store.teardown(&mut root), 0);
        prop_assert_eq!(log.borrow().len(), released_before + expected);
        prop_assert_eq!(store.len(), 0);
    }
}
