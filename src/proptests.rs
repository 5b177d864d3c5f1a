use super::*;

use crate::array::{BlockList, BLOCK_SIZE, NO_BASE, NO_CODE, ROOT, ROOT_CHECK};
use crate::code_table::TERMINAL;
use proptest::prelude::*;
use proptest_derive::Arbitrary;
use std::collections::BTreeMap;

fn validate_trie(t: &DoubleArrayTrie) {
    let store = &t.store;
    let n = store.len();
    assert_eq!(n % BLOCK_SIZE, 0, "store must hold whole blocks");
    assert_eq!(store.slots[ROOT as usize].check, ROOT_CHECK, "root sentinel");

    let mut terminals = 0usize;
    for id in 1..n as u32 {
        let slot = store.slots[id as usize];
        if slot.is_free() {
            continue;
        }
        let parent = slot.check as u32;
        assert!((parent as usize) < n, "slot {id}: parent {parent} out of range");
        assert!(!store.is_free(parent), "slot {id}: parent {parent} is free");
        let base = store.slots[parent as usize].base;
        assert!(base >= 0, "slot {id}: parent {parent} has no base");
        let code = (base as u32 ^ id) as u16;
        assert!(code as usize <= 256, "slot {id}: code {code} out of range");
        if let Some((_, parent_code)) = t.parent_of(parent) {
            assert_ne!(parent_code, TERMINAL, "slot {id} hangs off a terminal");
        }

        let mut listed = Vec::new();
        let mut c = store.links[parent as usize].child;
        while c != NO_CODE {
            listed.push(c);
            c = store.links[(base as u32 ^ c as u32) as usize].sibling;
        }
        assert!(listed.contains(&code), "slot {id}: code {code} missing from parent's child list");

        if code == TERMINAL {
            terminals += 1;
            continue;
        }
        let first = store.links[id as usize].child;
        assert_ne!(first, NO_CODE, "inner slot {id} leads to no key");
    }
    assert_eq!(terminals, t.len(), "terminal count must match len");

    // Child lists are strictly ascending and every entry points back.
    for id in 0..n as u32 {
        if store.is_free(id) || t.parent_of(id).is_some_and(|(_, c)| c == TERMINAL) {
            continue;
        }
        let base = store.slots[id as usize].base;
        let mut c = store.links[id as usize].child;
        if c == NO_CODE {
            assert_eq!(base, NO_BASE, "childless slot {id} must have no base");
            continue;
        }
        let mut prev: Option<u16> = None;
        while c != NO_CODE {
            assert!(prev.map_or(true, |p| p < c), "children of {id} out of order");
            let child = base as u32 ^ c as u32;
            assert_eq!(store.slots[child as usize].check, id as i32, "child {child} of {id}");
            prev = Some(c);
            c = store.links[child as usize].sibling;
        }
    }

    // Free rings and block lists.
    let mut seen = vec![None; store.blocks.len()];
    for list in [BlockList::Full, BlockList::Closed, BlockList::Open] {
        for bi in store.list_members(list) {
            assert!(seen[bi as usize].is_none(), "block {bi} on two lists");
            seen[bi as usize] = Some(list);
        }
    }
    for (bi, block) in store.blocks.iter().enumerate() {
        let start = bi * BLOCK_SIZE;
        let free: Vec<u32> = (start..start + BLOCK_SIZE)
            .filter(|&e| store.slots[e].is_free())
            .map(|e| e as u32)
            .collect();
        assert_eq!(block.num as usize, free.len(), "block {bi} free count");
        assert_eq!(seen[bi], Some(store.expected_list(bi as u32)), "block {bi} list");
        if free.is_empty() {
            continue;
        }
        let mut ring = Vec::new();
        let mut e = block.ehead;
        loop {
            ring.push(e);
            let next = (-store.slots[e as usize].check) as u32;
            assert_eq!(-store.slots[next as usize].base, e as i32, "ring back-link at {next}");
            e = next;
            if e == block.ehead || ring.len() > BLOCK_SIZE {
                break;
            }
        }
        ring.sort_unstable();
        assert_eq!(ring, free, "block {bi} ring");
    }
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    // A narrow alphabet makes shared prefixes and sibling collisions common.
    prop::collection::vec(prop_oneof![Just(0u8), b'a'..=b'f', Just(0xff)], 0..=12)
}

#[derive(Clone, Debug, Arbitrary)]
enum Op {
    #[proptest(weight = 40)]
    Insert(#[proptest(strategy = "key_strategy()")] Vec<u8>, i32),
    #[proptest(weight = 20)]
    Remove(#[proptest(strategy = "key_strategy()")] Vec<u8>),
    #[proptest(weight = 20)]
    Get(#[proptest(strategy = "key_strategy()")] Vec<u8>),
    #[proptest(weight = 15)]
    Add(
        #[proptest(strategy = "key_strategy()")] Vec<u8>,
        #[proptest(strategy = "-100i32..100")] i32,
    ),
    #[proptest(weight = 1)]
    SaveLoad,
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        max_shrink_iters: 50_000,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence(ops in prop::collection::vec(any::<Op>(), 0..=1000)) {
        let mut t = DoubleArrayTrie::new();
        let mut m: BTreeMap<Vec<u8>, i32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(key, value) => {
                    let old_t = t.insert(&key, value).unwrap();
                    let old_m = m.insert(key, value);
                    prop_assert_eq!(old_t, old_m);
                }
                Op::Remove(key) => {
                    prop_assert_eq!(t.remove(&key), m.remove(key.as_slice()));
                }
                Op::Get(key) => {
                    prop_assert_eq!(t.get(&key), m.get(key.as_slice()).copied());
                }
                Op::Add(key, delta) => {
                    let slot = m.entry(key.clone()).or_insert(0);
                    *slot = slot.wrapping_add(delta);
                    prop_assert_eq!(t.add(&key, delta).unwrap(), *slot);
                }
                Op::SaveLoad => {
                    let buf = t.to_bytes();
                    t.load(&buf).unwrap();
                }
            }
            prop_assert_eq!(t.len(), m.len());
        }

        validate_trie(&t);
        let got: Vec<(Vec<u8>, i32)> = t.iter().collect();
        let expected: Vec<(Vec<u8>, i32)> = m.into_iter().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_prefix_queries(
        keys in prop::collection::btree_set(key_strategy(), 0..200),
        query in key_strategy(),
    ) {
        let mut t = DoubleArrayTrie::new();
        for (i, k) in keys.iter().enumerate() {
            t.insert(k, i as i32).unwrap();
        }

        let got: Vec<Vec<u8>> = t.common_prefix(&query).map(|(k, _)| k.to_vec()).collect();
        let expected: Vec<Vec<u8>> = (0..=query.len())
            .map(|i| query[..i].to_vec())
            .filter(|p| keys.contains(p))
            .collect();
        prop_assert_eq!(got, expected);

        let got: Vec<Vec<u8>> = t.predict(&query).map(|(k, _)| k).collect();
        let expected: Vec<Vec<u8>> = keys.iter().filter(|k| k.starts_with(&query)).cloned().collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_roundtrip_preserves_structure(keys in prop::collection::vec(key_strategy(), 0..300)) {
        let mut t = DoubleArrayTrie::new();
        for (i, k) in keys.iter().enumerate() {
            t.insert(k, i as i32).unwrap();
        }
        for k in keys.iter().step_by(3) {
            t.remove(k);
        }
        let u = DoubleArrayTrie::from_bytes(&t.to_bytes()).unwrap();
        validate_trie(&u);
        prop_assert_eq!(u.iter().collect::<Vec<_>>(), t.iter().collect::<Vec<_>>());
        prop_assert_eq!(u.num_nodes(), t.num_nodes());
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

fn small_keys() -> Vec<Vec<u8>> {
    vec![
        b"".to_vec(),
        b"a".to_vec(),
        b"b".to_vec(),
        b"aa".to_vec(),
        b"ab".to_vec(),
        b"ba".to_vec(),
        b"a\x00".to_vec(),
    ]
}

#[test]
fn exhaustive_insert_order_small_set() {
    for_each_permutation(&small_keys(), |perm| {
        let mut t = DoubleArrayTrie::new();
        let mut m: BTreeMap<Vec<u8>, i32> = BTreeMap::new();

        for (i, k) in perm.into_iter().enumerate() {
            let v = i as i32;
            assert_eq!(t.insert(&k, v).unwrap(), m.insert(k, v));
        }

        validate_trie(&t);
        let got: Vec<(Vec<u8>, i32)> = t.iter().collect();
        let expected: Vec<(Vec<u8>, i32)> = m.into_iter().collect();
        assert_eq!(got, expected);
    });
}

#[test]
fn exhaustive_remove_order_small_set() {
    let keys = small_keys();

    // Insert in a fixed order, then remove in all permutations.
    let mut base_trie = DoubleArrayTrie::new();
    let mut base_map: BTreeMap<Vec<u8>, i32> = BTreeMap::new();
    for (i, k) in keys.iter().enumerate() {
        let v = i as i32;
        assert_eq!(base_trie.insert(k, v).unwrap(), base_map.insert(k.clone(), v));
    }

    for_each_permutation(&keys, |perm| {
        let mut t = base_trie.clone();
        let mut m = base_map.clone();

        for k in perm {
            assert_eq!(t.remove(&k), m.remove(k.as_slice()));
            assert_eq!(t.len(), m.len());
            validate_trie(&t);
        }
        assert!(t.is_empty());
        assert_eq!(t.num_nodes(), 1);
    });
}

#[test]
fn dense_sibling_sets_relocate_cleanly() {
    // Every parent ends up with all 256 children plus a terminal, which forces
    // both relocation directions and full blocks.
    let mut t = DoubleArrayTrie::new();
    for a in [b'x', b'y', 0u8] {
        for b in (0..=u8::MAX).rev() {
            t.insert(&[a, b], (a as i32) << 8 | b as i32).unwrap();
        }
        t.insert(&[a], -1).unwrap();
        validate_trie(&t);
    }
    for a in [b'x', b'y', 0u8] {
        assert_eq!(t.get(&[a]), Some(-1));
        for b in 0..=u8::MAX {
            assert_eq!(t.get(&[a, b]), Some((a as i32) << 8 | b as i32));
        }
    }
    for b in 0..=u8::MAX {
        t.remove(&[b'y', b]);
    }
    validate_trie(&t);
    assert_eq!(t.len(), 2 * 257 + 1);
}

#[test]
fn handles_invalidate_on_structural_change_only() {
    let mut t = DoubleArrayTrie::new();
    t.insert(b"alpha", 1).unwrap();
    t.insert(b"alps", 2).unwrap();
    let h = t.get_node(b"alp").unwrap().detach();

    t.insert(b"alpha", 10).unwrap();
    t.add(b"alps", 5).unwrap();
    assert_eq!(t.attach(h).unwrap().find_nodes(b"").count(), 2);

    t.add(b"alpine", 1).unwrap();
    assert_eq!(t.attach(h), Err(Error::InvalidHandle));

    let h = t.get_node(b"alp").unwrap().detach();
    assert!(t.remove(b"missing").is_none());
    assert!(t.attach(h).is_ok());
    t.remove(b"alpine");
    assert_eq!(t.attach(h), Err(Error::InvalidHandle));
}
