use std::collections::HashMap;

use chaindiskmap::hash::{djb, fnv1a};
use chaindiskmap::{ChainHashMap, ChainMapError, ResizeConfig};
use proptest::prelude::*;

#[derive(Debug, Clone)]
enum Op {
    Put(Vec<u8>, Vec<u8>),
    Change(Vec<u8>, Vec<u8>),
    Remove(Vec<u8>),
}

fn key() -> impl Strategy<Value = Vec<u8>> {
    // a small alphabet so operations hit the same keys often
    prop::collection::vec(0u8..4, 1..4)
}

fn value() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..48)
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (key(), value()).prop_map(|(k, v)| Op::Put(k, v)),
        (key(), value()).prop_map(|(k, v)| Op::Change(k, v)),
        key().prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn prop_behaves_like_a_map(ops in prop::collection::vec(op(), 1..300), size in 1usize..16) {
        let mut map = ChainHashMap::new(size, djb).unwrap();
        let mut model: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

        for op in ops {
            match op {
                Op::Put(k, v) => {
                    let res = map.put(&k, &v);
                    if model.contains_key(&k) {
                        prop_assert!(matches!(res, Err(ChainMapError::DuplicateKey)));
                    } else {
                        prop_assert!(res.is_ok());
                        model.insert(k, v);
                    }
                }
                Op::Change(k, v) => {
                    let res = map.change(&k, &v);
                    match model.get_mut(&k) {
                        Some(old) => {
                            prop_assert!(res.is_ok());
                            *old = v;
                        }
                        None => prop_assert!(matches!(res, Err(ChainMapError::NotFound))),
                    }
                }
                Op::Remove(k) => {
                    let res = map.remove(&k);
                    match model.remove(&k) {
                        Some(_) => prop_assert!(res.is_ok()),
                        None => prop_assert!(matches!(res, Err(ChainMapError::NotFound))),
                    }
                }
            }
            prop_assert_eq!(map.len(), model.len());
        }

        for (k, v) in &model {
            prop_assert_eq!(map.get(k).unwrap(), v.as_slice());
        }

        // and the same after a save/load cycle
        let loaded = ChainHashMap::from_bytes(&map.to_bytes().unwrap(), djb).unwrap();
        let back: HashMap<Vec<u8>, Vec<u8>> =
            loaded.iter().map(|(k, v)| (k.to_vec(), v.to_vec())).collect();
        prop_assert_eq!(back, model);
    }

    #[test]
    fn prop_resize_is_transparent(
        keys in prop::collection::hash_set(prop::collection::vec(any::<u8>(), 1..16), 1..200),
    ) {
        let roomy = ResizeConfig { load_factor_threshold: 1e9, max_chain_depth: usize::MAX, ..Default::default() };
        let mut fixed = ChainHashMap::with_config(1, fnv1a, roomy).unwrap();
        let mut growing = ChainHashMap::new(1, fnv1a).unwrap();

        for k in &keys {
            fixed.put(k, k).unwrap();
            growing.put(k, k).unwrap();
        }
        prop_assert_eq!(fixed.size(), 1);
        prop_assert!(growing.size() > 1);

        for k in &keys {
            prop_assert_eq!(fixed.get(k).unwrap(), growing.get(k).unwrap());
        }
    }

    #[test]
    fn prop_flipped_bucket_offsets_are_rejected(
        keys in prop::collection::hash_set(prop::collection::vec(any::<u8>(), 1..16), 1..64),
        slot in any::<prop::sample::Index>(),
        byte in 0usize..8,
        flip in 1u8..=255,
    ) {
        let mut map = ChainHashMap::new(3, djb).unwrap();
        for k in &keys {
            map.put(k, b"value").unwrap();
        }
        let mut image = map.to_bytes().unwrap();
        // 16 byte file header, 48 byte table record, then the slots
        let pos = 16 + 48 + slot.index(map.size()) * 8 + byte;
        image[pos] ^= flip;

        let res = ChainHashMap::from_bytes(&image, djb);
        prop_assert!(matches!(res, Err(ChainMapError::CorruptData(_))), "{:?}", res.map(|m| m.len()));
    }
}
