use proptest::prelude::*;
use reposhift::{ContentAddressedPacker, DiskPackContainer, PackStore};
use tempfile::TempDir;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn container_keys_are_positional_and_deduplicated(
        pool in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..256), 1..5),
        picks in proptest::collection::vec(0usize..5, 1..24),
        compress in any::<bool>(),
    ) {
        let streams: Vec<Vec<u8>> = picks.iter().map(|i| pool[i % pool.len()].clone()).collect();

        let temp = TempDir::new().unwrap();
        let mut container = DiskPackContainer::open(temp.path().join("container")).unwrap();
        container.init().unwrap();
        let keys = ContentAddressedPacker::new(&mut container).pack(&streams, compress).unwrap();

        prop_assert_eq!(keys.len(), streams.len());
        for (i, a) in streams.iter().enumerate() {
            prop_assert_eq!(&container.get_object_content(&keys[i]).unwrap(), a);
            for (j, b) in streams.iter().enumerate() {
                prop_assert_eq!(keys[i] == keys[j], a == b);
            }
        }

        let mut distinct = streams.clone();
        distinct.sort();
        distinct.dedup();
        prop_assert_eq!(container.count_objects().unwrap(), distinct.len() as u64);
    }
}
