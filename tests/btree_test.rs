use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;

use tempfile::tempdir;

use btree_index::btree::BTree;
use btree_index::cache::CAPACITY;
use btree_index::error::Error;
use btree_index::node::{MAX_KEYS, T};

fn idx_path(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(name)
}

// ---------------------------------------------------------------------
// end-to-end scenarios (spec section 8, S1-S6)
// ---------------------------------------------------------------------

#[test]
fn s1_create_insert_search() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();

    let mut tree = BTree::open(&path).unwrap();
    tree.insert(5, 50).unwrap();
    let found = tree.search(5).unwrap();
    tree.close().unwrap();

    assert_eq!(found, Some(50));
}

#[test]
fn s2_print_in_key_order() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();

    let mut tree = BTree::open(&path).unwrap();
    for (k, v) in [(10, 1), (20, 2), (5, 3), (6, 4), (12, 5)] {
        tree.insert(k, v).unwrap();
    }

    let mut seen = Vec::new();
    tree.traverse(|k, v| seen.push((k, v))).unwrap();
    tree.close().unwrap();

    assert_eq!(seen, vec![(5, 3), (6, 4), (10, 1), (12, 5), (20, 2)]);
}

#[test]
fn s3_load_then_extract_round_trips() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");
    let csv_in = idx_path(&dir, "in.csv");
    let csv_out = idx_path(&dir, "out.csv");

    fs::write(&csv_in, "1,100\n2,200\n3,300\n").unwrap();

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();

    let mut tree = BTree::open(&path).unwrap();
    let inserted = btree_index::delimited::bulk_load(&mut tree, &csv_in).unwrap();
    assert_eq!(inserted, 3);
    btree_index::delimited::extract(&mut tree, &csv_out).unwrap();
    tree.close().unwrap();

    let contents = fs::read_to_string(&csv_out).unwrap();
    let mut got: Vec<(u64, u64)> = contents
        .lines()
        .map(|line| {
            let mut parts = line.split(',');
            let k: u64 = parts.next().unwrap().parse().unwrap();
            let v: u64 = parts.next().unwrap().parse().unwrap();
            (k, v)
        })
        .collect();
    got.sort();
    assert_eq!(got, vec![(1, 100), (2, 200), (3, 300)]);
}

#[test]
fn s4_twentieth_insert_splits_root_once() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();

    let mut tree = BTree::open(&path).unwrap();
    for key in 1..=20u64 {
        tree.insert(key, key * 10).unwrap();
    }

    // The 20th insert is the call that forces the split: the root (full
    // at 19 keys) splits first, promoting the median key 10, and only
    // then does key 20 itself descend into whichever child now owns
    // that range. So the left child keeps the pre-split count (T-1) and
    // the right child ends up with one extra key from the insert that
    // triggered the split.
    let root = tree.read_node(tree.root_block()).unwrap();
    assert_eq!(root.num_keys, 1);
    assert_eq!(root.keys[0], 10);

    let left = tree.read_node(root.children[0]).unwrap();
    let right = tree.read_node(root.children[1]).unwrap();
    assert_eq!(left.num_keys, T - 1);
    assert_eq!(right.num_keys, T);
    assert_eq!(left.num_keys + right.num_keys + root.num_keys, 20);

    tree.close().unwrap();
}

#[test]
fn s5_search_miss_reports_not_found() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();

    let mut tree = BTree::open(&path).unwrap();
    tree.insert(1, 1).unwrap();
    let found = tree.search(999).unwrap();
    tree.close().unwrap();

    assert_eq!(found, None);
}

#[test]
fn s6_create_over_existing_file_fails_without_modifying_it() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();

    let before = fs::read(&path).unwrap();
    let err = BTree::create(&path);
    assert!(matches!(err, Err(Error::Exists)));

    let after = fs::read(&path).unwrap();
    assert_eq!(before, after);
}

// ---------------------------------------------------------------------
// structural invariants (spec section 8, properties 1-8)
// ---------------------------------------------------------------------

#[test]
fn non_root_key_counts_stay_in_bounds() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();
    let mut tree = BTree::open(&path).unwrap();

    for key in 0..300u64 {
        tree.insert(key, key).unwrap();
    }

    assert_non_root_bounds(&mut tree, tree.root_block());
    tree.close().unwrap();
}

fn assert_non_root_bounds(tree: &mut BTree, block_id: u64) {
    let node = tree.read_node(block_id).unwrap();
    if block_id != tree.root_block() {
        assert!(node.num_keys >= T - 1, "node {} underflowed", block_id);
        assert!(node.num_keys <= MAX_KEYS, "node {} overflowed", block_id);
    }
    // keys strictly increasing
    for w in node.keys[..node.num_keys].windows(2) {
        assert!(w[0] < w[1], "keys not strictly increasing in node {}", block_id);
    }
    if !node.is_leaf() {
        // exactly num_keys+1 nonzero children, in the first num_keys+1 slots
        for i in 0..=node.num_keys {
            assert_ne!(node.children[i], 0, "missing child {} in node {}", i, block_id);
        }
        for i in (node.num_keys + 1)..node.children.len() {
            assert_eq!(node.children[i], 0, "stray child {} in node {}", i, block_id);
        }
        for i in 0..=node.num_keys {
            assert_non_root_bounds(tree, node.children[i]);
        }
    }
}

#[test]
fn cache_occupancy_never_exceeds_capacity_during_traversal() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();
    let mut tree = BTree::open(&path).unwrap();

    // Enough inserts to force a multi-level tree (root, internal, leaf).
    for key in 0..3000u64 {
        tree.insert(key, key).unwrap();
        assert!(tree.cache_len() <= CAPACITY, "cache grew past {}", CAPACITY);
    }

    assert_cache_bound_on_descent(&mut tree, tree.root_block());
    tree.close().unwrap();
}

fn assert_cache_bound_on_descent(tree: &mut BTree, block_id: u64) {
    let node = tree.read_node(block_id).unwrap();
    assert!(tree.cache_len() <= CAPACITY, "cache grew past {}", CAPACITY);
    if !node.is_leaf() {
        for i in 0..=node.num_keys {
            assert_cache_bound_on_descent(tree, node.children[i]);
        }
    }
}

#[test]
fn traversal_is_sorted_and_complete() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();
    let mut tree = BTree::open(&path).unwrap();

    let inserted: Vec<u64> = (0..250).map(|i| (i * 37) % 401).collect();
    let mut unique: HashSet<u64> = HashSet::new();
    for &k in &inserted {
        if unique.insert(k) {
            tree.insert(k, k + 1).unwrap();
        }
    }

    let mut seen = Vec::new();
    tree.traverse(|k, v| seen.push((k, v))).unwrap();
    tree.close().unwrap();

    let mut expected: Vec<u64> = unique.into_iter().collect();
    expected.sort();

    let seen_keys: Vec<u64> = seen.iter().map(|(k, _)| *k).collect();
    assert_eq!(seen_keys, expected);
    for (k, v) in seen {
        assert_eq!(v, k + 1);
    }
}

#[test]
fn duplicate_key_is_rejected() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();
    let mut tree = BTree::open(&path).unwrap();

    tree.insert(42, 1).unwrap();
    let err = tree.insert(42, 2);
    tree.close().unwrap();

    assert!(matches!(err, Err(Error::Duplicate)));
}

#[test]
fn next_block_matches_highest_allocated_block_reachable_from_root() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();
    let mut tree = BTree::open(&path).unwrap();

    for key in 0..200u64 {
        tree.insert(key, key).unwrap();
    }

    let mut max_seen = 0u64;
    collect_max_block(&mut tree, tree.root_block(), &mut max_seen);
    assert_eq!(tree.next_block(), max_seen + 1);
    tree.close().unwrap();
}

fn collect_max_block(tree: &mut BTree, block_id: u64, max_seen: &mut u64) {
    if block_id > *max_seen {
        *max_seen = block_id;
    }
    let node = tree.read_node(block_id).unwrap();
    if !node.is_leaf() {
        for i in 0..=node.num_keys {
            collect_max_block(tree, node.children[i], max_seen);
        }
    }
}

#[test]
fn close_and_reopen_preserves_search_and_traversal() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();

    {
        let mut tree = BTree::open(&path).unwrap();
        for key in 0..50u64 {
            tree.insert(key, key * 3).unwrap();
        }
        tree.close().unwrap();
    }

    let mut tree = BTree::open(&path).unwrap();
    let mut seen = Vec::new();
    tree.traverse(|k, v| seen.push((k, v))).unwrap();
    for key in 0..50u64 {
        assert_eq!(tree.search(key).unwrap(), Some(key * 3));
    }
    tree.close().unwrap();

    assert_eq!(seen.len(), 50);
    assert!(seen.windows(2).all(|w| w[0].0 < w[1].0));
}

#[test]
fn monotonic_insert_sequence_traverses_in_order() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();
    let mut tree = BTree::open(&path).unwrap();

    for key in 0..200u64 {
        tree.insert(key, key).unwrap();
    }

    let mut seen = Vec::new();
    tree.traverse(|k, _| seen.push(k)).unwrap();
    tree.close().unwrap();

    let expected: Vec<u64> = (0..200).collect();
    assert_eq!(seen, expected);
}

#[test]
fn corrupted_magic_fails_to_open() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();

    let mut bytes = fs::read(&path).unwrap();
    bytes[0] = b'X';
    fs::write(&path, &bytes).unwrap();

    let err = BTree::open(&path);
    assert!(matches!(err, Err(Error::Format(_))));
}

#[test]
fn opening_missing_file_reports_missing() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "does_not_exist.idx");

    let err = BTree::open(&path);
    assert!(matches!(err, Err(Error::Missing(_))));
}

#[test]
fn creating_over_existing_path_reports_exists() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();

    let err = BTree::create(&path);
    assert!(matches!(err, Err(Error::Exists)));
}

#[test]
fn bulk_load_skips_malformed_rows_without_aborting() {
    let dir = tempdir().unwrap();
    let path = idx_path(&dir, "idx");
    let csv_in = idx_path(&dir, "in.csv");

    fs::write(
        &csv_in,
        "1,100\nnotanumber,5\n2\n3,notanumber\n-1,9\n4,400\n",
    )
    .unwrap();

    let tree = BTree::create(&path).unwrap();
    tree.close().unwrap();
    let mut tree = BTree::open(&path).unwrap();

    let inserted = btree_index::delimited::bulk_load(&mut tree, &csv_in).unwrap();
    assert_eq!(inserted, 2);
    assert_eq!(tree.search(1).unwrap(), Some(100));
    assert_eq!(tree.search(4).unwrap(), Some(400));
    tree.close().unwrap();
}
