//! Tests for union_find module

use geosplit::UnionFind;

#[test]
fn test_basic_operations() {
    let mut uf = UnionFind::new(3);

    assert!(!uf.connected(0, 1));

    assert!(uf.union(0, 1));
    assert!(uf.connected(0, 1));
    assert!(!uf.connected(0, 2));
}

#[test]
fn test_union_already_joined() {
    let mut uf = UnionFind::new(2);
    assert!(uf.union(0, 1));
    assert!(!uf.union(1, 0));
}

#[test]
fn test_path_compression() {
    let mut uf = UnionFind::new(4);

    // Chain: 0 - 1 - 2 - 3
    uf.union(0, 1);
    uf.union(1, 2);
    uf.union(2, 3);

    let root = uf.find(0);
    assert_eq!(uf.find(1), root);
    assert_eq!(uf.find(2), root);
    assert_eq!(uf.find(3), root);
}

#[test]
fn test_components() {
    let mut uf = UnionFind::new(5);
    uf.union(3, 1);
    uf.union(4, 2);

    assert_eq!(uf.components(), vec![vec![0], vec![1, 3], vec![2, 4]]);
}

#[test]
fn test_components_deterministic() {
    // Same partition built with different union orders
    let orders: [&[(usize, usize)]; 3] = [
        &[(0, 1), (2, 3), (1, 3)],
        &[(3, 1), (2, 0), (0, 3)],
        &[(1, 2), (0, 3), (3, 2)],
    ];

    let results: Vec<_> = orders
        .iter()
        .map(|pairs| {
            let mut uf = UnionFind::new(6);
            for &(a, b) in pairs.iter() {
                uf.union(a, b);
            }
            uf.components()
        })
        .collect();

    for (i, result) in results.iter().enumerate() {
        assert_eq!(result, &results[0], "Different components for order {i}");
    }
    assert_eq!(results[0], vec![vec![0, 1, 2, 3], vec![4], vec![5]]);
}

#[test]
fn test_empty() {
    let mut uf = UnionFind::new(0);
    assert!(uf.is_empty());
    assert!(uf.components().is_empty());
}
