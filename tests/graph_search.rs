//! Search behavior: orientation, acceptance filtering, resume, recall.

use std::collections::HashSet;
use std::f32::consts::PI;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use proxima::graph::search;
use proxima::{
    Bits, DenseVectorStore, FixedBitSet, GraphBuilder, GraphBuilderConfig, GraphSearcher,
    NodeScore, VectorSimilarity, VectorStore,
};

/// Vectors evenly spaced on the upper unit semicircle; ordinal 0 sits at
/// (1, 0) and similarity to (1, 0) decreases with the ordinal.
fn semicircle_store(n: usize) -> DenseVectorStore {
    let vectors: Vec<Vec<f32>> = (0..n)
        .map(|i| {
            let a = PI * i as f32 / n as f32;
            vec![a.cos(), a.sin()]
        })
        .collect();
    DenseVectorStore::from_vectors(&vectors).unwrap()
}

fn build(
    store: &DenseVectorStore,
    similarity: VectorSimilarity,
    config: GraphBuilderConfig,
) -> proxima::OnHeapGraph {
    GraphBuilder::new(store, similarity, config)
        .unwrap()
        .build()
        .unwrap()
}

fn brute_force(
    query: &[f32],
    store: &DenseVectorStore,
    similarity: VectorSimilarity,
    k: usize,
) -> Vec<NodeScore> {
    let mut all: Vec<NodeScore> = (0..store.len() as u32)
        .map(|i| NodeScore::new(i, similarity.compare(query, &store.vector(i))))
        .collect();
    all.sort_by(|a, b| b.cmp(a));
    all.truncate(k);
    all
}

#[test]
fn circular_corpus_returns_the_ten_lowest_ordinals() {
    let store = semicircle_store(100);
    let graph = build(
        &store,
        VectorSimilarity::Euclidean,
        GraphBuilderConfig {
            max_degree: 32,
            beam_width: 100,
            alpha: 1.0,
            neighbor_overflow: 1.0,
        },
    );

    let result = search(
        &[1.0, 0.0],
        10,
        &store,
        VectorSimilarity::Euclidean,
        &graph,
        Bits::All,
    )
    .unwrap();

    let mut nodes: Vec<u32> = result.nodes.iter().map(|ns| ns.node).collect();
    nodes.sort_unstable();
    assert_eq!(nodes, (0..10).collect::<Vec<u32>>());
}

/// Skip the half of the corpus closest to the query; the traversal must
/// route through skipped nodes and return the best accepted ones.
#[test]
fn skewed_accept_ords_reach_the_far_half() {
    let n = 1000;
    let store = semicircle_store(n);
    let graph = build(
        &store,
        VectorSimilarity::Euclidean,
        GraphBuilderConfig {
            max_degree: 32,
            beam_width: 100,
            alpha: 1.0,
            neighbor_overflow: 1.0,
        },
    );

    let mut accept = FixedBitSet::new(n);
    for i in 500..n {
        accept.set(i);
    }
    let result = search(
        &[1.0, 0.0],
        10,
        &store,
        VectorSimilarity::Euclidean,
        &graph,
        Bits::Set(accept.clone()),
    )
    .unwrap();

    assert_eq!(result.nodes.len(), 10);
    let mut sum = 0usize;
    for ns in &result.nodes {
        assert!(accept.get(ns.node as usize), "returned a skipped node {}", ns.node);
        sum += ns.node as usize;
    }
    // The best accepted ordinals are 500..510: sum(500..510) = 5045.
    assert!(sum < 5100, "sum of result ordinals = {sum}");
}

#[test]
fn selective_accept_ords_finds_every_accepted_node() {
    let n = 100;
    let store = semicircle_store(n);
    let graph = build(
        &store,
        VectorSimilarity::DotProduct,
        GraphBuilderConfig {
            max_degree: 32,
            beam_width: 100,
            alpha: 1.0,
            neighbor_overflow: 1.0,
        },
    );

    let mut accept = FixedBitSet::new(n);
    for i in (0..n).step_by(17) {
        accept.set(i);
    }
    let expected = accept.cardinality();

    let result = search(
        &[1.0, 0.0],
        expected,
        &store,
        VectorSimilarity::DotProduct,
        &graph,
        Bits::Set(accept.clone()),
    )
    .unwrap();

    assert_eq!(result.nodes.len(), expected);
    for ns in &result.nodes {
        assert!(accept.get(ns.node as usize));
    }
}

#[test]
fn empty_accept_ords_returns_nothing() {
    let store = semicircle_store(50);
    let graph = build(&store, VectorSimilarity::Euclidean, GraphBuilderConfig::default());

    let result = search(
        &[1.0, 0.0],
        10,
        &store,
        VectorSimilarity::Euclidean,
        &graph,
        Bits::Set(FixedBitSet::new(50)),
    )
    .unwrap();
    assert!(result.nodes.is_empty());
}

#[test]
fn top_k_larger_than_graph_returns_all_nodes_sorted() {
    let store = semicircle_store(20);
    let graph = build(&store, VectorSimilarity::Euclidean, GraphBuilderConfig::default());

    let result = search(
        &[1.0, 0.0],
        100,
        &store,
        VectorSimilarity::Euclidean,
        &graph,
        Bits::All,
    )
    .unwrap();

    assert_eq!(result.nodes.len(), 20);
    for pair in result.nodes.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
    let distinct: HashSet<u32> = result.nodes.iter().map(|ns| ns.node).collect();
    assert_eq!(distinct.len(), 20);
}

#[test]
fn single_node_graph_returns_that_node() {
    let store = DenseVectorStore::from_vectors(&[vec![0.0, 1.0]]).unwrap();
    let graph = build(&store, VectorSimilarity::DotProduct, GraphBuilderConfig::default());

    let result = search(
        &[0.0, 1.0],
        5,
        &store,
        VectorSimilarity::DotProduct,
        &graph,
        Bits::All,
    )
    .unwrap();
    assert_eq!(result.nodes.len(), 1);
    assert_eq!(result.nodes[0].node, 0);
}

/// A corpus whose centroid is the zero vector must not trip the cosine path.
#[test]
fn zero_centroid_corpus_under_cosine() {
    let store = DenseVectorStore::from_vectors(&[vec![-1.0, -1.0], vec![1.0, 1.0]]).unwrap();
    let graph = build(&store, VectorSimilarity::Cosine, GraphBuilderConfig::default());

    let result = search(
        &[0.5, 0.5],
        1,
        &store,
        VectorSimilarity::Cosine,
        &graph,
        Bits::All,
    )
    .unwrap();
    assert_eq!(result.nodes[0].node, 1);
}

#[test]
fn query_dimension_mismatch_is_an_error() {
    let store = semicircle_store(10);
    let graph = build(&store, VectorSimilarity::Euclidean, GraphBuilderConfig::default());

    let result = search(
        &[1.0, 0.0, 0.0],
        5,
        &store,
        VectorSimilarity::Euclidean,
        &graph,
        Bits::All,
    );
    assert!(matches!(result, Err(proxima::IndexError::DimensionMismatch { .. })));
}

/// `search(k)` then `resume(k')` must behave like `search(k + k')`: same
/// visited work, same results as a set.
#[test]
fn resume_matches_one_shot_search()
{
    let mut rng = StdRng::seed_from_u64(42);
    let vectors: Vec<Vec<f32>> = (0..1000)
        .map(|_| vec![rng.random::<f32>(), rng.random::<f32>()])
        .collect();
    let store = DenseVectorStore::from_vectors(&vectors).unwrap();
    let graph = build(
        &store,
        VectorSimilarity::Euclidean,
        GraphBuilderConfig {
            max_degree: 20,
            beam_width: 30,
            alpha: 1.4,
            neighbor_overflow: 1.0,
        },
    );

    let query = vec![rng.random::<f32>(), rng.random::<f32>()];
    let initial_k = 10;
    let resume_k = 15;

    let mut searcher = GraphSearcher::new(&graph);
    let initial = searcher
        .search(
            |i| VectorSimilarity::Euclidean.compare(&query, &store.vector(i)),
            initial_k,
            Bits::All,
        )
        .unwrap();
    assert_eq!(initial.nodes.len(), initial_k);

    let resumed = searcher.resume(resume_k).unwrap();
    assert_eq!(resumed.nodes.len(), resume_k);

    let mut one_shot_searcher = GraphSearcher::new(&graph);
    let one_shot = one_shot_searcher
        .search(
            |i| VectorSimilarity::Euclidean.compare(&query, &store.vector(i)),
            initial_k + resume_k,
            Bits::All,
        )
        .unwrap();

    assert_eq!(
        one_shot.visited_count,
        initial.visited_count + resumed.visited_count,
        "visited counts must be additive"
    );

    let mut combined: Vec<NodeScore> = initial.nodes.iter().chain(&resumed.nodes).copied().collect();
    combined.sort_by(|a, b| b.cmp(a));
    assert_eq!(combined.len(), one_shot.nodes.len());
    for (a, b) in combined.iter().zip(&one_shot.nodes) {
        assert!((a.score - b.score).abs() < 1e-6, "{} vs {}", a.score, b.score);
    }
}

/// Extra seeds join the entry point in the initial frontier; on a connected
/// graph they change where the walk starts, not what it finds.
#[test]
fn seeded_search_agrees_with_unseeded() {
    let store = semicircle_store(200);
    let graph = build(
        &store,
        VectorSimilarity::Euclidean,
        GraphBuilderConfig {
            max_degree: 16,
            beam_width: 60,
            alpha: 1.2,
            neighbor_overflow: 1.2,
        },
    );
    let query = [1.0f32, 0.0];
    let score = |i: u32| VectorSimilarity::Euclidean.compare(&query, &store.vector(i));

    let mut plain = GraphSearcher::new(&graph);
    let unseeded = plain.search(score, 10, Bits::All).unwrap();

    let mut seeded = GraphSearcher::new(&graph);
    let with_seeds = seeded
        .search_with_seeds(score, 10, Bits::All, &[199, 150])
        .unwrap();

    let a: Vec<u32> = unseeded.nodes.iter().map(|ns| ns.node).collect();
    let b: Vec<u32> = with_seeds.nodes.iter().map(|ns| ns.node).collect();
    assert_eq!(a, b);
}

#[test]
fn resume_before_search_is_an_error() {
    let store = semicircle_store(10);
    let graph = build(&store, VectorSimilarity::Euclidean, GraphBuilderConfig::default());
    let mut searcher: GraphSearcher<'_, proxima::OnHeapGraph> = GraphSearcher::new(&graph);
    assert!(searcher.resume(5).is_err());
}

/// Random corpora at assorted sizes and dimensions: macro-average recall
/// against brute force stays above 0.9.
#[test]
fn random_corpora_recall_beats_090() {
    let mut rng = StdRng::seed_from_u64(0xfeed);
    let mut total_recall = 0.0f64;
    let mut queries_run = 0usize;

    for _ in 0..10 {
        let n = rng.random_range(100..=150);
        let dim = rng.random_range(2..=15);
        let vectors: Vec<Vec<f32>> = (0..n)
            .map(|_| (0..dim).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect())
            .collect();
        let store = DenseVectorStore::from_vectors(&vectors).unwrap();
        let graph = build(
            &store,
            VectorSimilarity::Euclidean,
            GraphBuilderConfig {
                max_degree: 16,
                beam_width: 100,
                alpha: 1.2,
                neighbor_overflow: 1.2,
            },
        );

        for _ in 0..10 {
            let query: Vec<f32> = (0..dim).map(|_| rng.random::<f32>() * 2.0 - 1.0).collect();
            // ef = 100 expansion, then the top 5.
            let result = search(
                &query,
                100,
                &store,
                VectorSimilarity::Euclidean,
                &graph,
                Bits::All,
            )
            .unwrap();
            let approx: HashSet<u32> = result.nodes.iter().take(5).map(|ns| ns.node).collect();
            let exact: HashSet<u32> = brute_force(&query, &store, VectorSimilarity::Euclidean, 5)
                .iter()
                .map(|ns| ns.node)
                .collect();
            total_recall += approx.intersection(&exact).count() as f64 / 5.0;
            queries_run += 1;
        }
    }

    let macro_recall = total_recall / queries_run as f64;
    assert!(macro_recall > 0.9, "macro-average recall = {macro_recall}");
}
