use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use taxon_key_scorer::{
    AlgoOptions, Algorithm, EvaluateRequest, KeyScorer, Matrix, Selection, Taxon, Ternary, Trait, TraitKind,
};

/// 300 taxa × 60 traits: 40 binary, 10 continuous, 10 categorical.
fn build_matrix() -> Matrix {
    let mut rng = StdRng::seed_from_u64(2024);
    let states = ["forest", "meadow", "wetland", "urban", "coast"];

    let mut traits = Vec::new();
    for j in 0..40 {
        traits.push(Trait::new(&format!("B{j}"), &format!("Binary {j}"), TraitKind::Binary));
    }
    for j in 0..10 {
        let mut t = Trait::new(&format!("N{j}"), &format!("Numeric {j}"), TraitKind::Continuous);
        t.min_value = Some(0.0);
        t.max_value = Some(100.0);
        traits.push(t);
    }
    for j in 0..10 {
        let mut t = Trait::new(&format!("S{j}"), &format!("States {j}"), TraitKind::CategoricalMulti);
        t.allowed_states = states.iter().map(|s| s.to_string()).collect();
        traits.push(t);
    }

    let taxa = (0..300)
        .map(|i| {
            let mut taxon = Taxon::new(&format!("X{i:03}"), &format!("Taxon {i}"));
            for j in 0..40 {
                let state = match rng.gen_range(0..10) {
                    0 => Ternary::Unknown,
                    1..=4 => Ternary::No,
                    _ => Ternary::Yes,
                };
                taxon = taxon.with_binary(&format!("B{j}"), state);
            }
            for j in 0..10 {
                let lo: f64 = rng.gen_range(0.0..80.0);
                taxon = taxon.with_range(&format!("N{j}"), lo, lo + rng.gen_range(1.0..20.0));
            }
            for j in 0..10 {
                let a = states[rng.gen_range(0..states.len())];
                let b = states[rng.gen_range(0..states.len())];
                taxon = taxon.with_states(&format!("S{j}"), &[a, b]);
            }
            taxon
        })
        .collect();

    Matrix::new("bench", traits, taxa)
}

fn selection() -> Selection {
    Selection::new()
        .with_binary("B0", Ternary::Yes)
        .with_binary("B1", Ternary::No)
        .with_binary("B2", Ternary::Yes)
        .with_value("N0", 42.0)
        .with_states("S0", &["meadow"])
}

fn bench_evaluate_bayes(c: &mut Criterion) {
    let scorer = KeyScorer::new(build_matrix());
    let request = EvaluateRequest::new(selection());

    c.bench_function("evaluate_bayes_300x60", |b| {
        b.iter(|| scorer.evaluate(black_box(&request)));
    });
}

fn bench_evaluate_heuristic(c: &mut Criterion) {
    let scorer = KeyScorer::new(build_matrix());
    let request = EvaluateRequest::new(selection()).with_algo(Algorithm::Heuristic);

    c.bench_function("evaluate_heuristic_300x60", |b| {
        b.iter(|| scorer.evaluate(black_box(&request)));
    });
}

fn bench_scores_only(c: &mut Criterion) {
    let scorer = KeyScorer::new(build_matrix());
    let request = EvaluateRequest::new(selection()).with_options(AlgoOptions {
        want_info_gain: false,
        ..Default::default()
    });

    c.bench_function("evaluate_scores_only_300x60", |b| {
        b.iter(|| scorer.evaluate(black_box(&request)));
    });
}

criterion_group!(benches, bench_evaluate_bayes, bench_evaluate_heuristic, bench_scores_only);
criterion_main!(benches);
