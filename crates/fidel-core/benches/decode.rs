use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use fidel_core::candidates::{Candidate, CandidateSet};
use fidel_core::decoder::{decode, DecodeOptions, FeatureWeights};
use fidel_core::lm::{NgramModel, NgramScore};
use fidel_core::phrase::{Phrase, WordId};

const SENTENCE_LEN: u32 = 12;
const TARGET_BASE: WordId = 100;

/// Three options per word and two per adjacent pair, with targets drawn
/// from a small vocabulary so the language model has something to prefer.
fn bench_candidates() -> CandidateSet {
    let mut set = CandidateSet::new(2, 0);
    for w in 1..=SENTENCE_LEN {
        for k in 0..3 {
            let target = TARGET_BASE + (w * 3 + k) % 20;
            let features = vec![-0.1 * f64::from(k + 1), -0.3 - 0.05 * f64::from(w % 4)];
            set.insert(Phrase::from(vec![w]), Candidate::new(vec![target], features));
        }
    }
    for w in 1..SENTENCE_LEN {
        for k in 0..2 {
            let target = vec![TARGET_BASE + (w + k) % 20, TARGET_BASE + (w * 7 + k) % 20];
            let features = vec![-0.4 - 0.1 * f64::from(k), -0.2];
            set.insert(Phrase::from(vec![w, w + 1]), Candidate::new(target, features));
        }
    }
    set
}

fn bench_lm() -> NgramModel {
    let mut lm = NgramModel::new(3);
    for a in 0..20 {
        let id = TARGET_BASE + a;
        lm.insert(&[id], NgramScore::with_backoff(-1.0 - 0.05 * f64::from(a), -0.3));
        for b in 0..20 {
            if (a + b) % 3 == 0 {
                lm.insert(&[id, TARGET_BASE + b], NgramScore::with_backoff(-0.6, -0.1));
            }
        }
    }
    lm
}

fn bench_decode(c: &mut Criterion) {
    let set = bench_candidates();
    let lm = bench_lm();
    let weights = FeatureWeights::new(-100.0, -0.3, 0.5, -0.2, &[1.0, 0.5]);
    let source: Vec<WordId> = (1..=SENTENCE_LEN).collect();

    let mut group = c.benchmark_group("decode/beam");
    for beam_size in [1usize, 10, 50, 200] {
        let options = DecodeOptions {
            distortion_limit: 4,
            n_best: 1,
            beam_size,
            lazy: false,
            recombine: true,
            lm_floor: -99.0,
            cancel: None,
        };
        group.bench_with_input(BenchmarkId::from_parameter(beam_size), &options, |b, options| {
            b.iter(|| decode(&source, &set, &lm, &weights, options));
        });
    }
    group.finish();

    let mut group = c.benchmark_group("decode/lazy");
    for lazy in [false, true] {
        let options = DecodeOptions {
            distortion_limit: 4,
            n_best: 10,
            beam_size: 50,
            lazy,
            recombine: true,
            lm_floor: -99.0,
            cancel: None,
        };
        group.bench_with_input(BenchmarkId::from_parameter(lazy), &options, |b, options| {
            b.iter(|| decode(&source, &set, &lm, &weights, options));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_decode);
criterion_main!(benches);
