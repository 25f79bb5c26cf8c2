use combo_game::{all_continuous_moves, rand_pieces_with, State, StateSet, NFA, RIGHT_I};
use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn bench_end_states(c: &mut Criterion) {
    let nfa = NFA::new(&all_continuous_moves());
    let initial: StateSet = [State::with_field(RIGHT_I)].into_iter().collect();
    let mut rng = StdRng::seed_from_u64(50);

    c.bench_function("end_states_50_pieces", |b| {
        b.iter_batched(
            || rand_pieces_with(&mut rng, 50),
            |pieces| nfa.end_states(&initial, &pieces),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_end_states);
criterion_main!(benches);
