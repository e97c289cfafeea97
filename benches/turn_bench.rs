use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::time::Duration;

use starlane::config::ServerConfig;
use starlane::content::GameRules;
use starlane::empire::Empire;
use starlane::resolve::{update_resource_pools, SupplyManager};
use starlane::server::{BuiltinScriptHost, GameState, TurnOrchestrator};
use starlane::universe::{generate_universe, update_empire_object_visibilities, EmpireId};

const EMPIRES: i32 = 6;

fn generated_state(systems: usize) -> GameState {
    let mut config = ServerConfig::default();
    config.galaxy_systems = systems;
    config.seed = 11;
    let mut state = GameState::new(GameRules::default(), config);
    for i in 1..=EMPIRES {
        let empire = Empire::with_rules(EmpireId(i), &format!("E{}", i), &format!("p{}", i), &state.rules);
        state.empires.insert(empire);
    }
    let setup = state.galaxy_setup();
    state.universe = generate_universe(&setup, &mut state.empires, &state.rules).unwrap();
    state
}

fn bench_generate(c: &mut Criterion) {
    let rules = GameRules::default();
    let state = generated_state(60);
    let setup = state.galaxy_setup();
    c.bench_function("generate_60_systems", |b| {
        b.iter(|| {
            let mut empires = state.empires.clone();
            generate_universe(black_box(&setup), &mut empires, &rules).unwrap()
        })
    });
}

fn bench_visibility(c: &mut Criterion) {
    let mut state = generated_state(60);
    c.bench_function("visibility_60_systems", |b| {
        b.iter(|| update_empire_object_visibilities(black_box(&mut state.universe), &state.empires))
    });
}

fn bench_supply(c: &mut Criterion) {
    let state = generated_state(60);
    c.bench_function("supply_60_systems", |b| {
        b.iter(|| {
            let mut supply = SupplyManager::new();
            supply.update_unobstructed_systems(&state.universe, &state.empires, true);
            supply.update(black_box(&state.universe), &state.empires);
            supply
        })
    });
}

fn bench_resource_pools(c: &mut Criterion) {
    let mut group = c.benchmark_group("resource_pools");
    let mut state = generated_state(60);
    state.supply.update_unobstructed_systems(&state.universe, &state.empires, true);
    state.supply.update(&state.universe, &state.empires);
    for threads in [1, 4] {
        group.bench_function(format!("threads_{}", threads), |b| {
            b.iter(|| update_resource_pools(&state.universe, &mut state.empires, &state.supply, &state.rules, threads))
        });
    }
    group.finish();
}

fn bench_full_turn(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_turn");
    group.sample_size(20);
    group.measurement_time(Duration::from_secs(10));
    let base = generated_state(60);
    group.bench_function("empty_orders_60_systems", |b| {
        b.iter(|| {
            let mut state = base.clone();
            let mut turn = TurnOrchestrator::new();
            let mut script = BuiltinScriptHost::new();
            turn.begin_turn_sequence(&state.empires);
            turn.process_turn(black_box(&mut state), &mut script, &mut |_| {})
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_generate,
    bench_visibility,
    bench_supply,
    bench_resource_pools,
    bench_full_turn
);
criterion_main!(benches);
