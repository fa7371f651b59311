use warpwell_core::{SolverTolerance, State, TimeGrid};
use warpwell_mam::{
    action, BlockSchedule, Bounds, InstantonRefiner, LbfgsSettings, MemorySink, PathGuess,
    RefinementStatus,
};
use warpwell_models::{HOT_POINT, SADDLE_POINT};
use warpwell_sampler::relax;

#[test]
fn refinement_lowers_the_action_block_by_block() {
    let grid = TimeGrid::uniform(0.0, 0.1, 60).unwrap();
    let guess = PathGuess::linear(HOT_POINT, SADDLE_POINT, &grid).unwrap();
    let initial = action(&guess.trajectory().states, grid.as_slice(), 0.5);

    let mut refiner = InstantonRefiner::new(guess, 0.5, None, LbfgsSettings::default()).unwrap();
    let mut sink = MemorySink::new();
    let outcome = refiner.run(&BlockSchedule::new(5, 4), &mut sink).unwrap();

    assert!(outcome.action < initial);
    let values: Vec<f64> = sink.action_values.iter().map(|(_, a)| *a).collect();
    assert!(values.windows(2).all(|w| w[1] <= w[0]), "{values:?}");
    let nits: Vec<usize> = sink.action_values.iter().map(|(n, _)| *n).collect();
    assert!(nits.windows(2).all(|w| w[1] >= w[0]), "{nits:?}");
    assert!(outcome.nit > 0);

    let path = &outcome.instanton;
    assert_eq!(path.states[0], HOT_POINT);
    assert_eq!(path.states[path.len() - 1], SADDLE_POINT);
}

#[test]
fn small_problem_converges_before_budget() {
    let grid = TimeGrid::uniform(0.0, 0.5, 8).unwrap();
    let guess = PathGuess::linear(HOT_POINT, SADDLE_POINT, &grid).unwrap();
    let mut refiner = InstantonRefiner::new(guess, 0.3, None, LbfgsSettings::default()).unwrap();
    let mut sink = MemorySink::new();
    let outcome = refiner.run(&BlockSchedule::new(100, 50), &mut sink).unwrap();

    assert_eq!(outcome.status, RefinementStatus::Converged);
    assert!(outcome.blocks_run < 50);
    assert_eq!(sink.latest.unwrap().status, RefinementStatus::Converged);
}

#[test]
fn second_run_continues_where_the_first_stopped() {
    let grid = TimeGrid::uniform(0.0, 0.1, 40).unwrap();
    let guess = PathGuess::linear(HOT_POINT, SADDLE_POINT, &grid).unwrap();
    let mut refiner = InstantonRefiner::new(guess, 1.0, None, LbfgsSettings::default()).unwrap();
    let mut sink = MemorySink::new();

    let first = refiner.run(&BlockSchedule::new(3, 1), &mut sink).unwrap();
    let second = refiner.run(&BlockSchedule::new(3, 1), &mut sink).unwrap();
    assert!(second.nit > first.nit);
    assert!(second.action <= first.action);
    assert_eq!(sink.action_values.len(), 2);
}

#[test]
fn reversed_relaxation_seed_stays_inside_bounds() {
    let relaxation = relax(State::new(0.05, 0.05), 0.5, 10.0, 0.1, SolverTolerance::default()).unwrap();
    let grid = TimeGrid::uniform(0.0, 0.1, 50).unwrap();
    let guess = PathGuess::reversed_relaxation(&relaxation, &grid).unwrap();
    assert!(guess.start().distance(&HOT_POINT) < 0.1);

    let bounds = Bounds::new(State::new(-0.2, -0.5), State::new(1.2, 0.5)).unwrap();
    let mut refiner = InstantonRefiner::new(guess, 0.5, Some(bounds), LbfgsSettings::default()).unwrap();
    let outcome = refiner.run(&BlockSchedule::new(10, 2), &mut MemorySink::new()).unwrap();

    for s in &outcome.instanton.states[1..outcome.instanton.len() - 1] {
        assert!((-0.2..=1.2).contains(&s.x()) && (-0.5..=0.5).contains(&s.y()), "{s:?}");
    }
}
