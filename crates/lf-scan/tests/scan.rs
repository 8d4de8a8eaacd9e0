use lf_core::linspace;
use lf_model::{Function, Model, fns};
use lf_scan::{
    Agg, McaOptions, ParameterTable, Scan, ScanCache, ScanOptions, steady_state, time_course,
};
use lf_sim::{Protocol, SteadyStateSettings};

fn production_degradation() -> Model {
    let mut m = Model::new();
    m.add_parameters([("k_in", 2.0), ("k_out", 0.5)])
        .unwrap()
        .add_variable("x", 0.0)
        .unwrap()
        .add_reaction("v_in", fns::constant(), ["k_in"], [("x", 1.0)])
        .unwrap()
        .add_reaction("v_out", fns::mass_action_1s(), ["x", "k_out"], [("x", -1.0)])
        .unwrap();
    m
}

fn decay() -> Model {
    let mut m = Model::new();
    m.add_parameter("k", 1.0)
        .unwrap()
        .add_variable("x", 1.0)
        .unwrap()
        .add_reaction("v", fns::mass_action_1s(), ["x", "k"], [("x", -1.0)])
        .unwrap();
    m
}

/// dx/dt = p * x^2 blows up at t = 1 / (p * x0).
fn blow_up() -> Model {
    let mut m = Model::new();
    m.add_parameter("p", 0.0)
        .unwrap()
        .add_variable("x", 1.0)
        .unwrap()
        .add_reaction(
            "v",
            Function::new("p_x_squared", |a| a[0] * a[1] * a[1]),
            ["p", "x"],
            [("x", 1.0)],
        )
        .unwrap();
    m
}

fn quick_options() -> ScanOptions {
    ScanOptions {
        steady_state: SteadyStateSettings {
            max_rounds: 20,
            ..SteadyStateSettings::default()
        },
        ..ScanOptions::default()
    }
}

#[test]
fn steady_states_follow_input_order_with_nan_for_failures() {
    let parameters = ParameterTable::from_columns([("k_out", vec![0.5, 0.0, 2.0])]).unwrap();
    let result = Scan::new(production_degradation)
        .with_options(quick_options())
        .steady_state(&parameters)
        .unwrap();

    let x = result.concs().column("x").unwrap();
    assert!((x[0] - 4.0).abs() < 1e-4);
    assert!(x[1].is_nan());
    assert!((x[2] - 1.0).abs() < 1e-4);
    assert_eq!(result.failed_rows(), vec![1]);
    assert_eq!(result.concs().index_names(), &["k_out"]);
    assert_eq!(result.concs().index_level(0), vec![Some(0.5), Some(0.0), Some(2.0)]);
    assert_eq!(result.results().columns(), &["x", "v_in", "v_out"]);
}

#[test]
fn cartesian_scan_rows_match_combinations() {
    let parameters =
        ParameterTable::cartesian_product([("k_in", vec![1.0, 2.0]), ("k_out", vec![1.0, 2.0])]);
    let result = steady_state(production_degradation, &parameters).unwrap();
    let x = result.concs().column("x").unwrap();
    for (got, expected) in x.iter().zip([1.0, 0.5, 2.0, 1.0]) {
        assert!((got - expected).abs() < 1e-4);
    }
    assert_eq!(result.concs().index_names(), &["k_in", "k_out"]);
    let (concs, fluxes) = result.into_parts();
    assert_eq!(concs.n_rows(), 4);
    assert_eq!(fluxes.columns(), &["v_in", "v_out"]);
}

#[test]
fn unknown_scan_parameter_fails_fast() {
    let parameters = ParameterTable::from_columns([("nope", vec![1.0])]).unwrap();
    let err = steady_state(production_degradation, &parameters).unwrap_err();
    assert!(err.is_definition());
}

#[test]
fn time_courses_are_indexed_by_run_and_time() {
    let parameters = ParameterTable::from_columns([("k", vec![1.0, 2.0])]).unwrap();
    let result = time_course(decay, &parameters, &linspace(0.0, 1.0, 3)).unwrap();

    assert_eq!(result.concs().index_names(), &["n", "time"]);
    assert_eq!(result.concs().n_rows(), 6);
    assert_eq!(result.times(), &[0.0, 0.5, 1.0]);
    let x = result.concs().column("x").unwrap();
    assert!((x[5] - (-2.0f64).exp()).abs() < 1e-6);

    let by_name = result.get_by_name("x").unwrap();
    assert_eq!(by_name.columns(), &["0", "1"]);
    assert!((by_name.get(2, "0").unwrap() - (-1.0f64).exp()).abs() < 1e-6);

    let mean = result.get_agg_per_time(Agg::Mean);
    let expected = ((-1.0f64).exp() + (-2.0f64).exp()) / 2.0;
    assert!((mean.get(2, "x").unwrap() - expected).abs() < 1e-6);
    let std = result.get_agg_per_time(Agg::Std);
    assert_eq!(std.get(0, "x"), Some(0.0));

    let per_run = result.get_agg_per_run(Agg::Min);
    assert_eq!(per_run.n_rows(), 2);
}

#[test]
fn one_failing_time_course_yields_one_nan_run() {
    let parameters = ParameterTable::from_columns([("p", vec![0.0, 1.0, 0.1])]).unwrap();
    let result = time_course(blow_up, &parameters, &linspace(0.0, 2.0, 5)).unwrap();
    assert_eq!(result.failed_runs(), vec![1]);
    let x = result.concs().column("x").unwrap();
    assert!(x[..5].iter().all(|v| *v == 1.0));
    assert!(x[5..10].iter().all(|v| v.is_nan()));
    assert!(x[10..].iter().all(|v| v.is_finite()));
}

#[test]
fn protocol_scan_shares_one_grid() {
    let protocol = Protocol::new()
        .segment(1.0, [("k_in", 0.0)])
        .unwrap()
        .segment(2.0, [("k_in", 1.0)])
        .unwrap();
    let parameters = ParameterTable::from_columns([("k_out", vec![1.0, 2.0])]).unwrap();
    let options = ScanOptions {
        points_per_segment: 4,
        ..ScanOptions::default()
    };
    let result = Scan::new(production_degradation)
        .with_options(options)
        .time_course_over_protocol(&parameters, &protocol)
        .unwrap();

    let times = result.courses().times();
    assert_eq!(times.len(), 9);
    assert_eq!(times[4], 1.0);
    assert_eq!(times[8], 3.0);
    assert_eq!(result.concs().n_rows(), 18);
    assert!(result.courses().failed_runs().is_empty());
    // no production during the first segment
    let x = result.get_by_name("x").unwrap();
    assert_eq!(x.get(3, "1"), Some(0.0));
}

#[test]
fn cached_runs_are_reused() {
    let parameters = ParameterTable::from_columns([("k_out", vec![0.5, 1.0])]).unwrap();
    let mut scan = Scan::new(production_degradation).with_cache(ScanCache::new());
    let first = scan.steady_state(&parameters).unwrap();
    assert_eq!(scan.cache().unwrap().len(), 2);
    let second = scan.steady_state(&parameters).unwrap();
    assert_eq!(first, second);
    assert_eq!(scan.cache().unwrap().hits(), 2);

    // a different request misses
    scan.time_course(&parameters, &[0.0, 1.0]).unwrap();
    assert_eq!(scan.cache().unwrap().len(), 4);
}

#[test]
fn response_coefficients_of_production_degradation() {
    let options = ScanOptions {
        steady_state: SteadyStateSettings {
            newton_polish: true,
            ..SteadyStateSettings::default()
        },
        ..ScanOptions::default()
    };
    let mut scan = Scan::new(production_degradation).with_options(options);
    let (concs, fluxes) = scan
        .response_coefficients(&["k_in", "k_out"], &McaOptions::default())
        .unwrap();
    // x = k_in / k_out, v_out = k_in
    assert!((concs.get(0, "x").unwrap() - 1.0).abs() < 1e-4);
    assert!((concs.get(1, "x").unwrap() + 1.0).abs() < 1e-4);
    assert!((fluxes.get(0, "v_out").unwrap() - 1.0).abs() < 1e-4);
    assert!(fluxes.get(1, "v_out").unwrap().abs() < 1e-4);

    assert!(scan.response_coefficients(&["x"], &McaOptions::default()).is_err());
}
