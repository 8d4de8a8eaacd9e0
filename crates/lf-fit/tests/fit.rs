use std::collections::BTreeMap;

use lf_core::{Key, Table, linspace};
use lf_fit::{Fit, FitSettings, NelderMead, Residual, steady_state};
use lf_model::{Model, fns};
use lf_sim::{IntegratorSettings, Simulator, SteadyStateSettings};

/// k_in -> x1 -> x2 ->, with first order conversion and outflow.
fn linear_chain() -> Model {
    let mut m = Model::new();
    m.add_parameters([("k_in", 1.0), ("k1", 2.0), ("k2", 4.0)])
        .unwrap()
        .add_variables([("x1", 0.0), ("x2", 0.0)])
        .unwrap()
        .add_reaction("v0", fns::constant(), ["k_in"], [("x1", 1.0)])
        .unwrap()
        .add_reaction(
            "v1",
            fns::mass_action_1s(),
            ["x1", "k1"],
            [("x1", -1.0), ("x2", 1.0)],
        )
        .unwrap()
        .add_reaction("v2", fns::mass_action_1s(), ["x2", "k2"], [("x2", -1.0)])
        .unwrap();
    m
}

fn polished() -> FitSettings {
    FitSettings {
        steady_state: SteadyStateSettings {
            newton_polish: true,
            ..SteadyStateSettings::default()
        },
        ..FitSettings::default()
    }
}

fn rk4() -> FitSettings {
    FitSettings {
        integrator: IntegratorSettings::Rk4 { max_step: 0.01 },
        ..FitSettings::default()
    }
}

fn map(pairs: &[(&str, f64)]) -> BTreeMap<String, f64> {
    pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

fn time_course_data(columns: &[&str]) -> Table {
    let times = linspace(0.0, 2.0, 11);
    let mut sim = Simulator::with_integrator(linear_chain(), rk4().integrator.build()).unwrap();
    sim.simulate(&times).unwrap();
    let results = sim.get_results().unwrap();
    let mut data = Table::new(
        vec!["time".to_string()],
        columns.iter().map(|c| c.to_string()).collect(),
    );
    for (i, t) in times.iter().enumerate() {
        let row = columns.iter().map(|c| results.get(i, c).unwrap()).collect();
        data.push_row(vec![Key::from(*t)], row).unwrap();
    }
    data
}

#[test]
fn recovers_rate_constants_from_steady_state() {
    let data = map(&[("x1", 0.5), ("x2", 0.25)]);
    let fit = Fit::new(linear_chain).with_settings(polished());
    let best = fit.steady_state(&map(&[("k1", 1.0), ("k2", 1.0)]), &data).unwrap();
    assert!((best["k1"] - 2.0).abs() < 1e-2, "{best:?}");
    assert!((best["k2"] - 4.0).abs() < 1e-2, "{best:?}");
    assert!(fit.steady_state_residual(&best, &data) < 1e-3);
}

#[test]
fn partial_data_fits_the_identifiable_parameter() {
    let best = steady_state(
        || {
            let mut m = linear_chain();
            m.update_parameter("k2", 1.0).unwrap();
            m
        },
        &map(&[("k2", 1.0)]),
        &map(&[("x2", 0.25)]),
    )
    .unwrap();
    assert!((best["k2"] - 4.0).abs() < 1e-2, "{best:?}");
}

#[test]
fn fluxes_count_as_steady_state_data() {
    // v0 = k_in regardless of the other constants
    let fit = Fit::new(linear_chain).with_settings(polished());
    let best = fit
        .steady_state(&map(&[("k_in", 0.5)]), &map(&[("v2", 2.0)]))
        .unwrap();
    assert!((best["k_in"] - 2.0).abs() < 1e-2, "{best:?}");
}

#[test]
fn recovers_rate_constants_from_time_course() {
    let data = time_course_data(&["x1", "x2"]);
    let fit = Fit::new(linear_chain).with_settings(rk4());
    let p0 = map(&[("k1", 1.5), ("k2", 3.0)]);
    assert!(fit.time_course_residual(&p0, &data) > 1e-3);

    let best = fit.time_course(&p0, &data, &NelderMead::default()).unwrap();
    assert!((best["k1"] - 2.0).abs() < 1e-2, "{best:?}");
    assert!((best["k2"] - 4.0).abs() < 1e-2, "{best:?}");
}

#[test]
fn non_convergence_reports_nan_for_every_parameter() {
    let settings = FitSettings {
        nelder_mead: NelderMead {
            max_iters: 2,
            ..NelderMead::default()
        },
        ..polished()
    };
    let best = Fit::new(linear_chain)
        .with_settings(settings)
        .steady_state(&map(&[("k1", 1.0), ("k2", 1.0)]), &map(&[("x1", 0.5)]))
        .unwrap();
    assert_eq!(best.len(), 2);
    assert!(best.values().all(|v| v.is_nan()));
}

#[test]
fn custom_minimizer_and_residual_are_used() {
    fn keep_guess(_: &Residual<'_>, p0: &[f64]) -> Option<Vec<f64>> {
        Some(p0.to_vec())
    }
    let fit = Fit::new(linear_chain).with_settings(polished());
    let best = fit
        .steady_state_with(
            &map(&[("k1", 3.0)]),
            &map(&[("x1", 0.5)]),
            |_, _| 0.0,
            &keep_guess,
        )
        .unwrap();
    assert_eq!(best, map(&[("k1", 3.0)]));
}

#[test]
fn unknown_names_fail_before_any_simulation() {
    let fit = Fit::new(linear_chain);
    let err = fit
        .steady_state(&map(&[("nope", 1.0)]), &map(&[("x1", 0.5)]))
        .unwrap_err();
    assert!(err.is_definition());

    // variables are not fittable parameters
    let err = fit
        .steady_state(&map(&[("x1", 1.0)]), &map(&[("x1", 0.5)]))
        .unwrap_err();
    assert!(err.is_definition());

    let err = fit
        .steady_state(&map(&[("k1", 1.0)]), &map(&[("unknown", 0.5)]))
        .unwrap_err();
    assert!(err.is_definition());

    let data = time_course_data(&["x1"]);
    let err = fit
        .time_course(&BTreeMap::new(), &data, &NelderMead::default())
        .unwrap_err();
    assert!(!err.is_definition());
}
