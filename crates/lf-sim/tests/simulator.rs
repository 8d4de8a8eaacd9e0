use lf_core::linspace;
use lf_model::{Function, Model, ModelError, fns};
use lf_sim::{
    IntegrationFailure, Integrator, IntegratorSettings, Protocol, Rhs, Rk4, SimError, Simulator,
    SteadyStateSettings,
};

fn decay(k: f64, x0: f64) -> Model {
    let mut m = Model::new();
    m.add_parameter("k", k)
        .unwrap()
        .add_variable("x", x0)
        .unwrap()
        .add_reaction("v", fns::mass_action_1s(), ["x", "k"], [("x", -1.0)])
        .unwrap();
    m
}

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

fn times(result: &lf_sim::SimulationResult) -> Vec<f64> {
    result.time()
}

#[test]
fn exponential_decay_time_course() {
    let mut sim = Simulator::new(decay(0.5, 2.0)).unwrap();
    sim.simulate(&linspace(0.0, 10.0, 11)).unwrap();
    let result = sim.get_result().unwrap();
    assert!(!result.is_failure());
    assert_eq!(result.n_rows(), 11);
    let x = result.concs().column("x").unwrap();
    for (t, xi) in times(result).iter().zip(&x) {
        assert!((xi - 2.0 * (-0.5 * t).exp()).abs() < 1e-6);
    }
    // flux = k * x at every row
    let v = result.fluxes().column("v").unwrap();
    for (vi, xi) in v.iter().zip(&x) {
        assert!((vi - 0.5 * xi).abs() < 1e-12);
    }
}

#[test]
fn continuation_has_no_duplicate_rows() {
    let mut split = Simulator::new(decay(1.0, 1.0)).unwrap();
    split.simulate(&linspace(0.0, 5.0, 6)).unwrap();
    split.simulate(&linspace(5.0, 10.0, 6)).unwrap();

    let mut whole = Simulator::new(decay(1.0, 1.0)).unwrap();
    whole.simulate(&linspace(0.0, 10.0, 11)).unwrap();

    let t = times(split.get_result().unwrap());
    assert_eq!(t.len(), 11);
    assert!(t.windows(2).all(|w| w[1] > w[0]));
    let a = split.get_new_y0().unwrap()["x"];
    let b = whole.get_new_y0().unwrap()["x"];
    assert!((a - b).abs() < 1e-7);
}

#[test]
fn current_time_is_prepended() {
    let mut sim = Simulator::new(decay(1.0, 1.0)).unwrap();
    sim.simulate(&[1.0, 2.0]).unwrap();
    assert_eq!(times(sim.get_result().unwrap()), vec![0.0, 1.0, 2.0]);
    sim.simulate_until(4.0, 2).unwrap();
    assert_eq!(
        times(sim.get_result().unwrap()),
        vec![0.0, 1.0, 2.0, 3.0, 4.0]
    );
}

#[test]
fn going_back_in_time_is_rejected() {
    let mut sim = Simulator::new(decay(1.0, 1.0)).unwrap();
    sim.simulate(&[0.0, 2.0]).unwrap();
    assert!(matches!(
        sim.simulate(&[1.0, 3.0]),
        Err(SimError::InvalidArg { .. })
    ));
    assert!(sim.simulate(&[3.0, 3.0]).is_err());
}

#[test]
fn protocol_segments_are_contiguous() {
    let mut m = Model::new();
    m.add_parameter("k", 0.0)
        .unwrap()
        .add_variable("x", 0.0)
        .unwrap()
        .add_reaction("v", fns::constant(), ["k"], [("x", 1.0)])
        .unwrap();
    let protocol = Protocol::new()
        .segment(1.0, [("k", 1.0)])
        .unwrap()
        .segment(1.0, [("k", 0.0)])
        .unwrap()
        .segment(2.0, [("k", 2.0)])
        .unwrap();

    let mut sim = Simulator::new(m).unwrap();
    sim.simulate_protocol(&protocol, 4).unwrap();
    let result = sim.get_result().unwrap();

    let t = times(result);
    assert_eq!(t.len(), 13);
    assert!(t.windows(2).all(|w| w[1] > w[0]));
    assert_eq!(t[0], 0.0);
    assert_eq!(*t.last().unwrap(), 4.0);

    let segments = result.segments();
    assert_eq!(segments[0], Some(0));
    // The boundary row at t = 1 belongs to the second segment
    assert_eq!(t[4], 1.0);
    assert_eq!(segments[4], Some(1));
    assert_eq!(result.fluxes().get(4, "v"), Some(0.0));
    assert_eq!(segments[12], Some(2));

    let x = result.concs().column("x").unwrap();
    assert!((x[4] - 1.0).abs() < 1e-9);
    assert!((x[8] - 1.0).abs() < 1e-9);
    assert!((x[12] - 5.0).abs() < 1e-9);
}

#[test]
fn protocol_with_unknown_parameter_fails_fast() {
    let protocol = Protocol::new().segment(1.0, [("nope", 1.0)]).unwrap();
    let mut sim = Simulator::new(decay(1.0, 1.0)).unwrap();
    let err = sim.simulate_protocol(&protocol, 2).unwrap_err();
    assert!(matches!(err, SimError::Model(ModelError::Definition(_))));
    assert!(sim.get_result().is_none());
}

#[test]
fn integration_failure_is_captured() {
    let mut m = Model::new();
    m.add_variable("x", 1.0)
        .unwrap()
        .add_reaction(
            "explode",
            Function::new("square", |a| a[0] * a[0]),
            ["x"],
            [("x", 1.0)],
        )
        .unwrap();
    let mut sim = Simulator::new(m).unwrap();
    sim.simulate(&[0.0, 0.5, 2.0]).unwrap();
    let result = sim.get_result().unwrap();
    assert!(result.is_failure());
    assert_eq!(result.n_rows(), 2);
    // Further runs are skipped until the results are cleared
    sim.simulate(&[3.0]).unwrap();
    assert_eq!(sim.get_result().unwrap().n_rows(), 2);
    sim.clear_results();
    assert!(sim.get_result().is_none());
}

/// Rk4 up to `until`, afterwards fails without reporting any state.
#[derive(Debug)]
struct FailsLater {
    until: f64,
}

impl Integrator for FailsLater {
    fn integrate(
        &self,
        rhs: &Rhs<'_>,
        y0: &[f64],
        time_points: &[f64],
    ) -> Result<Vec<Vec<f64>>, IntegrationFailure> {
        if time_points[0] < self.until {
            return Rk4::default().integrate(rhs, y0, time_points);
        }
        Err(IntegrationFailure {
            time: time_points[0],
            reason: "gave up".to_string(),
            partial: Vec::new(),
        })
    }
}

#[test]
fn failure_without_states_keeps_recorded_rows() {
    let mut sim =
        Simulator::with_integrator(decay(1.0, 1.0), Box::new(FailsLater { until: 5.0 })).unwrap();
    sim.simulate(&linspace(0.0, 5.0, 6)).unwrap();
    sim.simulate(&linspace(5.0, 10.0, 6)).unwrap();
    let result = sim.get_result().unwrap();
    assert!(result.is_failure());
    assert_eq!(times(result), linspace(0.0, 5.0, 6));
}

#[test]
fn invalid_rk4_step_records_initial_state() {
    let mut sim =
        Simulator::with_integrator(decay(1.0, 2.0), Box::new(Rk4 { max_step: -1.0 })).unwrap();
    sim.simulate(&[0.0, 1.0]).unwrap();
    let result = sim.get_result().unwrap();
    assert!(result.is_failure());
    assert_eq!(result.n_rows(), 1);
    assert_eq!(result.concs().column("x").unwrap(), vec![2.0]);
}

#[test]
fn steady_state_of_production_degradation() {
    let mut sim = Simulator::new(production_degradation()).unwrap();
    sim.simulate_to_steady_state(&SteadyStateSettings::default())
        .unwrap();
    let result = sim.get_result().unwrap();
    assert!(!result.is_failure());
    assert_eq!(result.n_rows(), 1);
    assert!((result.final_concs()["x"] - 4.0).abs() < 1e-4);
}

#[test]
fn newton_polish_tightens_steady_state() {
    let mut sim = Simulator::new(production_degradation()).unwrap();
    let settings = SteadyStateSettings {
        newton_polish: true,
        ..SteadyStateSettings::default()
    };
    sim.simulate_to_steady_state(&settings).unwrap();
    let fluxes = sim.get_result().unwrap().final_fluxes();
    assert!((fluxes["v_in"] - fluxes["v_out"]).abs() < 1e-9);
}

#[test]
fn unbounded_growth_has_no_steady_state() {
    let mut m = Model::new();
    m.add_parameter("k", 1.0)
        .unwrap()
        .add_variable("x", 0.0)
        .unwrap()
        .add_reaction("v", fns::constant(), ["k"], [("x", 1.0)])
        .unwrap();
    let mut sim = Simulator::new(m).unwrap();
    let settings = SteadyStateSettings {
        max_rounds: 5,
        step_size: 1.0,
        ..SteadyStateSettings::default()
    };
    sim.simulate_to_steady_state(&settings).unwrap();
    assert!(sim.get_result().unwrap().is_failure());
}

#[test]
fn parameter_updates_apply_to_later_runs() {
    let mut sim = Simulator::new(production_degradation()).unwrap();
    assert!(sim.update_parameters([("k_in", 1.0), ("bogus", 1.0)]).is_err());
    sim.update_parameter("k_in", 1.0).unwrap();
    sim.scale_parameter("k_out", 2.0).unwrap();
    sim.simulate_to_steady_state(&SteadyStateSettings::default())
        .unwrap();
    assert!((sim.get_new_y0().unwrap()["x"] - 1.0).abs() < 1e-4);
}

#[test]
fn full_concs_include_derived_and_readouts() {
    let mut m = decay(1.0, 2.0);
    m.add_parameter("scale", 3.0)
        .unwrap()
        .add_derived("x_scaled", fns::proportional(), ["x", "scale"])
        .unwrap()
        .add_readout("half", Function::new("half", |a| a[0] / 2.0), ["x"])
        .unwrap();
    let mut sim = Simulator::new(m).unwrap();
    sim.simulate(&[0.0, 1.0]).unwrap();
    let full = sim.get_full_concs().unwrap();
    assert_eq!(full.columns(), &["x", "x_scaled", "half"]);
    assert_eq!(full.row(0), Some(&[2.0, 6.0, 1.0][..]));

    let results = sim.get_results().unwrap();
    assert_eq!(results.columns(), &["x", "x_scaled", "half", "v"]);
    let (concs, fluxes) = sim.get_result().unwrap().clone().into_parts();
    assert_eq!(concs.columns(), &["x"]);
    assert_eq!(fluxes.columns(), &["v"]);
}

#[test]
fn rk4_and_custom_initial_conditions() {
    let mut sim = Simulator::with_integrator(decay(1.0, 1.0), Box::new(Rk4 { max_step: 1e-3 }))
        .unwrap()
        .with_initial_conditions([("x", 4.0)])
        .unwrap();
    sim.simulate(&[0.0, 1.0]).unwrap();
    let x = sim.get_new_y0().unwrap()["x"];
    assert!((x - 4.0 * (-1.0f64).exp()).abs() < 1e-9);

    assert!(
        Simulator::new(decay(1.0, 1.0))
            .unwrap()
            .with_initial_conditions([("y", 1.0)])
            .is_err()
    );
}

#[test]
fn integrator_settings_build_working_integrators() {
    for settings in [
        IntegratorSettings::default(),
        IntegratorSettings::Rk4 { max_step: 0.01 },
    ] {
        let mut sim = Simulator::with_integrator(decay(1.0, 1.0), settings.build()).unwrap();
        sim.simulate(&[0.0, 1.0]).unwrap();
        let x = sim.get_new_y0().unwrap()["x"];
        assert!((x - (-1.0f64).exp()).abs() < 1e-6);
    }
}
