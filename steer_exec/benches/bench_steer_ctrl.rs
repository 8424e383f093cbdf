//! # Steering Control Benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use steer_lib::{
    sim_plant::{Params as PlantParams, SimPlant},
    steer_ctrl::{CostMetric, Gains, Params, SteerCtrl, TuningParams},
};

fn steer_ctrl_benchmark(c: &mut Criterion) {
    // ---- Build the controller and plant ----

    let params = Params {
        initial_gains: Gains::new(0.2, 0.0001, 3.0),
        tuning: TuningParams {
            enabled: true,
            num_settle_steps: 10,
            num_eval_steps: 100,
            cost_metric: CostMetric::SquaredError,
            ..TuningParams::default()
        },
    };

    let mut steer_ctrl = SteerCtrl::new(params).unwrap();
    let mut plant = SimPlant::new(PlantParams::default());

    // ---- Benchmark a single tick ----

    c.bench_function("on_cte", |b| {
        b.iter(|| {
            let dem = steer_ctrl.on_cte(black_box(plant.cte()));
            plant.step(dem);
        })
    });
}

criterion_group!(benches, steer_ctrl_benchmark);
criterion_main!(benches);
