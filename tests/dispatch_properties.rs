//! Randomized feasibility and determinism checks for the planner.

mod common;

use rand::{Rng, SeedableRng, rngs::StdRng};

use vpp_dispatch::dispatch::{DispatchPlanner, ThresholdPolicy, Window};
use vpp_dispatch::series::ForecastSeries;
use vpp_dispatch::storage::StorageAsset;
use vpp_dispatch::tariff::{TariffSchedule, TouTariff};

use common::{assert_feasible, start};

const CASES: u64 = 200;

fn random_storage(rng: &mut StdRng) -> StorageAsset {
    let capacity = rng.random_range(1.0..5_000.0);
    StorageAsset::new(
        capacity,
        rng.random_range(0.5..2_000.0),
        rng.random_range(0.5..2_000.0),
        rng.random_range(0.5..=1.0),
        rng.random_range(0.0..=capacity),
    )
}

fn random_series(rng: &mut StdRng) -> ForecastSeries {
    let step_minutes = [15, 30, 60][rng.random_range(0..3)];
    let steps = rng.random_range(1..200);
    let base = rng.random_range(0.0..3_000.0);
    let loads = (0..steps)
        .map(|_| base + rng.random_range(-500.0..1_500.0))
        .collect();
    ForecastSeries::from_loads(start(), step_minutes, loads).expect("valid series")
}

fn random_policy(rng: &mut StdRng) -> ThresholdPolicy {
    if rng.random_bool(0.5) {
        let fill = rng.random_range(0.0..50.0);
        ThresholdPolicy::Percentile {
            shave_percentile: rng.random_range(fill + 1.0..=100.0),
            fill_percentile: fill,
            window: if rng.random_bool(0.5) {
                Window::Day
            } else {
                Window::Horizon
            },
        }
    } else {
        let fill = rng.random_range(0.0..3_000.0);
        ThresholdPolicy::Fixed {
            shave_kw: fill + rng.random_range(0.0..1_500.0),
            fill_kw: fill,
        }
    }
}

#[test]
fn plans_stay_within_physical_limits() {
    let tariff: TariffSchedule = TouTariff::default().into();
    for case in 0..CASES {
        let mut rng = StdRng::seed_from_u64(case);
        let storage = random_storage(&mut rng);
        let series = random_series(&mut rng);
        let planner = DispatchPlanner::new(random_policy(&mut rng));

        let plan = planner
            .plan(&series, &tariff, &storage)
            .unwrap_or_else(|e| panic!("case {case}: {e}"));
        assert_eq!(plan.len(), series.len(), "case {case}");
        assert_feasible(&plan, &storage);

        // Energy balance: SoC moves by exactly the stored minus released energy.
        let expected = storage.initial_soc_kwh + plan.energy_charged_kwh() * storage.efficiency
            - plan.energy_discharged_kwh();
        let final_soc = plan.final_soc_kwh().unwrap_or(storage.initial_soc_kwh);
        assert!(
            (final_soc - expected).abs() < 1e-6 * storage.capacity_kwh.max(1.0),
            "case {case}: final SoC {final_soc} vs balance {expected}"
        );
    }
}

#[test]
fn planning_is_deterministic() {
    let tariff: TariffSchedule = TouTariff::default().into();
    for case in 0..20 {
        let mut rng = StdRng::seed_from_u64(1_000 + case);
        let storage = random_storage(&mut rng);
        let series = random_series(&mut rng);
        let planner = DispatchPlanner::new(random_policy(&mut rng));

        let a = planner.plan(&series, &tariff, &storage).expect("plan");
        let b = planner.plan(&series, &tariff, &storage).expect("plan");
        let bits = |p: &vpp_dispatch::dispatch::DispatchPlan| -> Vec<u64> {
            p.decisions()
                .iter()
                .flat_map(|d| [d.charge_kw, d.discharge_kw, d.soc_kwh, d.grid_import_kw])
                .map(f64::to_bits)
                .collect()
        };
        assert_eq!(bits(&a), bits(&b), "case {case}");
    }
}

#[test]
fn soc_stays_inside_the_operating_window() {
    let tariff: TariffSchedule = TouTariff::default().into();
    for case in 0..CASES {
        let mut rng = StdRng::seed_from_u64(5_000 + case);
        let min = rng.random_range(0.0..0.5);
        let max = rng.random_range(min + 0.05..=1.0);
        let mut storage = random_storage(&mut rng).with_soc_window(min, max);
        storage.initial_soc_kwh = rng.random_range(storage.min_soc_kwh()..=storage.max_soc_kwh());
        storage.validate().unwrap_or_else(|e| panic!("case {case}: {e}"));
        let series = random_series(&mut rng);
        let planner = DispatchPlanner::new(random_policy(&mut rng));

        let plan = planner
            .plan(&series, &tariff, &storage)
            .unwrap_or_else(|e| panic!("case {case}: {e}"));
        assert_feasible(&plan, &storage);
        let eps = 1e-9 * storage.capacity_kwh.max(1.0);
        for (i, d) in plan.decisions().iter().enumerate() {
            assert!(
                d.soc_kwh >= storage.min_soc_kwh() - eps && d.soc_kwh <= storage.max_soc_kwh() + eps,
                "case {case} step {i}: SoC {} outside [{}, {}]",
                d.soc_kwh,
                storage.min_soc_kwh(),
                storage.max_soc_kwh()
            );
        }
    }
}
