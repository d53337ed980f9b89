// Property-based testing using proptest
// Validates pipeline invariants across random histories and scenarios

mod helpers;

use std::collections::BTreeSet;

use helpers::{day, FrameBuilder};
use proptest::prelude::*;
use stocksight::{
    days_to_periods, regroup_bundle, CancellationFlag, CleanFrame, EngineConfig, ForecastBundle,
    ForecastDispatcher, Granularity, RunOutcome, RunRequest, Scenario,
};

fn run(frame: &CleanFrame, request: &RunRequest) -> ForecastBundle {
    let dispatcher = ForecastDispatcher::new(EngineConfig::default());
    match dispatcher
        .run(frame, request, &CancellationFlag::new())
        .unwrap()
    {
        RunOutcome::Completed { bundle, .. } => bundle,
        RunOutcome::Cancelled => panic!("run was cancelled"),
    }
}

fn granularity(index: usize) -> Granularity {
    [
        Granularity::Daily,
        Granularity::Weekly,
        Granularity::Monthly,
        Granularity::Quarterly,
    ][index % 4]
}

// Property: the bundle SKU set is the frame SKU set minus all-zero SKUs.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]
    #[test]
    fn bundle_covers_every_nonzero_sku(
        sku_count in 1usize..5,
        days in 15u32..40,
        zero_mask in prop::collection::vec(any::<bool>(), 5),
    ) {
        let mask = zero_mask.clone();
        let frame = FrameBuilder::new()
            .sku_count(sku_count)
            .days(days)
            .quantity(move |sku, d| {
                let index: usize = sku[4..].parse().unwrap();
                if mask[index] {
                    0.0
                } else {
                    20.0 + (d % 6) as f64
                }
            })
            .build();

        let bundle = run(&frame, &RunRequest::new(7, Granularity::Daily));

        let expected: BTreeSet<String> = frame
            .sku_names()
            .into_iter()
            .filter(|sku| {
                let index: usize = sku[4..].parse().unwrap();
                !zero_mask[index]
            })
            .collect();
        let produced: BTreeSet<String> = bundle.sku_names().into_iter().collect();
        prop_assert_eq!(produced, expected);

        for skip in &bundle.skipped {
            prop_assert!(skip.reason.contains("zeros"));
        }
    }
}

// Property: the bundle spans exactly days_to_periods(h, g) future periods.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]
    #[test]
    fn bundle_spans_converted_horizon(
        horizon_days in 1u32..200,
        granularity_index in 0usize..4,
    ) {
        let g = granularity(granularity_index);
        let frame = FrameBuilder::new()
            .skus(&["A", "B"])
            .days(120)
            .quantity(|_, d| 30.0 + (d % 5) as f64)
            .build();

        let bundle = run(&frame, &RunRequest::new(horizon_days, g));
        prop_assert_eq!(bundle.dates.len(), days_to_periods(horizon_days, g));

        let last_history = frame.max_date().unwrap();
        prop_assert!(bundle.dates.iter().all(|d| *d > last_history));
    }
}

// Property: every forecast value is finite, non-negative, and bracketed.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]
    #[test]
    fn forecast_values_are_sane(
        sku_count in 1usize..4,
        days in 20u32..60,
        level in 1.0f64..500.0,
    ) {
        let frame = FrameBuilder::new()
            .sku_count(sku_count)
            .days(days)
            .quantity(move |_, d| level + (d % 9) as f64)
            .build();

        let bundle = run(&frame, &RunRequest::new(10, Granularity::Daily));
        for forecast in &bundle.forecasts {
            for i in 0..forecast.point.len() {
                prop_assert!(forecast.point[i].is_finite());
                prop_assert!(forecast.point[i] >= 0.0);
                prop_assert!(forecast.lower[i] >= 0.0);
                prop_assert!(forecast.upper[i] >= forecast.point[i]);
                prop_assert!(forecast.point[i] >= forecast.lower[i]);
            }
        }
    }
}

// Property: a demand spike with multiplier 1.0 is the identity.
proptest! {
    #[test]
    fn unit_spike_is_identity(
        start_offset in 0u32..20,
        window in 1u32..30,
    ) {
        let frame = FrameBuilder::new()
            .skus(&["A", "B"])
            .days(30)
            .quantity(|_, d| 10.0 + d as f64)
            .build();

        let scenario = Scenario::DemandSpike {
            sku: "A".into(),
            start: day(start_offset),
            end: day(start_offset + window),
            multiplier: 1.0,
        };
        let rewritten =
            stocksight::scenario::apply_scenario(&frame, &scenario, &EngineConfig::default())
                .unwrap();
        prop_assert_eq!(rewritten, frame);
    }
}

// Property: a supply delay of zero days is the identity.
proptest! {
    #[test]
    fn zero_delay_is_identity(start_offset in 0u32..30) {
        let frame = FrameBuilder::new()
            .skus(&["A", "B"])
            .days(30)
            .quantity(|_, d| 10.0 + d as f64)
            .build();

        let scenario = Scenario::SupplyDelay {
            sku: "A".into(),
            start: day(start_offset),
            delay_days: 0,
        };
        let rewritten =
            stocksight::scenario::apply_scenario(&frame, &scenario, &EngineConfig::default())
                .unwrap();
        prop_assert_eq!(rewritten, frame);
    }
}

// Property: delay d1 then d2 equals a single delay of d1 + d2.
proptest! {
    #[test]
    fn delays_compose(
        d1 in 0i64..30,
        d2 in 0i64..30,
        start_offset in 0u32..20,
    ) {
        let frame = FrameBuilder::new()
            .skus(&["A", "B"])
            .days(30)
            .quantity(|_, d| 5.0 + (d % 7) as f64)
            .build();
        let config = EngineConfig::default();
        let start = day(start_offset);

        let delay = |days: i64| Scenario::SupplyDelay {
            sku: "A".into(),
            start,
            delay_days: days,
        };

        let stepwise = stocksight::scenario::apply_scenario(
            &stocksight::scenario::apply_scenario(&frame, &delay(d1), &config).unwrap(),
            &delay(d2),
            &config,
        )
        .unwrap();
        let direct =
            stocksight::scenario::apply_scenario(&frame, &delay(d1 + d2), &config).unwrap();
        prop_assert_eq!(stepwise, direct);
    }
}

// Property: regrouping at the same granularity is idempotent, and totals
// are conserved at every coarser granularity.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]
    #[test]
    fn regrouping_is_idempotent_and_conservative(days in 30u32..90) {
        let frame = FrameBuilder::new()
            .skus(&["A", "B", "C"])
            .days(days)
            .quantity(|_, d| 15.0 + (d % 8) as f64)
            .build();
        let bundle = run(&frame, &RunRequest::new(60, Granularity::Daily));

        for g in [Granularity::Weekly, Granularity::Monthly, Granularity::Quarterly] {
            let regrouped = regroup_bundle(&bundle, g).unwrap();
            let again = regroup_bundle(&regrouped, g).unwrap();
            prop_assert_eq!(&regrouped, &again);

            for forecast in &bundle.forecasts {
                let original: f64 = forecast.point.iter().sum();
                let total: f64 = regrouped
                    .get(&forecast.sku)
                    .unwrap()
                    .point
                    .iter()
                    .sum();
                prop_assert!((original - total).abs() < 1e-6);
            }
        }
    }
}
