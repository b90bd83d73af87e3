use reg_panel::models::Gender;
use reg_panel::{AgeBand, PanelConfig, PanelPipeline, YearRange};

use crate::utils::{run_synthetic, store_with, test_config, yearly};

#[test]
fn entries_follow_spells_inside_target_years() {
    let config = PanelConfig {
        age_band: AgeBand {
            min_age: 15,
            max_age: 50,
        },
        years: YearRange {
            start: 1990,
            end: 2020,
        },
        ..test_config()
    };
    let store = store_with(&config, yearly("A", 1970, Gender::Female, 1990..=2022, "1"), Vec::new());
    let run = PanelPipeline::new(config).unwrap().run(&store).unwrap();

    let years: Vec<i32> = run.risk_set.entries().iter().map(|e| e.year).collect();
    assert_eq!(years.first(), Some(&1990));
    assert_eq!(years.last(), Some(&2020));
    assert_eq!(years.len(), 31);
    assert!(run.risk_set.entries().iter().all(|e| e.age == e.year - 1970));
}

#[test]
fn person_without_spell_in_range_contributes_nothing() {
    let config = test_config();
    let store = store_with(&config, yearly("A", 1970, Gender::Female, 1980..=1985, "1"), Vec::new());
    let run = PanelPipeline::new(config).unwrap().run(&store).unwrap();
    assert!(run.risk_set.is_empty());
    assert!(run.panel.is_empty());
}

#[test]
fn narrowing_the_band_never_grows_the_risk_set() {
    let mut previous = usize::MAX;
    for (min_age, max_age) in [(0, 100), (15, 50), (20, 45), (25, 35), (30, 30)] {
        let config = PanelConfig {
            age_band: AgeBand { min_age, max_age },
            ..test_config()
        };
        let size = run_synthetic(11, &config).risk_set.len();
        assert!(size <= previous, "band {min_age}-{max_age} grew the risk set");
        previous = size;
    }
}

#[test]
fn unknown_status_can_be_left_out() {
    let with_unknown = run_synthetic(3, &test_config());
    let without_unknown = run_synthetic(
        3,
        &PanelConfig {
            include_unknown_status: false,
            ..test_config()
        },
    );
    assert!(without_unknown.risk_set.len() <= with_unknown.risk_set.len());
    assert!(without_unknown.risk_set.entries().iter().all(|e| e.status.is_known()));
}
