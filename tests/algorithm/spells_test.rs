use reg_panel::algorithm::{IdentityReconciler, SpellRepairer, validate_spells};
use reg_panel::models::{Gender, SpellOrigin, Status, StatusRecord};
use reg_panel::{FindingKind, GapFillPolicy, PanelConfig, PanelPipeline};

use crate::utils::{store_with, synthetic, test_config, yearly};

#[test]
fn missing_year_is_forward_filled() {
    let config = test_config();
    let mut status = yearly("A", 1970, Gender::Female, [1990, 1991], "1");
    status[1].status = Some("2".to_string());
    status.extend(yearly("A", 1970, Gender::Female, 1993..=1995, "2"));
    let store = store_with(&config, status, Vec::new());

    let run = PanelPipeline::new(config).unwrap().run(&store).unwrap();
    let person = run.identities.resolve("A").unwrap();
    let spells = run.spells.of(person).unwrap();

    assert_eq!(spells.span(), Some((1990, 1995)));
    let filler = spells.covering(1992).unwrap();
    assert_eq!(filler.origin, SpellOrigin::Inserted);
    assert_eq!(filler.status, Status::Known("2".to_string()));
    assert_eq!((filler.start_year, filler.end_year), (1992, 1992));
    assert_eq!(run.report.count(FindingKind::InsertedSpell), 1);
    assert_eq!(run.report.counters.inserted_years, 1);
}

#[test]
fn policies_differ_only_inside_gaps() {
    let registers = synthetic(7);
    for policy in [GapFillPolicy::ForwardFill, GapFillPolicy::LeaveGap, GapFillPolicy::MarkUnknown] {
        let config = PanelConfig {
            gap_fill: policy,
            ..test_config()
        };
        let store = registers.clone().into_store(&config).unwrap();
        let identities = IdentityReconciler::new(&config).reconcile(&store).unwrap().identities;
        let repaired = SpellRepairer::new(&config).repair(&store, &identities).unwrap();
        validate_spells(&repaired.table).unwrap();

        for person in repaired.table.persons() {
            let (first, last) = person.span().unwrap();
            let covered = person.spells.iter().map(|s| s.years() as i32).sum::<i32>();
            let open = person.gaps.iter().map(|g| g.end_year - g.start_year + 1).sum::<i32>();
            // Every year of the observed span is either covered or an open gap.
            assert_eq!(covered + open, last - first + 1);
            if policy != GapFillPolicy::LeaveGap {
                assert!(person.gaps.is_empty());
            }
        }
    }
}

#[test]
fn exact_duplicates_do_not_change_spells() {
    let config = test_config();
    let status = yearly("A", 1970, Gender::Male, 1990..=1994, "1");
    let mut doubled = status.clone();
    doubled.extend(status.clone());

    let single = store_with(&config, status, Vec::new());
    let double = store_with(&config, doubled, Vec::new());
    let run_single = PanelPipeline::new(config.clone()).unwrap().run(&single).unwrap();
    let run_double = PanelPipeline::new(config).unwrap().run(&double).unwrap();

    assert_eq!(run_single.spells, run_double.spells);
    assert_eq!(run_double.report.counters.duplicate_status_rows, 5);
}

#[test]
fn conflicting_status_keeps_first_source_row() {
    let config = test_config();
    let status = vec![
        StatusRecord::new("A", 1990, "1").with_cohort(1970),
        StatusRecord::new("A", 1990, "4").with_cohort(1970),
    ];
    let store = store_with(&config, status, Vec::new());
    let run = PanelPipeline::new(config).unwrap().run(&store).unwrap();

    let person = run.identities.resolve("A").unwrap();
    assert_eq!(
        run.spells.covering(person, 1990).map(|s| s.status.clone()),
        Some(Status::Known("1".to_string()))
    );
    assert_eq!(run.report.count(FindingKind::StatusConflict), 1);
}
