use std::collections::BTreeMap;

use reg_panel::{FindingKind, GapFillPolicy, PanelConfig};

use crate::utils::{run_synthetic, test_config};

#[test]
fn identical_inputs_give_identical_outputs() {
    let config = test_config();
    let first = run_synthetic(21, &config);
    let second = run_synthetic(21, &PanelConfig {
        workers: Some(4),
        ..config
    });
    assert_eq!(first.panel, second.panel);
    assert_eq!(first.report.to_json().unwrap(), second.report.to_json().unwrap());
    assert_eq!(
        first.panel.to_record_batch().unwrap(),
        second.panel.to_record_batch().unwrap()
    );
}

#[test]
fn panel_indicators_match_covered_attachments_in_risk_set() {
    for policy in [GapFillPolicy::ForwardFill, GapFillPolicy::LeaveGap] {
        let run = run_synthetic(5, &PanelConfig {
            gap_fill: policy,
            ..test_config()
        });
        let mut expected: BTreeMap<(usize, i32), usize> = BTreeMap::new();
        let mut outside = 0;
        for attachment in run.attachments.iter().filter(|a| a.is_covered()) {
            if run.risk_set.contains(attachment.person, attachment.event_year) {
                *expected.entry((attachment.role, attachment.event_year)).or_default() += 1;
            } else {
                outside += 1;
            }
        }
        for (&(role, year), &count) in &expected {
            assert_eq!(run.panel.events_in(role, year), count);
        }
        assert_eq!(run.report.count(FindingKind::OutsideRiskSet), outside);
        assert_eq!(run.report.count(FindingKind::CountMismatch), 0);
    }
}

#[test]
fn duplicate_rows_never_duplicate_attachments() {
    let run = run_synthetic(9, &test_config());
    let mut keys: Vec<(&str, usize)> = run
        .attachments
        .iter()
        .map(|a| (a.event_id.as_str(), a.role))
        .collect();
    let total = keys.len();
    keys.sort_unstable();
    keys.dedup();
    assert_eq!(keys.len(), total);
}

#[test]
fn panel_rows_equal_risk_set_size() {
    for seed in [1, 2, 3] {
        let run = run_synthetic(seed, &test_config());
        assert_eq!(run.panel.len(), run.risk_set.len());
        for (row, entry) in run.panel.rows().iter().zip(run.risk_set.entries()) {
            assert_eq!((row.person, row.year, row.age), (entry.person, entry.year, entry.age));
        }
    }
}
