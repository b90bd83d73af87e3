use reg_panel::models::Gender;
use reg_panel::{FindingKind, PanelConfig, PanelError, PanelPipeline};

use crate::utils::{birth, store_with, test_config, yearly};

fn parents() -> Vec<reg_panel::models::StatusRecord> {
    let mut status = yearly("M", 1970, Gender::Female, 1990..=2000, "1");
    status.extend(yearly("F", 1968, Gender::Male, 1990..=2000, "1"));
    status
}

#[test]
fn unresolvable_mother_is_an_orphan() {
    let config = PanelConfig {
        unresolved_threshold: 0.5,
        ..test_config()
    };
    let events = vec![
        birth("b1", 1995, Some("X"), Some("F")),
        birth("b2", 1996, Some("M"), Some("F")),
    ];
    let baseline = store_with(&config, parents(), vec![birth("b2", 1996, Some("M"), Some("F"))]);
    let store = store_with(&config, parents(), events);

    let pipeline = PanelPipeline::new(config).unwrap();
    let base = pipeline.run(&baseline).unwrap();
    let run = pipeline.run(&store).unwrap();

    let mother = run.report.counters.role("mother").unwrap();
    assert_eq!(mother.orphan_rows, 1);
    assert_eq!(mother.attachments, 1);
    assert!(run.attachments.iter().all(|a| a.event_id != "b1" || a.role != 0));
    assert_eq!(run.report.count(FindingKind::UnresolvedIdentifier), 1);

    // The orphan leaves every mother indicator unchanged.
    for (with_orphan, without) in run.panel.rows().iter().zip(base.panel.rows()) {
        assert_eq!(with_orphan.events[0], without.events[0]);
    }
}

#[test]
fn too_many_orphans_halt_the_run() {
    let config = PanelConfig {
        unresolved_threshold: 0.2,
        ..test_config()
    };
    let store = store_with(
        &config,
        parents(),
        vec![
            birth("b1", 1995, Some("X"), Some("F")),
            birth("b2", 1996, Some("M"), Some("F")),
        ],
    );
    let err = PanelPipeline::new(config).unwrap().run(&store).unwrap_err();
    assert!(matches!(err, PanelError::DataQualityExceeded(_)));
}

#[test]
fn uncovered_event_keeps_attachment() {
    let config = test_config();
    let store = store_with(&config, parents(), vec![birth("b1", 2005, Some("M"), None)]);
    let run = PanelPipeline::new(config).unwrap().run(&store).unwrap();

    assert_eq!(run.attachments.len(), 1);
    assert!(run.attachments[0].matched_spell.is_none());
    assert_eq!(run.report.count(FindingKind::UncoveredEvent), 1);
    assert_eq!(run.report.count(FindingKind::MissingIdentifier), 1);
    assert_eq!(run.report.counters.role("father").unwrap().missing_rows, 1);
}

#[test]
fn same_person_under_two_roles_is_flagged() {
    let config = PanelConfig {
        cross_role_threshold: 1.0,
        ..test_config()
    };
    let store = store_with(&config, parents(), vec![birth("b1", 1995, Some("M"), Some("M"))]);
    let run = PanelPipeline::new(config).unwrap().run(&store).unwrap();

    assert_eq!(run.attachments.len(), 2);
    assert_eq!(run.report.count(FindingKind::CrossRoleIdentifierConflict), 1);
    let mother = run.identities.resolve("M").unwrap();
    let row = run.panel.row(mother, 1995).unwrap();
    assert_eq!(row.events.as_slice(), &[1, 1]);
}
