use arrow::array::{Array, BooleanArray, StringArray, UInt32Array};
use reg_panel::models::Gender;
use reg_panel::report::findings_to_record_batch;
use reg_panel::{FindingKind, PanelConfig, PanelError, PanelPipeline};

use crate::utils::{birth, store_with, test_config, yearly};

#[test]
fn end_to_end_panel() {
    let config = test_config();
    let mut status = yearly("M", 1970, Gender::Female, 1990..=1999, "1");
    status.extend(yearly("F", 1965, Gender::Male, 1990..=1999, "2"));
    let events = vec![
        birth("b1", 1995, Some("M"), Some("F")),
        birth("b1", 1995, Some("M"), Some("F")),
        birth("b2", 1997, Some("M"), None),
    ];
    let store = store_with(&config, status, events);
    let run = PanelPipeline::new(config).unwrap().run(&store).unwrap();

    assert_eq!(run.panel.len(), 20);
    assert_eq!(run.report.counters.panel_rows, run.report.counters.risk_set_size);
    let mother = run.identities.resolve("M").unwrap();
    assert!(run.panel.row(mother, 1995).unwrap().has_event(0));
    assert!(run.panel.row(mother, 1997).unwrap().has_event(0));
    assert!(!run.panel.row(mother, 1996).unwrap().has_event(0));
    assert_eq!(run.panel.events_in(1, 1995), 1);

    let counters = run.report.counters.role("mother").unwrap();
    assert_eq!(counters.attachments, 2);
    assert_eq!(counters.duplicates_collapsed, 1);
    assert_eq!(run.report.count(FindingKind::CountMismatch), 0);
}

#[test]
fn panel_exports_role_columns() {
    let config = test_config();
    let store = store_with(
        &config,
        yearly("M", 1970, Gender::Female, 1990..=1991, "1"),
        vec![birth("b1", 1991, Some("M"), None)],
    );
    let run = PanelPipeline::new(config).unwrap().run(&store).unwrap();
    let batch = run.panel.to_record_batch().unwrap();

    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.num_columns(), 9);
    let ids = batch
        .column_by_name("person_id")
        .unwrap()
        .as_any()
        .downcast_ref::<StringArray>()
        .unwrap();
    assert_eq!(ids.value(0), "M");
    let flags = batch
        .column_by_name("mother_event")
        .unwrap()
        .as_any()
        .downcast_ref::<BooleanArray>()
        .unwrap();
    assert!(!flags.value(0));
    assert!(flags.value(1));
    let counts = batch
        .column_by_name("father_events")
        .unwrap()
        .as_any()
        .downcast_ref::<UInt32Array>()
        .unwrap();
    assert_eq!(counts.value(1), 0);
    assert!(!batch.column_by_name("status").unwrap().is_null(0));

    let findings = findings_to_record_batch(&run.report.findings).unwrap();
    assert_eq!(findings.num_rows(), run.report.findings.len());
}

#[test]
fn quality_breach_returns_no_panel() {
    let config = PanelConfig {
        unresolved_threshold: 0.0,
        ..test_config()
    };
    let store = store_with(
        &config,
        yearly("M", 1970, Gender::Female, 1990..=1991, "1"),
        vec![birth("b1", 1991, Some("Y"), None)],
    );
    let result = PanelPipeline::new(config).unwrap().run(&store);
    match result {
        Err(PanelError::DataQualityExceeded(breach)) => {
            assert_eq!(breach.count, 1);
            assert_eq!(breach.role.as_deref(), Some("mother"));
        }
        other => panic!("expected a quality breach, got {other:?}"),
    }
}

#[test]
fn invalid_configuration_is_rejected() {
    let config = PanelConfig {
        cross_role_threshold: 1.5,
        ..test_config()
    };
    assert!(matches!(PanelPipeline::new(config), Err(PanelError::Config(_))));
}

#[test]
fn report_serializes_to_json() {
    let config = test_config();
    let store = store_with(&config, yearly("M", 1970, Gender::Female, 1990..=1990, "1"), Vec::new());
    let run = PanelPipeline::new(config).unwrap().run(&store).unwrap();
    let json: serde_json::Value = serde_json::from_str(&run.report.to_json().unwrap()).unwrap();
    assert_eq!(json["counters"]["persons"], 1);
    assert_eq!(json["counters"]["panel_rows"], 1);
}
