//! Panel pipeline
//!
//! Runs the stages in order on a dedicated rayon pool, checks structural
//! invariants after each stage and gathers counters and findings into the
//! [`RunReport`]. Either a complete panel and report come back, or an error
//! and nothing else.

use std::time::Instant;

use log::info;
use rayon::ThreadPoolBuilder;

use crate::algorithm::{
    AttachOutcome, EventAttacher, IdentityMap, IdentityReconciler, Panel, PanelAssembler,
    Reconciliation, ReconciliationAuditor, RepairOutcome, RiskSet, RiskSetFilter, SpellRepairer,
    SpellTable, validate_attachments, validate_spells,
};
use crate::config::PanelConfig;
use crate::error::{PanelError, Result};
use crate::models::Attachment;
use crate::report::{RoleCounters, RunReport, StageCounters};
use crate::store::RecordStore;
use crate::utils::logging::{StageProgress, log_stage_complete};

const STAGES: u64 = 6;

/// Everything a successful run produces
#[derive(Debug, Clone)]
pub struct PanelRun {
    /// The analysis panel
    pub panel: Panel,
    /// Counters, tallies and findings
    pub report: RunReport,
    /// Canonical universe
    pub identities: IdentityMap,
    /// Repaired spells
    pub spells: SpellTable,
    /// At-risk person-years
    pub risk_set: RiskSet,
    /// Event attachments
    pub attachments: Vec<Attachment>,
}

/// Builds a panel from a record store
#[derive(Debug, Clone)]
pub struct PanelPipeline {
    config: PanelConfig,
}

impl PanelPipeline {
    /// Create a pipeline; the configuration is validated up front
    pub fn new(config: PanelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use
    #[must_use]
    pub const fn config(&self) -> &PanelConfig {
        &self.config
    }

    /// Run every stage over `store`
    pub fn run(&self, store: &RecordStore) -> Result<PanelRun> {
        let workers = self.config.worker_count();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build worker pool: {e}"))?;
        info!("Running panel pipeline on {workers} worker threads");
        pool.install(|| self.run_stages(store))
    }

    fn run_stages(&self, store: &RecordStore) -> Result<PanelRun> {
        let progress = StageProgress::new(STAGES, self.config.show_progress);
        let run_start = Instant::now();

        progress.begin("identity reconciliation");
        let start = Instant::now();
        let reconciliation = IdentityReconciler::new(&self.config).reconcile(store)?;
        let identities = &reconciliation.identities;
        log_stage_complete(
            "identity reconciliation",
            &format!("{} persons", identities.len()),
            start.elapsed(),
        );
        progress.advance();

        progress.begin("spell repair");
        let start = Instant::now();
        let repair = SpellRepairer::new(&self.config).repair(store, identities)?;
        validate_spells(&repair.table)?;
        log_stage_complete(
            "spell repair",
            &format!("{} spells", repair.table.spell_count()),
            start.elapsed(),
        );
        progress.advance();

        progress.begin("risk set");
        let start = Instant::now();
        let risk_set = RiskSetFilter::new(&self.config).build(identities, &repair.table);
        self.check_risk_set(&risk_set)?;
        log_stage_complete("risk set", &format!("{} person-years", risk_set.len()), start.elapsed());
        progress.advance();

        progress.begin("event attachment");
        let start = Instant::now();
        let attached = EventAttacher::new(&self.config).attach(store, identities, &repair.table)?;
        validate_attachments(&attached.attachments, &repair.table)?;
        log_stage_complete(
            "event attachment",
            &format!("{} attachments", attached.attachments.len()),
            start.elapsed(),
        );
        progress.advance();

        progress.begin("panel assembly");
        let start = Instant::now();
        let panel = PanelAssembler.assemble(store.roles(), identities, &risk_set, &attached.attachments);
        if panel.len() != risk_set.len() {
            return Err(PanelError::invariant(
                "panel assembly",
                format!("{} rows for {} risk-set entries", panel.len(), risk_set.len()),
            ));
        }
        log_stage_complete("panel assembly", &format!("{} rows", panel.len()), start.elapsed());
        progress.advance();

        progress.begin("audit");
        let start = Instant::now();
        let audit = ReconciliationAuditor.audit(store, identities, &attached.attachments, &risk_set, &panel);
        log_stage_complete("audit", &format!("{} tallies", audit.tallies.len()), start.elapsed());
        progress.advance();

        let mut counters = build_counters(store, &reconciliation, &repair, &attached);
        counters.risk_set_size = risk_set.len();
        counters.panel_rows = panel.len();
        counters.outside_risk_set = audit.outside_risk_set;

        let mut findings = reconciliation.findings.clone();
        findings.extend(repair.findings);
        findings.extend(attached.findings);
        findings.extend(audit.findings);
        findings.sort();

        let report = RunReport {
            counters,
            tallies: audit.tallies,
            findings,
        };
        progress.finish("panel complete");
        info!(
            "Panel run finished in {:?}: {} rows, {} findings",
            run_start.elapsed(),
            panel.len(),
            report.findings.len()
        );

        Ok(PanelRun {
            panel,
            report,
            identities: reconciliation.identities,
            spells: repair.table,
            risk_set,
            attachments: attached.attachments,
        })
    }

    /// Every entry lies in the age band and target range, once per person-year
    fn check_risk_set(&self, risk_set: &RiskSet) -> Result<()> {
        let entries = risk_set.entries();
        if let Some(entry) = entries
            .iter()
            .find(|e| !self.config.age_band.contains(e.age) || !self.config.years.contains(e.year))
        {
            return Err(PanelError::invariant(
                "risk set",
                format!("person {} at age {} in {} is outside the band", entry.person, entry.age, entry.year),
            ));
        }
        if entries
            .windows(2)
            .any(|pair| (pair[0].person, pair[0].year) >= (pair[1].person, pair[1].year))
        {
            return Err(PanelError::invariant("risk set", "entries are not unique and ordered"));
        }
        Ok(())
    }
}

fn build_counters(
    store: &RecordStore,
    reconciliation: &Reconciliation,
    repair: &RepairOutcome,
    attached: &AttachOutcome,
) -> StageCounters {
    let roles = reconciliation
        .roles
        .iter()
        .zip(&attached.roles)
        .map(|(resolution, attach)| RoleCounters {
            role: resolution.role.clone(),
            resolved_rows: resolution.resolved_rows,
            orphan_rows: resolution.unresolved_rows,
            missing_rows: resolution.missing_rows,
            ..attach.clone()
        })
        .collect();

    StageCounters {
        status_rows: store.status_row_count(),
        duplicate_status_rows: repair.stats.duplicate_rows,
        conflicting_status_rows: repair.stats.conflicting_rows,
        persons: reconciliation.identities.len(),
        persons_without_cohort: reconciliation.missing_cohorts,
        cohort_conflicts: reconciliation.cohort_conflicts,
        gender_conflicts: reconciliation.gender_conflicts,
        spells: repair.table.spell_count(),
        inserted_spells: repair.stats.inserted_spells,
        inserted_years: repair.stats.inserted_years,
        unknown_spells: repair.stats.unknown_spells,
        unknown_years: repair.stats.unknown_years,
        unobserved_gaps: repair.stats.gaps,
        unobserved_years: repair.stats.gap_years,
        event_rows: store.event_row_count(),
        events: attached.events,
        roles,
        ..Default::default()
    }
}
