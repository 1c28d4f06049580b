use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use async_trait::async_trait;
use parking_lot::Mutex;
use sentencing_parser::StateCode;

use crate::rows::{CaseRow, ClientRow, InsightKey, InsightRow, OffenseRow, OpportunityRow, StaffRow};
use crate::{ImportRepository, ReconcileSummary, RepositoryError};

type Table<K, V> = HashMap<(StateCode, K), V>;

#[derive(Debug, Default)]
struct Tables {
    staff: Table<String, StaffRow>,
    clients: Table<String, ClientRow>,
    cases: Table<String, CaseRow>,
    opportunities: Table<(String, String), OpportunityRow>,
    insights: Table<InsightKey, InsightRow>,
    offenses: Table<String, OffenseRow>,
}

/// Process-local store with the same reconcile semantics as Postgres.
///
/// Backs dry-run imports and tests. Stored cases carry the resolved
/// staff/client links, not the requested ones.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tables: Mutex<Tables>,
}

fn upsert<K, V>(
    table: &mut Table<K, V>,
    state_code: StateCode,
    key: K,
    row: V,
    summary: &mut ReconcileSummary,
) where
    K: Eq + Hash,
{
    let previous = table.insert((state_code, key), row);
    summary.record_upsert(previous.is_none());
}

fn prune<K, V>(
    table: &mut Table<K, V>,
    state_code: StateCode,
    keep: impl Fn(&K) -> bool,
    describe: impl Fn(&K) -> String,
) -> Vec<String>
where
    K: Eq + Hash + Clone,
{
    let doomed: Vec<(StateCode, K)> = table
        .keys()
        .filter(|(state, key)| *state == state_code && !keep(key))
        .cloned()
        .collect();

    let mut pruned: Vec<String> = doomed
        .into_iter()
        .map(|entry| {
            let label = describe(&entry.1);
            table.remove(&entry);
            label
        })
        .collect();
    pruned.sort();
    pruned
}

fn sorted_rows<K, V>(table: &Table<K, V>, state_code: StateCode) -> Vec<V>
where
    K: Ord + Clone,
    V: Clone,
{
    let mut rows: Vec<(K, V)> = table
        .iter()
        .filter(|((state, _), _)| *state == state_code)
        .map(|((_, key), row)| (key.clone(), row.clone()))
        .collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows.into_iter().map(|(_, row)| row).collect()
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn staff(&self, state_code: StateCode) -> Vec<StaffRow> {
        sorted_rows(&self.tables.lock().staff, state_code)
    }

    pub fn clients(&self, state_code: StateCode) -> Vec<ClientRow> {
        sorted_rows(&self.tables.lock().clients, state_code)
    }

    pub fn cases(&self, state_code: StateCode) -> Vec<CaseRow> {
        sorted_rows(&self.tables.lock().cases, state_code)
    }

    pub fn opportunities(&self, state_code: StateCode) -> Vec<OpportunityRow> {
        sorted_rows(&self.tables.lock().opportunities, state_code)
    }

    pub fn insights(&self, state_code: StateCode) -> Vec<InsightRow> {
        sorted_rows(&self.tables.lock().insights, state_code)
    }

    pub fn offenses(&self, state_code: StateCode) -> Vec<OffenseRow> {
        sorted_rows(&self.tables.lock().offenses, state_code)
    }
}

impl Tables {
    fn link_cases(
        &mut self,
        state_code: StateCode,
        case_ids: &[String],
        link: impl Fn(&mut CaseRow),
    ) {
        for case_id in case_ids {
            if let Some(case) = self.cases.get_mut(&(state_code, case_id.clone())) {
                link(case);
            }
        }
    }

    fn unlink_cases(
        &mut self,
        state_code: StateCode,
        field: impl Fn(&mut CaseRow) -> &mut Option<String>,
        live: impl Fn(&str) -> bool,
    ) {
        for ((state, _), case) in self.cases.iter_mut() {
            if *state != state_code {
                continue;
            }
            let link = field(case);
            if link.as_deref().is_some_and(|id| !live(id)) {
                *link = None;
            }
        }
    }
}

#[async_trait]
impl ImportRepository for InMemoryRepository {
    async fn replace_staff(
        &self,
        state_code: StateCode,
        rows: &[StaffRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        let mut tables = self.tables.lock();
        let mut summary = ReconcileSummary::default();

        for row in rows {
            upsert(
                &mut tables.staff,
                state_code,
                row.external_id.clone(),
                row.clone(),
                &mut summary,
            );
            tables.link_cases(state_code, &row.case_ids, |case| {
                case.staff_id = Some(row.external_id.clone());
            });
        }

        let live: HashSet<&str> = rows.iter().map(|row| row.external_id.as_str()).collect();
        let pruned = prune(
            &mut tables.staff,
            state_code,
            |id| live.contains(id.as_str()),
            Clone::clone,
        );
        tables.unlink_cases(
            state_code,
            |case| &mut case.staff_id,
            |id| live.contains(id),
        );
        summary.record_pruned(pruned);
        Ok(summary)
    }

    async fn replace_clients(
        &self,
        state_code: StateCode,
        rows: &[ClientRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        let mut tables = self.tables.lock();
        let mut summary = ReconcileSummary::default();

        for row in rows {
            let mut stored = row.clone();
            if !row.is_gender_locked {
                if let Some(existing) = tables.clients.get(&(state_code, row.external_id.clone())) {
                    stored.gender = existing.gender;
                }
            }
            upsert(
                &mut tables.clients,
                state_code,
                row.external_id.clone(),
                stored,
                &mut summary,
            );
            tables.link_cases(state_code, &row.case_ids, |case| {
                case.client_id = Some(row.external_id.clone());
            });
        }

        let live: HashSet<&str> = rows.iter().map(|row| row.external_id.as_str()).collect();
        let pruned = prune(
            &mut tables.clients,
            state_code,
            |id| live.contains(id.as_str()),
            Clone::clone,
        );
        tables.unlink_cases(
            state_code,
            |case| &mut case.client_id,
            |id| live.contains(id),
        );
        summary.record_pruned(pruned);
        Ok(summary)
    }

    async fn replace_cases(
        &self,
        state_code: StateCode,
        rows: &[CaseRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        let mut tables = self.tables.lock();
        let mut summary = ReconcileSummary::default();

        for row in rows {
            let mut stored = row.clone();
            stored.staff_id = row
                .staff_id
                .clone()
                .filter(|id| tables.staff.contains_key(&(state_code, id.clone())));
            stored.client_id = row
                .client_id
                .clone()
                .filter(|id| tables.clients.contains_key(&(state_code, id.clone())));
            upsert(
                &mut tables.cases,
                state_code,
                row.external_id.clone(),
                stored,
                &mut summary,
            );
        }

        let live: HashSet<&str> = rows.iter().map(|row| row.external_id.as_str()).collect();
        let pruned = prune(
            &mut tables.cases,
            state_code,
            |id| live.contains(id.as_str()),
            Clone::clone,
        );
        summary.record_pruned(pruned);
        Ok(summary)
    }

    async fn replace_opportunities(
        &self,
        state_code: StateCode,
        rows: &[OpportunityRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        let mut tables = self.tables.lock();
        let mut summary = ReconcileSummary::default();

        for row in rows {
            upsert(
                &mut tables.opportunities,
                state_code,
                row.key(),
                row.clone(),
                &mut summary,
            );
        }

        let live: HashSet<(String, String)> = rows.iter().map(|row| row.key()).collect();
        let pruned = prune(
            &mut tables.opportunities,
            state_code,
            |key| live.contains(key),
            |(name, provider)| format!("{name} / {provider}"),
        );
        summary.record_pruned(pruned);
        Ok(summary)
    }

    async fn replace_insights(
        &self,
        state_code: StateCode,
        rows: &[InsightRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        let mut tables = self.tables.lock();
        let mut summary = ReconcileSummary::default();

        for row in rows {
            for offense_name in row.offense_names() {
                tables
                    .offenses
                    .entry((state_code, offense_name.to_string()))
                    .or_insert_with(|| OffenseRow {
                        name: offense_name.to_string(),
                        is_sex_offense: None,
                        is_violent_offense: None,
                    });
            }
            upsert(
                &mut tables.insights,
                state_code,
                row.key(),
                row.clone(),
                &mut summary,
            );
        }

        let live: HashSet<InsightKey> = rows.iter().map(|row| row.key()).collect();
        let pruned = prune(
            &mut tables.insights,
            state_code,
            |key| live.contains(key),
            |key| {
                format!(
                    "{} {}-{} {}",
                    key.gender,
                    key.assessment_score_bucket_start,
                    key.assessment_score_bucket_end,
                    key.offense_name
                )
            },
        );
        summary.record_pruned(pruned);
        Ok(summary)
    }

    async fn replace_offenses(
        &self,
        state_code: StateCode,
        rows: &[OffenseRow],
    ) -> Result<ReconcileSummary, RepositoryError> {
        let mut tables = self.tables.lock();
        let mut summary = ReconcileSummary::default();

        for row in rows {
            upsert(
                &mut tables.offenses,
                state_code,
                row.name.clone(),
                row.clone(),
                &mut summary,
            );
        }

        let live: HashSet<&str> = rows.iter().map(|row| row.name.as_str()).collect();
        let pruned = prune(
            &mut tables.offenses,
            state_code,
            |name| live.contains(name.as_str()),
            Clone::clone,
        );
        summary.record_pruned(pruned);
        Ok(summary)
    }
}
