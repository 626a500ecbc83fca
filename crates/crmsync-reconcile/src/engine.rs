//! Reconciliation run.
//!
//! A run moves through a fixed sequence of phases:
//!
//! ```text
//! Authenticate → FetchOrganizations → [test only: sample and stop]
//!   → LoadLocalCustomers → Organizations (classify, update, create)
//!   → Contacts (fetch, classify, update, create)
//!   → Sites (fetch, classify, update, create)
//!   → RecordLastSync → Report
//! ```
//!
//! Authentication, the organization fetch and the initial customer load are
//! fatal. The contact and site phases degrade to a report warning. Individual
//! write failures are counted and never stop the run.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use crmsync_connector_halo::{exclude_organizations, RemoteContact, RemoteOrganization, RemoteSite};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::batch::{chunked, run_in_groups, BatchTally, WriteOptions};
use crate::error::{SyncResult, WriteError};
use crate::identity_map::RemoteIdentityMap;
use crate::mapper::{FieldDeriver, FieldMapping};
use crate::matcher::{site_name_key, IdentityIndex, MatchCandidate, MatchOutcome};
use crate::models::{
    contact_external_id, is_source_linked, organization_external_id, site_external_id,
    CustomerFields, CustomerFilter, LocalCustomer, LocalSite, SettingsPatch, SiteFields,
    SOURCE_TAG,
};
use crate::report::{EntityCounts, SyncReport};
use crate::source::DirectorySource;
use crate::store::{RecordStore, StoreResult};

/// Parameters of one run.
#[derive(Debug, Clone, Default)]
pub struct SyncRequest {
    /// Authenticate and sample organizations without touching the store.
    pub test_only: bool,
    pub field_mapping: FieldMapping,
    /// Remote organization ids to leave out.
    pub excluded_organization_ids: HashSet<String>,
    /// Settings record to stamp with the completion time.
    pub settings_id: Option<String>,
}

/// What a test-only run saw.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSample {
    pub count: usize,
    /// Sorted keys of the first organization record.
    pub sample_fields: Vec<String>,
    pub example: Option<Value>,
}

impl ConnectionSample {
    #[must_use]
    pub fn from_organizations(organizations: &[RemoteOrganization]) -> Self {
        let example = organizations.first().map(|org| org.record.clone());
        let mut sample_fields: Vec<String> = example
            .as_ref()
            .and_then(Value::as_object)
            .map(|record| record.keys().cloned().collect())
            .unwrap_or_default();
        sample_fields.sort();

        Self {
            count: organizations.len(),
            sample_fields,
            example,
        }
    }

    #[must_use]
    pub fn message(&self) -> String {
        format!("Connection successful. Found {} organizations.", self.count)
    }
}

/// Result of [`SyncEngine::run`].
#[derive(Debug, Clone)]
pub enum SyncOutcome {
    TestOnly(ConnectionSample),
    Completed(SyncReport),
}

/// State carried from phase to phase.
#[derive(Debug)]
struct RunContext {
    identity_map: RemoteIdentityMap,
    report: SyncReport,
}

impl RunContext {
    fn degrade(&mut self, phase: &str, error: &dyn std::fmt::Display) {
        warn!(phase = phase, error = %error, "Sync phase degraded");
        self.report
            .warnings
            .push(format!("{phase} not synced: {error}"));
    }
}

/// A remote record ready for identity resolution.
struct Candidate<F> {
    remote_id: String,
    email: String,
    match_name: String,
    fields: F,
}

struct PlannedUpdate<F> {
    local_id: String,
    remote_id: String,
    fields: F,
}

struct PlannedCreate<F> {
    remote_id: String,
    fields: F,
}

struct Classified<F> {
    to_update: Vec<PlannedUpdate<F>>,
    to_create: Vec<PlannedCreate<F>>,
    matched: usize,
    skipped: usize,
}

/// Write payloads the engine knows how to persist.
#[async_trait]
trait Writable: Send + Sync + Sized {
    type Record: Send;

    const ENTITY: &'static str;

    fn external_id(&self) -> &str;

    fn record_external_id(record: &Self::Record) -> Option<&str>;

    async fn update(store: &dyn RecordStore, id: &str, fields: &Self) -> StoreResult<Self::Record>;

    async fn bulk_create(store: &dyn RecordStore, batch: &[Self])
        -> StoreResult<Vec<Self::Record>>;
}

#[async_trait]
impl Writable for CustomerFields {
    type Record = LocalCustomer;

    const ENTITY: &'static str = "Customer";

    fn external_id(&self) -> &str {
        &self.external_id
    }

    fn record_external_id(record: &LocalCustomer) -> Option<&str> {
        record.external_id.as_deref()
    }

    async fn update(store: &dyn RecordStore, id: &str, fields: &Self) -> StoreResult<LocalCustomer> {
        store.update_customer(id, fields).await
    }

    async fn bulk_create(
        store: &dyn RecordStore,
        batch: &[Self],
    ) -> StoreResult<Vec<LocalCustomer>> {
        store.bulk_create_customers(batch).await
    }
}

#[async_trait]
impl Writable for SiteFields {
    type Record = LocalSite;

    const ENTITY: &'static str = "Site";

    fn external_id(&self) -> &str {
        &self.external_id
    }

    fn record_external_id(record: &LocalSite) -> Option<&str> {
        record.external_id.as_deref()
    }

    async fn update(store: &dyn RecordStore, id: &str, fields: &Self) -> StoreResult<LocalSite> {
        store.update_site(id, fields).await
    }

    async fn bulk_create(store: &dyn RecordStore, batch: &[Self]) -> StoreResult<Vec<LocalSite>> {
        store.bulk_create_sites(batch).await
    }
}

/// Adds a local record to `index`. Records already linked to this source are
/// reachable by external id only.
fn index_local(
    index: &mut IdentityIndex,
    local_id: &str,
    external_id: Option<&str>,
    email: &str,
    name: &str,
) {
    match external_id {
        Some(linked) if is_source_linked(Some(linked)) => index.insert_linked(local_id, linked),
        _ => index.insert(local_id, external_id, email, name),
    }
}

/// Resolves candidates against `index`.
///
/// A remote id seen twice in one fetch is written once; repeats count as
/// skipped. External-id matches claim their local record first, so a
/// fallback hit on a claimed record becomes a create.
fn classify<F: Writable>(
    candidates: Vec<Candidate<F>>,
    index: &IdentityIndex,
    mut skipped: usize,
) -> Classified<F> {
    let mut seen: HashSet<String> = HashSet::with_capacity(candidates.len());
    let resolved: Vec<(Candidate<F>, MatchOutcome)> = candidates
        .into_iter()
        .filter(|candidate| {
            if seen.insert(candidate.remote_id.clone()) {
                return true;
            }
            warn!(
                entity = F::ENTITY,
                remote_id = %candidate.remote_id,
                "Remote id repeated in fetch, keeping the first record"
            );
            skipped += 1;
            false
        })
        .map(|candidate| {
            let outcome = index.resolve(&MatchCandidate {
                external_id: candidate.fields.external_id(),
                email: &candidate.email,
                name: &candidate.match_name,
            });
            (candidate, outcome)
        })
        .collect();

    let mut claimed: HashSet<String> = resolved
        .iter()
        .filter_map(|(_, outcome)| match outcome {
            MatchOutcome::ExternalId(id) => Some(id.clone()),
            _ => None,
        })
        .collect();

    let mut classified = Classified {
        to_update: Vec::new(),
        to_create: Vec::new(),
        matched: 0,
        skipped,
    };

    for (candidate, outcome) in resolved {
        let Candidate {
            remote_id, fields, ..
        } = candidate;
        match outcome {
            MatchOutcome::ExternalId(local_id) => classified.to_update.push(PlannedUpdate {
                local_id,
                remote_id,
                fields,
            }),
            MatchOutcome::Email(ref local_id) | MatchOutcome::Name(ref local_id)
                if claimed.insert(local_id.clone()) =>
            {
                info!(
                    entity = F::ENTITY,
                    remote_id = %remote_id,
                    local_id = %local_id,
                    matched_by = outcome.as_str(),
                    "Linked existing record by fallback match"
                );
                classified.matched += 1;
                classified.to_update.push(PlannedUpdate {
                    local_id: local_id.clone(),
                    remote_id,
                    fields,
                });
            }
            MatchOutcome::Email(_) | MatchOutcome::Name(_) => {
                debug!(
                    entity = F::ENTITY,
                    remote_id = %remote_id,
                    "Fallback match already linked this run, creating a new record"
                );
                classified
                    .to_create
                    .push(PlannedCreate { remote_id, fields });
            }
            MatchOutcome::Unmatched => classified
                .to_create
                .push(PlannedCreate { remote_id, fields }),
        }
    }

    classified
}

/// Reconciles a remote directory into a [`RecordStore`].
pub struct SyncEngine {
    store: Arc<dyn RecordStore>,
    options: WriteOptions,
}

impl SyncEngine {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            options: WriteOptions::default(),
        }
    }

    #[must_use]
    pub fn with_write_options(mut self, options: WriteOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    /// Executes one run.
    #[instrument(skip_all, fields(test_only = request.test_only, store = self.store.store_type()))]
    pub async fn run(
        &self,
        source: &dyn DirectorySource,
        request: &SyncRequest,
    ) -> SyncResult<SyncOutcome> {
        let started_at = Utc::now();

        let token = source.authenticate().await?;
        let organizations = source.fetch_organizations(&token).await?;
        let total_organizations = organizations.len();
        let (organizations, excluded_organizations) =
            exclude_organizations(organizations, &request.excluded_organization_ids);

        info!(
            total = total_organizations,
            excluded = excluded_organizations,
            "Fetched organizations"
        );

        if request.test_only {
            return Ok(SyncOutcome::TestOnly(ConnectionSample::from_organizations(
                &organizations,
            )));
        }

        let customers = self.store.list_customers().await?;
        let deriver = FieldDeriver::new(request.field_mapping.clone());

        let mut ctx = RunContext {
            identity_map: RemoteIdentityMap::new(),
            report: SyncReport::new(started_at),
        };
        ctx.report.total_organizations = total_organizations;
        ctx.report.excluded_organizations = excluded_organizations;

        self.sync_organizations(&deriver, &organizations, &customers, &mut ctx)
            .await;

        match source.fetch_contacts(&token).await {
            Ok(contacts) => {
                if let Err(e) = self.sync_contacts(&deriver, &contacts, &mut ctx).await {
                    ctx.degrade("Contacts", &e);
                }
            }
            Err(e) => ctx.degrade("Contacts", &e),
        }

        match source.fetch_sites(&token).await {
            Ok(sites) => {
                if let Err(e) = self.sync_sites(&deriver, &sites, &mut ctx).await {
                    ctx.degrade("Sites", &e);
                }
            }
            Err(e) => ctx.degrade("Sites", &e),
        }

        if let Some(settings_id) = &request.settings_id {
            self.record_last_sync(settings_id, &mut ctx).await;
        }

        let mut report = ctx.report;
        report.finished_at = Some(Utc::now());

        info!(
            organizations_created = report.organizations.created,
            organizations_updated = report.organizations.updated,
            contacts_created = report.contacts.created,
            contacts_updated = report.contacts.updated,
            sites_created = report.sites.created,
            sites_updated = report.sites.updated,
            failed = report.organizations.failed + report.contacts.failed + report.sites.failed,
            duration_ms = ?report.duration_ms(),
            "Sync completed"
        );

        Ok(SyncOutcome::Completed(report))
    }

    #[instrument(skip_all, fields(count = organizations.len()))]
    async fn sync_organizations(
        &self,
        deriver: &FieldDeriver,
        organizations: &[RemoteOrganization],
        customers: &[LocalCustomer],
        ctx: &mut RunContext,
    ) {
        let mut index = IdentityIndex::new();
        for customer in customers.iter().filter(|c| !c.is_synced_contact()) {
            index_local(
                &mut index,
                &customer.id,
                customer.external_id.as_deref(),
                &customer.email,
                &customer.name,
            );
        }

        let candidates = organizations
            .iter()
            .map(|org| {
                let details = deriver.organization(org);
                Candidate {
                    remote_id: org.id.clone(),
                    email: details.email.clone(),
                    match_name: details.name.clone(),
                    fields: CustomerFields {
                        name: details.name,
                        email: details.email,
                        phone: details.phone,
                        address: Some(details.address),
                        city: Some(details.city),
                        state: Some(details.state),
                        zip: Some(details.zip),
                        external_id: organization_external_id(&org.id),
                        is_company: true,
                        source: SOURCE_TAG.to_string(),
                        company_id: None,
                        company_name: None,
                    },
                }
            })
            .collect();

        let classified = classify(candidates, &index, 0);
        let report = &mut ctx.report;
        let written = self
            .write_planned(classified, &mut report.organizations, &mut report.failures)
            .await;

        for (remote_id, customer) in written {
            ctx.identity_map.insert(remote_id, customer.id, customer.name);
        }

        debug!(linked = ctx.identity_map.len(), "Organization identity map ready");
    }

    #[instrument(skip_all, fields(count = contacts.len()))]
    async fn sync_contacts(
        &self,
        deriver: &FieldDeriver,
        contacts: &[RemoteContact],
        ctx: &mut RunContext,
    ) -> StoreResult<()> {
        let existing = self
            .store
            .filter_customers(&CustomerFilter::synced_contacts())
            .await?;

        let mut index = IdentityIndex::new();
        for contact in &existing {
            index_local(
                &mut index,
                &contact.id,
                contact.external_id.as_deref(),
                &contact.email,
                &contact.name,
            );
        }

        let mut skipped = 0;
        let mut candidates = Vec::with_capacity(contacts.len());
        for contact in contacts {
            let Some(parent) = ctx
                .identity_map
                .parent_of(contact.organization_id.as_deref())
            else {
                debug!(
                    remote_id = %contact.id,
                    organization_id = ?contact.organization_id,
                    "Skipping contact without a synchronized organization"
                );
                skipped += 1;
                continue;
            };

            let details = deriver.contact(contact);
            candidates.push(Candidate {
                remote_id: contact.id.clone(),
                email: details.email.clone(),
                match_name: details.name.clone(),
                fields: CustomerFields {
                    name: details.name,
                    email: details.email,
                    phone: details.phone,
                    address: None,
                    city: None,
                    state: None,
                    zip: None,
                    external_id: contact_external_id(&contact.id),
                    is_company: false,
                    source: SOURCE_TAG.to_string(),
                    company_id: Some(parent.local_id.clone()),
                    company_name: Some(parent.local_name.clone()),
                },
            });
        }

        let classified = classify(candidates, &index, skipped);
        let report = &mut ctx.report;
        self.write_planned(classified, &mut report.contacts, &mut report.failures)
            .await;
        Ok(())
    }

    #[instrument(skip_all, fields(count = sites.len()))]
    async fn sync_sites(
        &self,
        deriver: &FieldDeriver,
        sites: &[RemoteSite],
        ctx: &mut RunContext,
    ) -> StoreResult<()> {
        let existing = self.store.list_sites().await?;

        let mut index = IdentityIndex::new();
        for site in &existing {
            let name_key = site
                .customer_id
                .as_deref()
                .map(|customer_id| site_name_key(customer_id, &site.name))
                .unwrap_or_default();
            index_local(&mut index, &site.id, site.external_id.as_deref(), "", &name_key);
        }

        let mut skipped = 0;
        let mut candidates = Vec::with_capacity(sites.len());
        for site in sites {
            let Some(parent) = ctx.identity_map.parent_of(site.organization_id.as_deref()) else {
                debug!(
                    remote_id = %site.id,
                    organization_id = ?site.organization_id,
                    "Skipping site without a synchronized organization"
                );
                skipped += 1;
                continue;
            };

            let details = deriver.site(site);
            candidates.push(Candidate {
                remote_id: site.id.clone(),
                email: String::new(),
                match_name: site_name_key(&parent.local_id, &details.name),
                fields: SiteFields {
                    name: details.name,
                    address: details.address,
                    city: details.city,
                    state: details.state,
                    zip: details.zip,
                    external_id: site_external_id(&site.id),
                    customer_id: parent.local_id.clone(),
                    is_default: details.is_default,
                },
            });
        }

        let classified = classify(candidates, &index, skipped);
        let report = &mut ctx.report;
        self.write_planned(classified, &mut report.sites, &mut report.failures)
            .await;
        Ok(())
    }

    /// Writes updates then creates. Returns `(remote id, written record)` for
    /// every successful write.
    async fn write_planned<F: Writable>(
        &self,
        classified: Classified<F>,
        counts: &mut EntityCounts,
        failures: &mut Vec<WriteError>,
    ) -> Vec<(String, F::Record)> {
        let store = self.store.as_ref();
        counts.matched += classified.matched;
        counts.skipped += classified.skipped;

        let mut written = Vec::with_capacity(classified.to_update.len() + classified.to_create.len());

        let mut updates = BatchTally::new();
        let results = run_in_groups(
            classified.to_update,
            self.options.update_group_size,
            |planned: PlannedUpdate<F>| async move {
                let result = F::update(store, &planned.local_id, &planned.fields).await;
                (planned, result)
            },
        )
        .await;

        for (planned, result) in results {
            match result {
                Ok(record) => {
                    updates.record_success();
                    written.push((planned.remote_id, record));
                }
                Err(e) => {
                    warn!(
                        entity = F::ENTITY,
                        local_id = %planned.local_id,
                        external_id = %planned.fields.external_id(),
                        error = %e,
                        "Update failed"
                    );
                    updates.record_failure(1, WriteError::new(planned.fields.external_id(), &e));
                }
            }
        }

        let mut creates = BatchTally::new();
        for batch in chunked(classified.to_create, self.options.create_batch_size) {
            let (remote_ids, batch): (Vec<String>, Vec<F>) = batch
                .into_iter()
                .map(|planned| (planned.remote_id, planned.fields))
                .unzip();
            let target = format!("batch of {} {} records", batch.len(), F::ENTITY);

            debug!(entity = F::ENTITY, size = batch.len(), "Writing create batch");

            match F::bulk_create(store, &batch).await {
                Ok(records) => {
                    let returned = records.len();
                    let complete = returned == batch.len();
                    let by_external_id: HashMap<&str, &str> = batch
                        .iter()
                        .map(|fields| fields.external_id())
                        .zip(remote_ids.iter().map(String::as_str))
                        .collect();

                    for (position, record) in records.into_iter().enumerate() {
                        creates.record_success();
                        let remote_id = F::record_external_id(&record)
                            .and_then(|external_id| by_external_id.get(external_id).copied())
                            .or_else(|| {
                                complete
                                    .then(|| remote_ids.get(position).map(String::as_str))
                                    .flatten()
                            });
                        if let Some(remote_id) = remote_id {
                            written.push((remote_id.to_string(), record));
                        }
                    }

                    let missing = batch.len().saturating_sub(returned);
                    if missing > 0 {
                        warn!(
                            entity = F::ENTITY,
                            sent = batch.len(),
                            returned = returned,
                            "Store returned fewer records than were created"
                        );
                        creates.record_failure(
                            missing,
                            WriteError {
                                target,
                                message: format!(
                                    "store returned {returned} of {} records",
                                    batch.len()
                                ),
                            },
                        );
                    }
                }
                Err(e) => {
                    warn!(
                        entity = F::ENTITY,
                        size = batch.len(),
                        error = %e,
                        "Create batch failed"
                    );
                    creates.record_failure(batch.len(), WriteError::new(target, &e));
                }
            }
        }

        counts.updated += updates.succeeded;
        counts.created += creates.succeeded;
        counts.failed += updates.failed + creates.failed;

        info!(
            entity = F::ENTITY,
            created = creates.succeeded,
            updated = updates.succeeded,
            matched = classified.matched,
            skipped = classified.skipped,
            failed = updates.failed + creates.failed,
            "Write phase finished"
        );

        updates.merge(creates);
        failures.extend(updates.failures);
        written
    }

    #[instrument(skip(self, ctx))]
    async fn record_last_sync(&self, settings_id: &str, ctx: &mut RunContext) {
        let now = Utc::now();
        let patch = SettingsPatch {
            last_sync_at: Some(now),
        };
        match self.store.update_settings(settings_id, &patch).await {
            Ok(_) => ctx.report.last_sync_at = Some(now),
            Err(e) => warn!(error = %e, "Failed to record last sync time"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::IntegrationSettings;
    use crate::store::{create_each, InMemoryStore, StoreError};
    use crmsync_connector_halo::{AccessToken, HaloError, HaloResult};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeDirectory {
        organizations: Vec<Value>,
        contacts: Vec<Value>,
        sites: Vec<Value>,
        reject_auth: bool,
        fail_contacts: bool,
    }

    #[async_trait]
    impl DirectorySource for FakeDirectory {
        async fn authenticate(&self) -> HaloResult<AccessToken> {
            if self.reject_auth {
                return Err(HaloError::Authentication {
                    url: "http://halo.test/auth/token".into(),
                    status: 401,
                    body: "invalid_client".into(),
                });
            }
            Ok(AccessToken::new("token"))
        }

        async fn fetch_organizations(
            &self,
            _token: &AccessToken,
        ) -> HaloResult<Vec<RemoteOrganization>> {
            Ok(self
                .organizations
                .iter()
                .cloned()
                .filter_map(RemoteOrganization::from_json)
                .collect())
        }

        async fn fetch_contacts(&self, _token: &AccessToken) -> HaloResult<Vec<RemoteContact>> {
            if self.fail_contacts {
                return Err(HaloError::RemoteApi {
                    url: "http://halo.test/api/Users".into(),
                    status: 500,
                    body: "boom".into(),
                });
            }
            Ok(self
                .contacts
                .iter()
                .cloned()
                .filter_map(RemoteContact::from_json)
                .collect())
        }

        async fn fetch_sites(&self, _token: &AccessToken) -> HaloResult<Vec<RemoteSite>> {
            Ok(self
                .sites
                .iter()
                .cloned()
                .filter_map(RemoteSite::from_json)
                .collect())
        }
    }

    /// Wraps the in-memory store, recording bulk sizes and failing selected writes.
    #[derive(Default)]
    struct FlakyStore {
        inner: InMemoryStore,
        fail_updates_for: HashSet<String>,
        fail_creates_for: HashSet<String>,
        fail_site_creates: bool,
        customer_batches: Mutex<Vec<usize>>,
    }

    fn refused(url: &str) -> StoreError {
        StoreError::Status {
            url: url.into(),
            status: 500,
            body: "refused".into(),
        }
    }

    #[async_trait]
    impl RecordStore for FlakyStore {
        async fn list_customers(&self) -> StoreResult<Vec<LocalCustomer>> {
            self.inner.list_customers().await
        }

        async fn filter_customers(
            &self,
            filter: &CustomerFilter,
        ) -> StoreResult<Vec<LocalCustomer>> {
            self.inner.filter_customers(filter).await
        }

        async fn create_customer(&self, fields: &CustomerFields) -> StoreResult<LocalCustomer> {
            if self.fail_creates_for.contains(&fields.external_id) {
                return Err(refused("memory://Customer"));
            }
            self.inner.create_customer(fields).await
        }

        async fn bulk_create_customers(
            &self,
            batch: &[CustomerFields],
        ) -> StoreResult<Vec<LocalCustomer>> {
            self.customer_batches.lock().unwrap().push(batch.len());
            create_each(self, batch).await
        }

        async fn update_customer(
            &self,
            id: &str,
            fields: &CustomerFields,
        ) -> StoreResult<LocalCustomer> {
            if self.fail_updates_for.contains(&fields.external_id) {
                return Err(refused("memory://Customer"));
            }
            self.inner.update_customer(id, fields).await
        }

        async fn list_sites(&self) -> StoreResult<Vec<LocalSite>> {
            self.inner.list_sites().await
        }

        async fn bulk_create_sites(&self, batch: &[SiteFields]) -> StoreResult<Vec<LocalSite>> {
            if self.fail_site_creates {
                return Err(refused("memory://Site/bulk"));
            }
            self.inner.bulk_create_sites(batch).await
        }

        async fn update_site(&self, id: &str, fields: &SiteFields) -> StoreResult<LocalSite> {
            self.inner.update_site(id, fields).await
        }

        async fn find_settings(
            &self,
            provider: &str,
        ) -> StoreResult<Option<IntegrationSettings>> {
            self.inner.find_settings(provider).await
        }

        async fn update_settings(
            &self,
            id: &str,
            patch: &SettingsPatch,
        ) -> StoreResult<IntegrationSettings> {
            self.inner.update_settings(id, patch).await
        }

        fn store_type(&self) -> &'static str {
            "flaky"
        }
    }

    fn directory() -> FakeDirectory {
        FakeDirectory {
            organizations: vec![
                json!({"id": 1, "name": "Acme", "main_phone": "555-0100"}),
                json!({"id": 2, "name": "Globex", "email": "info@globex.com"}),
            ],
            contacts: vec![
                json!({"id": 10, "name": "Jane Doe", "client_id": 1, "emailaddress": "jane@acme.com"}),
                json!({"id": 11, "name": "John Roe", "client_id": 2}),
            ],
            sites: vec![
                json!({"id": 20, "name": "HQ", "client_id": 1, "isdefault": true}),
                json!({"id": 21, "name": "HQ", "client_id": 2}),
            ],
            ..Default::default()
        }
    }

    async fn completed(engine: &SyncEngine, source: &FakeDirectory) -> SyncReport {
        match engine.run(source, &SyncRequest::default()).await.unwrap() {
            SyncOutcome::Completed(report) => report,
            SyncOutcome::TestOnly(_) => panic!("expected a completed run"),
        }
    }

    fn company(id: &str, name: &str, email: &str) -> LocalCustomer {
        LocalCustomer {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            is_company: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_first_run_creates_organization() {
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(store.clone());
        let source = FakeDirectory {
            organizations: vec![json!({"id": 1, "name": "Acme"})],
            ..Default::default()
        };

        let report = completed(&engine, &source).await;

        assert_eq!(report.organizations.created, 1);
        assert_eq!(report.organizations.matched, 0);
        let customers = store.customers().await;
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].external_id.as_deref(), Some("halo_1"));
        assert!(customers[0].is_company);
        assert_eq!(customers[0].source.as_deref(), Some(SOURCE_TAG));
    }

    #[tokio::test]
    async fn test_name_match_links_existing_customer() {
        let store = Arc::new(InMemoryStore::new().with_customers(vec![company("c1", "acme ", "")]));
        let engine = SyncEngine::new(store.clone());
        let source = FakeDirectory {
            organizations: vec![json!({"id": 1, "name": "Acme"})],
            ..Default::default()
        };

        let report = completed(&engine, &source).await;

        assert_eq!(report.organizations.updated, 1);
        assert_eq!(report.organizations.matched, 1);
        assert_eq!(report.organizations.created, 0);
        let customers = store.customers().await;
        assert_eq!(customers.len(), 1);
        assert_eq!(customers[0].id, "c1");
        assert_eq!(customers[0].external_id.as_deref(), Some("halo_1"));
    }

    #[tokio::test]
    async fn test_email_match_links_existing_customer() {
        let store = Arc::new(
            InMemoryStore::new().with_customers(vec![company("c9", "Globex Corp", "INFO@globex.com")]),
        );
        let engine = SyncEngine::new(store.clone());
        let source = FakeDirectory {
            organizations: vec![json!({"id": 2, "name": "Globex", "email": "info@globex.com"})],
            ..Default::default()
        };

        let report = completed(&engine, &source).await;

        assert_eq!(report.organizations.matched, 1);
        let customers = store.customers().await;
        assert_eq!(customers[0].name, "Globex");
        assert_eq!(customers[0].external_id.as_deref(), Some("halo_2"));
    }

    #[tokio::test]
    async fn test_rerun_is_idempotent() {
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(store.clone());
        let source = directory();

        let first = completed(&engine, &source).await;
        assert_eq!(first.organizations.created, 2);
        assert_eq!(first.contacts.created, 2);
        assert_eq!(first.sites.created, 2);

        let second = completed(&engine, &source).await;
        assert_eq!(second.organizations.created, 0);
        assert_eq!(second.organizations.updated, 2);
        assert_eq!(second.organizations.matched, 0);
        assert_eq!(second.contacts.created, 0);
        assert_eq!(second.contacts.updated, 2);
        assert_eq!(second.sites.created, 0);
        assert_eq!(second.sites.updated, 2);

        assert_eq!(store.customers().await.len(), 4);
        assert_eq!(store.sites().await.len(), 2);
    }

    #[tokio::test]
    async fn test_contacts_link_to_parent() {
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(store.clone());

        completed(&engine, &directory()).await;

        let customers = store.customers().await;
        let acme = customers
            .iter()
            .find(|c| c.external_id.as_deref() == Some("halo_1"))
            .unwrap();
        let jane = customers
            .iter()
            .find(|c| c.external_id.as_deref() == Some("halo_contact_10"))
            .unwrap();
        assert!(!jane.is_company);
        assert_eq!(jane.company_id.as_deref(), Some(acme.id.as_str()));
        assert_eq!(jane.company_name.as_deref(), Some("Acme"));
        assert_eq!(jane.email, "jane@acme.com");
    }

    #[tokio::test]
    async fn test_orphans_are_skipped() {
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(store.clone());
        let mut source = directory();
        source
            .contacts
            .push(json!({"id": 12, "name": "Nobody", "client_id": 99}));
        source.contacts.push(json!({"id": 13, "name": "Unassigned"}));
        source.sites.push(json!({"id": 22, "name": "Depot", "client_id": 99}));

        let report = completed(&engine, &source).await;

        assert_eq!(report.contacts.created, 2);
        assert_eq!(report.contacts.skipped, 2);
        assert_eq!(report.sites.skipped, 1);
        assert!(!store
            .customers()
            .await
            .iter()
            .any(|c| c.external_id.as_deref() == Some("halo_contact_12")));
    }

    #[tokio::test]
    async fn test_excluded_organizations_and_their_children() {
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(store.clone());
        let request = SyncRequest {
            excluded_organization_ids: HashSet::from(["2".to_string()]),
            ..Default::default()
        };

        let SyncOutcome::Completed(report) = engine.run(&directory(), &request).await.unwrap() else {
            panic!("expected a completed run");
        };

        assert_eq!(report.total_organizations, 2);
        assert_eq!(report.excluded_organizations, 1);
        assert_eq!(report.organizations.created, 1);
        assert_eq!(report.contacts.skipped, 1);
        assert_eq!(report.sites.skipped, 1);
    }

    #[tokio::test]
    async fn test_test_only_never_touches_store() {
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(store.clone());
        let request = SyncRequest {
            test_only: true,
            excluded_organization_ids: HashSet::from(["1".to_string()]),
            ..Default::default()
        };

        let outcome = engine.run(&directory(), &request).await.unwrap();

        let SyncOutcome::TestOnly(sample) = outcome else {
            panic!("expected a connection sample");
        };
        assert_eq!(sample.count, 1);
        assert_eq!(sample.sample_fields, vec!["email", "id", "name"]);
        assert_eq!(sample.example.unwrap()["name"], "Globex");
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_authentication_failure_aborts() {
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(store.clone());
        let source = FakeDirectory {
            reject_auth: true,
            ..directory()
        };

        let err = engine
            .run(&source, &SyncRequest::default())
            .await
            .unwrap_err();

        assert!(matches!(err, crate::SyncError::Remote(ref e) if e.is_authentication()));
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_contact_fetch_failure_degrades() {
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(store.clone());
        let source = FakeDirectory {
            fail_contacts: true,
            ..directory()
        };

        let report = completed(&engine, &source).await;

        assert_eq!(report.organizations.created, 2);
        assert_eq!(report.contacts, EntityCounts::default());
        assert_eq!(report.sites.created, 2);
        assert_eq!(report.warnings.len(), 1);
        assert!(report.warnings[0].starts_with("Contacts not synced"));
    }

    #[tokio::test]
    async fn test_update_failure_is_isolated() {
        let inner = InMemoryStore::new().with_customers(vec![
            LocalCustomer {
                external_id: Some("halo_1".into()),
                ..company("c1", "Acme", "")
            },
            LocalCustomer {
                external_id: Some("halo_2".into()),
                ..company("c2", "Globex", "")
            },
        ]);
        let store = Arc::new(FlakyStore {
            inner,
            fail_updates_for: HashSet::from(["halo_1".to_string()]),
            ..Default::default()
        });
        let engine = SyncEngine::new(store.clone());

        let report = completed(&engine, &directory()).await;

        assert_eq!(report.organizations.updated, 1);
        assert_eq!(report.organizations.failed, 1);
        assert_eq!(report.failures[0].target, "halo_1");
        // Acme failed to write, so its contact and site have no parent.
        assert_eq!(report.contacts.created, 1);
        assert_eq!(report.contacts.skipped, 1);
        assert_eq!(report.sites.skipped, 1);
    }

    #[tokio::test]
    async fn test_failed_create_batch_is_counted() {
        let store = Arc::new(FlakyStore {
            fail_site_creates: true,
            ..Default::default()
        });
        let engine = SyncEngine::new(store.clone());

        let report = completed(&engine, &directory()).await;

        assert_eq!(report.sites.created, 0);
        assert_eq!(report.sites.failed, 2);
        assert!(report.warnings.is_empty());
        assert!(report
            .failures
            .iter()
            .any(|f| f.target == "batch of 2 Site records"));
    }

    #[tokio::test]
    async fn test_creates_are_chunked() {
        let store = Arc::new(FlakyStore::default());
        let engine = SyncEngine::new(store.clone());
        let source = FakeDirectory {
            organizations: (1..=120)
                .map(|i| json!({"id": i, "name": format!("Org {i}")}))
                .collect(),
            ..Default::default()
        };

        let report = completed(&engine, &source).await;

        assert_eq!(report.organizations.created, 120);
        assert_eq!(*store.customer_batches.lock().unwrap(), vec![50, 50, 20]);
    }

    #[tokio::test]
    async fn test_fallback_match_is_claimed_once() {
        let store = Arc::new(InMemoryStore::new().with_customers(vec![company("c1", "Acme", "")]));
        let engine = SyncEngine::new(store.clone());
        let source = FakeDirectory {
            organizations: vec![
                json!({"id": 1, "name": "Acme"}),
                json!({"id": 2, "name": "ACME"}),
            ],
            ..Default::default()
        };

        let report = completed(&engine, &source).await;

        assert_eq!(report.organizations.matched, 1);
        assert_eq!(report.organizations.updated, 1);
        assert_eq!(report.organizations.created, 1);
        assert_eq!(store.customers().await.len(), 2);
    }

    #[tokio::test]
    async fn test_repeated_remote_id_written_once() {
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(store.clone());
        let source = FakeDirectory {
            organizations: vec![
                json!({"id": 1, "name": "Acme"}),
                json!({"id": 1, "name": "Acme"}),
            ],
            contacts: vec![
                json!({"id": 10, "name": "Jane Doe", "client_id": 1}),
                json!({"id": 10, "name": "Jane Doe", "client_id": 1}),
            ],
            ..Default::default()
        };

        let report = completed(&engine, &source).await;

        assert_eq!(report.organizations.created, 1);
        assert_eq!(report.organizations.skipped, 1);
        assert_eq!(report.contacts.created, 1);
        assert_eq!(report.contacts.skipped, 1);
        let customers = store.customers().await;
        assert_eq!(customers.len(), 2);
        assert_eq!(
            customers
                .iter()
                .filter(|c| c.external_id.as_deref() == Some("halo_1"))
                .count(),
            1
        );
    }

    #[tokio::test]
    async fn test_linked_record_not_taken_by_fallback() {
        let store = Arc::new(InMemoryStore::new().with_customers(vec![LocalCustomer {
            external_id: Some("halo_5".into()),
            source: Some(SOURCE_TAG.into()),
            ..company("c1", "Acme", "billing@acme.com")
        }]));
        let engine = SyncEngine::new(store.clone());
        let source = FakeDirectory {
            organizations: vec![json!({"id": 6, "name": "Acme", "email": "billing@acme.com"})],
            ..Default::default()
        };

        let report = completed(&engine, &source).await;

        assert_eq!(report.organizations.matched, 0);
        assert_eq!(report.organizations.created, 1);
        let customers = store.customers().await;
        let original = customers.iter().find(|c| c.id == "c1").unwrap();
        assert_eq!(original.external_id.as_deref(), Some("halo_5"));
        assert!(customers
            .iter()
            .any(|c| c.id != "c1" && c.external_id.as_deref() == Some("halo_6")));
    }

    #[tokio::test]
    async fn test_partial_create_batch_keeps_persisted_records() {
        let store = Arc::new(FlakyStore {
            fail_creates_for: HashSet::from(["halo_1".to_string()]),
            ..Default::default()
        });
        let engine = SyncEngine::new(store.clone());

        let report = completed(&engine, &directory()).await;

        assert_eq!(report.organizations.created, 1);
        assert_eq!(report.organizations.failed, 1);
        assert!(report
            .failures
            .iter()
            .any(|f| f.target == "batch of 2 Customer records"
                && f.message.contains("returned 1 of 2")));
        // Globex was persisted, so its contact and site still link.
        assert_eq!(report.contacts.created, 1);
        assert_eq!(report.contacts.skipped, 1);
        assert_eq!(report.sites.created, 1);
        assert_eq!(report.sites.skipped, 1);
        let customers = store.inner.customers().await;
        let globex = customers
            .iter()
            .find(|c| c.external_id.as_deref() == Some("halo_2"))
            .unwrap();
        let john = customers
            .iter()
            .find(|c| c.external_id.as_deref() == Some("halo_contact_11"))
            .unwrap();
        assert_eq!(john.company_id.as_deref(), Some(globex.id.as_str()));
    }

    #[tokio::test]
    async fn test_site_names_match_within_customer_only() {
        let store = Arc::new(
            InMemoryStore::new()
                .with_customers(vec![
                    LocalCustomer {
                        external_id: Some("halo_1".into()),
                        ..company("c1", "Acme", "")
                    },
                    LocalCustomer {
                        external_id: Some("halo_2".into()),
                        ..company("c2", "Globex", "")
                    },
                ])
                .with_sites(vec![LocalSite {
                    id: "s1".into(),
                    name: "HQ".into(),
                    customer_id: Some("c1".into()),
                    ..Default::default()
                }]),
        );
        let engine = SyncEngine::new(store.clone());

        let report = completed(&engine, &directory()).await;

        assert_eq!(report.sites.matched, 1);
        assert_eq!(report.sites.updated, 1);
        assert_eq!(report.sites.created, 1);
        let sites = store.sites().await;
        let linked = sites.iter().find(|s| s.id == "s1").unwrap();
        assert_eq!(linked.external_id.as_deref(), Some("halo_site_20"));
        assert!(linked.is_default);
    }

    #[tokio::test]
    async fn test_last_sync_recorded() {
        let store = Arc::new(InMemoryStore::new().with_settings(IntegrationSettings {
            id: "settings-1".into(),
            provider: SOURCE_TAG.into(),
            ..Default::default()
        }));
        let engine = SyncEngine::new(store.clone());
        let request = SyncRequest {
            settings_id: Some("settings-1".into()),
            ..Default::default()
        };

        let SyncOutcome::Completed(report) = engine.run(&directory(), &request).await.unwrap() else {
            panic!("expected a completed run");
        };

        let stamped = store.settings().await[0].last_sync_at;
        assert!(stamped.is_some());
        assert_eq!(report.last_sync_at, stamped);
    }

    #[tokio::test]
    async fn test_missing_settings_record_is_not_fatal() {
        let engine = SyncEngine::new(Arc::new(InMemoryStore::new()));
        let request = SyncRequest {
            settings_id: Some("missing".into()),
            ..Default::default()
        };

        let outcome = engine.run(&directory(), &request).await.unwrap();
        let SyncOutcome::Completed(report) = outcome else {
            panic!("expected a completed run");
        };
        assert!(report.last_sync_at.is_none());
    }

    #[tokio::test]
    async fn test_small_update_groups() {
        let store = Arc::new(InMemoryStore::new());
        let engine = SyncEngine::new(store.clone()).with_write_options(WriteOptions {
            update_group_size: 1,
            create_batch_size: 1,
        });

        completed(&engine, &directory()).await;
        let report = completed(&engine, &directory()).await;

        assert_eq!(report.organizations.updated, 2);
        assert_eq!(report.contacts.updated, 2);
        assert_eq!(store.customers().await.len(), 4);
    }
}
