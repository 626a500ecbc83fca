//! Runs a sync for one HTTP request.

use std::sync::Arc;

use crmsync_connector_halo::HaloClient;
use crmsync_reconcile::{
    RecordStore, SyncEngine, SyncOutcome, SyncRequest, WriteOptions, SOURCE_TAG,
};
use tracing::{info, instrument};

use crate::error::ApiError;
use crate::models::{SyncRequestBody, SyncStatusResponse};
use crate::settings::HaloEnvSettings;

/// Resolves settings, builds a Halo client and drives the engine.
pub struct DirectorySyncService {
    store: Arc<dyn RecordStore>,
    halo: HaloEnvSettings,
    write_options: WriteOptions,
}

impl DirectorySyncService {
    #[must_use]
    pub fn new(store: Arc<dyn RecordStore>, halo: HaloEnvSettings) -> Self {
        Self {
            store,
            halo,
            write_options: WriteOptions::default(),
        }
    }

    #[must_use]
    pub fn with_write_options(mut self, write_options: WriteOptions) -> Self {
        self.write_options = write_options;
        self
    }

    /// Runs one sync, or a connection test when `testOnly` is set.
    #[instrument(skip_all, fields(test_only = body.test_only))]
    pub async fn run(&self, body: SyncRequestBody) -> Result<SyncOutcome, ApiError> {
        // Credentials are environment-only; check them before reading the store.
        self.halo.credentials()?;
        let stored = self.store.find_settings(SOURCE_TAG).await?;
        let (config, credentials) = self.halo.resolve(stored.as_ref())?;

        info!(
            api_url = %config.api_url,
            tenant = ?config.tenant,
            "Starting Halo directory sync"
        );

        let client = HaloClient::new(config, credentials)?;
        let request = SyncRequest {
            test_only: body.test_only,
            field_mapping: body
                .field_mapping
                .map(|mapping| mapping.into_mapping())
                .unwrap_or_default(),
            excluded_organization_ids: self.halo.excluded_ids(stored.as_ref()),
            settings_id: stored.map(|settings| settings.id),
        };

        let engine =
            SyncEngine::new(Arc::clone(&self.store)).with_write_options(self.write_options);
        Ok(engine.run(&client, &request).await?)
    }

    /// Configuration state and last completed run.
    #[instrument(skip_all)]
    pub async fn status(&self) -> Result<SyncStatusResponse, ApiError> {
        let stored = self.store.find_settings(SOURCE_TAG).await?;
        let mut excluded_client_ids: Vec<String> =
            self.halo.excluded_ids(stored.as_ref()).into_iter().collect();
        excluded_client_ids.sort();

        Ok(SyncStatusResponse {
            configured: self.halo.is_configured(stored.as_ref()),
            last_sync_at: stored.and_then(|settings| settings.last_sync_at),
            excluded_client_ids,
        })
    }
}
