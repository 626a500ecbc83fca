//! The remote directory as seen by the engine.

use async_trait::async_trait;
use crmsync_connector_halo::{
    AccessToken, HaloClient, HaloResult, RemoteContact, RemoteOrganization, RemoteSite,
};

/// A remote directory of organizations, contacts and sites.
#[async_trait]
pub trait DirectorySource: Send + Sync {
    async fn authenticate(&self) -> HaloResult<AccessToken>;

    async fn fetch_organizations(&self, token: &AccessToken)
        -> HaloResult<Vec<RemoteOrganization>>;

    async fn fetch_contacts(&self, token: &AccessToken) -> HaloResult<Vec<RemoteContact>>;

    async fn fetch_sites(&self, token: &AccessToken) -> HaloResult<Vec<RemoteSite>>;
}

#[async_trait]
impl DirectorySource for HaloClient {
    async fn authenticate(&self) -> HaloResult<AccessToken> {
        HaloClient::authenticate(self).await
    }

    async fn fetch_organizations(
        &self,
        token: &AccessToken,
    ) -> HaloResult<Vec<RemoteOrganization>> {
        HaloClient::fetch_organizations(self, token).await
    }

    async fn fetch_contacts(&self, token: &AccessToken) -> HaloResult<Vec<RemoteContact>> {
        HaloClient::fetch_contacts(self, token).await
    }

    async fn fetch_sites(&self, token: &AccessToken) -> HaloResult<Vec<RemoteSite>> {
        HaloClient::fetch_sites(self, token).await
    }
}
