//! Identity lookup collaborator
//!
//! Resolves the lookup groups and institutions a user belongs to. The lookup
//! service is remote and may be slow or down; callers go through
//! [`resolve_memberships`], which never fails and degrades to empty
//! memberships.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::principal::Principal;

const USER_AGENT: &str = concat!("ump/", env!("CARGO_PKG_VERSION"));

/// Group and institution identifiers a principal belongs to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Memberships {
    pub group_ids: BTreeSet<String>,
    pub inst_ids: BTreeSet<String>,
}

impl Memberships {
    pub fn new(
        group_ids: impl IntoIterator<Item = impl Into<String>>,
        inst_ids: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            group_ids: group_ids.into_iter().map(Into::into).collect(),
            inst_ids: inst_ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.group_ids.is_empty() && self.inst_ids.is_empty()
    }
}

/// Identity lookup errors
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Lookup returned HTTP {0}")]
    Status(u16),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Lookup timed out after {0:?}")]
    Timeout(Duration),
}

/// Source of group/institution memberships keyed by crsid
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    async fn lookup_groups_and_institutions(&self, crsid: &str)
        -> Result<Memberships, LookupError>;
}

/// Lookup used when no lookup service is configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLookup;

#[async_trait]
impl IdentityLookup for NoLookup {
    async fn lookup_groups_and_institutions(
        &self,
        _crsid: &str,
    ) -> Result<Memberships, LookupError> {
        Ok(Memberships::default())
    }
}

#[derive(Debug, Deserialize)]
struct PersonResponse {
    #[serde(default)]
    groups: Vec<GroupEntry>,
    #[serde(default)]
    institutions: Vec<InstitutionEntry>,
}

#[derive(Debug, Deserialize)]
struct GroupEntry {
    groupid: String,
}

#[derive(Debug, Deserialize)]
struct InstitutionEntry {
    instid: String,
}

/// HTTP client for the lookup proxy
///
/// Queries `{base_url}/people/crsid/{crsid}?fetch=all_groups,all_insts`.
pub struct LookupProxyClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl LookupProxyClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl IdentityLookup for LookupProxyClient {
    async fn lookup_groups_and_institutions(
        &self,
        crsid: &str,
    ) -> Result<Memberships, LookupError> {
        let url = format!("{}/people/crsid/{}", self.base_url, crsid);

        let response = self
            .http_client
            .get(&url)
            .query(&[("fetch", "all_groups,all_insts")])
            .send()
            .await
            .map_err(|e| LookupError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LookupError::Status(status.as_u16()));
        }

        let person: PersonResponse = response
            .json()
            .await
            .map_err(|e| LookupError::Parse(e.to_string()))?;

        Ok(Memberships {
            group_ids: person.groups.into_iter().map(|g| g.groupid).collect(),
            inst_ids: person.institutions.into_iter().map(|i| i.instid).collect(),
        })
    }
}

/// Resolve memberships for a principal, best effort
///
/// Anonymous principals have no memberships and never hit the lookup. Lookup
/// errors and timeouts are logged and treated as "no memberships".
pub async fn resolve_memberships(
    lookup: &dyn IdentityLookup,
    principal: &Principal,
    timeout: Duration,
) -> Memberships {
    let Some(crsid) = principal.crsid() else {
        return Memberships::default();
    };

    match tokio::time::timeout(timeout, lookup.lookup_groups_and_institutions(crsid)).await {
        Ok(Ok(memberships)) => {
            debug!(
                crsid,
                groups = memberships.group_ids.len(),
                insts = memberships.inst_ids.len(),
                "Resolved lookup memberships"
            );
            memberships
        }
        Ok(Err(e)) => {
            warn!(crsid, "Identity lookup failed, assuming no memberships: {}", e);
            Memberships::default()
        }
        Err(_) => {
            warn!(
                crsid,
                "Identity lookup failed, assuming no memberships: {}",
                LookupError::Timeout(timeout)
            );
            Memberships::default()
        }
    }
}
