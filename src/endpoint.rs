//! Endpoint directory: resolves a cloud-account-name to a configured
//! vendor adapter, grounded in `provider.go`'s `New`/`getEndpointProvider`.

use std::collections::HashMap;

use anyhow::{Result, bail};

use crate::config::Endpoint;
use crate::vendor::{VendorAdapter, build, known_vendors};

pub struct EndpointDirectory {
    adapters: HashMap<String, VendorAdapter>,
}

impl std::fmt::Debug for EndpointDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointDirectory")
            .field("cloud_account_names", &self.adapters.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl EndpointDirectory {
    pub fn new(endpoints: Vec<Endpoint>) -> Result<Self> {
        let mut adapters = HashMap::with_capacity(endpoints.len());
        for endpoint in endpoints {
            if endpoint.cloud_account_name.is_empty() {
                bail!("the name of cloud account cannot be empty");
            }
            let adapter = build(&endpoint.vendor, endpoint.credentials.into()).ok_or_else(|| {
                anyhow::anyhow!(
                    "unknown vendor code: \"{}\", available vendor codes are: [{}]",
                    endpoint.vendor,
                    known_vendors().join(", ")
                )
            })?;
            if adapters.contains_key(&endpoint.cloud_account_name) {
                bail!(
                    "cloud account has existed, duplicated name: {}",
                    endpoint.cloud_account_name
                );
            }
            tracing::info!(
                vendor = %endpoint.vendor,
                cloud_account_name = %endpoint.cloud_account_name,
                "loaded provider for cloud account"
            );
            adapters.insert(endpoint.cloud_account_name, adapter);
        }
        Ok(Self { adapters })
    }

    pub fn lookup(&self, cloud_account_name: &str) -> Option<&VendorAdapter> {
        self.adapters.get(cloud_account_name)
    }
}
