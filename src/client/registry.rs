//! One connection pool per profile, built up front and closed explicitly.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{PgPool, QueryGateway};
use crate::error::{BenchError, Result};
use crate::profile::{Profile, ProfileSet};

/// Owns the pools for the profiles a run needs.
pub struct ConnectionRegistry {
    pools: BTreeMap<Profile, PgPool>,
}

impl ConnectionRegistry {
    /// Create a pool for each requested profile. No connection is opened yet.
    pub fn build(
        profiles: impl IntoIterator<Item = Profile>,
        settings: &ProfileSet,
    ) -> Result<Self> {
        let mut pools = BTreeMap::new();
        for profile in profiles {
            if pools.contains_key(&profile) {
                continue;
            }
            let profile_settings = settings.get(profile);
            log::info!(
                "[{}] Pool for {}:{} (max {} connections)",
                profile,
                profile_settings.host,
                profile_settings.port,
                profile_settings.pool_max
            );
            pools.insert(profile, PgPool::new(profile.as_str(), profile_settings)?);
        }
        Ok(Self { pools })
    }

    pub fn gateway(&self, profile: Profile) -> Result<Arc<dyn QueryGateway>> {
        self.pools
            .get(&profile)
            .map(|pool| Arc::new(pool.clone()) as Arc<dyn QueryGateway>)
            .ok_or_else(|| {
                BenchError::Config(format!("no connection pool registered for '{}'", profile))
            })
    }

    pub fn profiles(&self) -> impl Iterator<Item = Profile> + '_ {
        self.pools.keys().copied()
    }

    /// Close every pool.
    pub fn close(self) {
        for pool in self.pools.values() {
            pool.close();
        }
    }
}
