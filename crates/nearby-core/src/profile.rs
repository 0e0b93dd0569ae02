//! The local user's persisted discovery profile
//!
//! The profile is what the local user chooses to broadcast about themselves:
//! a display name and an optional photo. A device with no profile configured
//! simply does not run discovery workers that need one.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::Result;

// ----------------------------------------------------------------------------
// User Profile
// ----------------------------------------------------------------------------

/// The local user's discovery profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Display name broadcast to nearby peers (may be empty)
    pub display_name: String,
    /// Path to the profile photo, when one is configured
    #[serde(default)]
    pub photo_path: Option<PathBuf>,
}

/// Read/write access to the persisted discovery profile
pub trait ProfileStore: Send + Sync {
    /// Load the profile; `None` means discovery is not configured
    fn load(&self) -> Option<UserProfile>;

    /// Persist the profile
    fn store(&self, profile: &UserProfile) -> Result<()>;
}

// ----------------------------------------------------------------------------
// File-Backed Store
// ----------------------------------------------------------------------------

/// [`ProfileStore`] persisting the profile as a JSON file
pub struct FileProfileStore {
    path: PathBuf,
}

impl FileProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ProfileStore for FileProfileStore {
    fn load(&self) -> Option<UserProfile> {
        let bytes = fs::read(&self.path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(profile) => Some(profile),
            Err(err) => {
                warn!(path = %self.path.display(), %err, "discarding unreadable profile");
                None
            }
        }
    }

    fn store(&self, profile: &UserProfile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_vec_pretty(profile)
            .map_err(|err| crate::NearbyError::malformed_record(err.to_string()))?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

/// [`ProfileStore`] holding a fixed profile in memory, for tests and demos
pub struct StaticProfileStore {
    profile: Option<UserProfile>,
}

impl StaticProfileStore {
    /// A store with the given profile configured
    pub fn new(profile: UserProfile) -> Self {
        Self {
            profile: Some(profile),
        }
    }

    /// A store with no profile configured
    pub fn unconfigured() -> Self {
        Self { profile: None }
    }
}

impl ProfileStore for StaticProfileStore {
    fn load(&self) -> Option<UserProfile> {
        self.profile.clone()
    }

    fn store(&self, _profile: &UserProfile) -> Result<()> {
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
