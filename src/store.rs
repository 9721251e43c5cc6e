//! Connection profile persistence.
//!
//! Profiles live in memory behind a single `RwLock` and every mutation rewrites
//! the whole JSON file while the write lock is held. A mutation is staged on a
//! copy of the state and only becomes visible once the file is written. The
//! file is a plain array of profiles; the current profile is always written
//! first, and the first profile of a loaded file becomes current.

use chrono::Utc;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::error::{ConsoleError, Result};
use crate::profile::ConnectionProfile;

#[derive(Debug, Default, Clone)]
struct StoreState {
    profiles: HashMap<String, ConnectionProfile>,
    current_id: Option<String>,
}

impl StoreState {
    /// Profiles in file order: current first, the rest by creation time then id.
    fn ordered(&self) -> Vec<&ConnectionProfile> {
        let mut rest: Vec<_> = self
            .profiles
            .values()
            .filter(|p| Some(&p.id) != self.current_id.as_ref())
            .collect();
        rest.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let current = self
            .current_id
            .as_ref()
            .and_then(|id| self.profiles.get(id));
        current.into_iter().chain(rest).collect()
    }

    fn generate_id(&self) -> String {
        let base = format!("conn_{}", Utc::now().timestamp_millis());
        let mut candidate = base.clone();
        let mut suffix = 1;
        while self.profiles.contains_key(&candidate) {
            candidate = format!("{base}_{suffix}");
            suffix += 1;
        }
        candidate
    }
}

pub struct ConnectionStore {
    path: PathBuf,
    state: RwLock<StoreState>,
}

impl ConnectionStore {
    /// Load the store from `path`, creating it with a single local default
    /// profile when the file does not exist.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut state = StoreState::default();

        if path.exists() {
            let content = fs::read_to_string(&path).map_err(|source| ConsoleError::StoreIo {
                path: path.clone(),
                source,
            })?;
            let profiles: Vec<ConnectionProfile> =
                serde_json::from_str(&content).map_err(|source| ConsoleError::StoreFormat {
                    path: path.clone(),
                    source,
                })?;

            for profile in profiles {
                if state.current_id.is_none() {
                    state.current_id = Some(profile.id.clone());
                }
                state.profiles.insert(profile.id.clone(), profile);
            }
            tracing::info!(
                "Loaded {} connection profile(s) from {}",
                state.profiles.len(),
                path.display()
            );

            return Ok(Self {
                path,
                state: RwLock::new(state),
            });
        }

        let default = ConnectionProfile::local_default(Utc::now().timestamp());
        tracing::info!(
            "No connection store at {}, creating default profile '{}'",
            path.display(),
            default.id
        );
        state.current_id = Some(default.id.clone());
        state.profiles.insert(default.id.clone(), default);

        let store = Self {
            path,
            state: RwLock::new(state),
        };
        store.save(&store.read())?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write the whole store to a sibling temp file, then rename it into place.
    fn save(&self, state: &StoreState) -> Result<()> {
        let content =
            serde_json::to_string_pretty(&state.ordered()).map_err(|source| {
                ConsoleError::StoreFormat {
                    path: self.path.clone(),
                    source,
                }
            })?;

        let io_error = |source| ConsoleError::StoreIo {
            path: self.path.clone(),
            source,
        };
        let tmp = self.tmp_path();
        fs::write(&tmp, content).map_err(io_error)?;
        fs::rename(&tmp, &self.path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            io_error(source)
        })
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Persist `next` and install it as the live state. On failure the live
    /// state is left untouched.
    fn commit(&self, state: &mut StoreState, next: StoreState) -> Result<()> {
        self.save(&next)?;
        *state = next;
        Ok(())
    }

    /// Snapshot of all profiles, current first.
    pub fn list(&self) -> Vec<ConnectionProfile> {
        self.read().ordered().into_iter().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Result<ConnectionProfile> {
        self.read()
            .profiles
            .get(id)
            .cloned()
            .ok_or_else(|| ConsoleError::not_found(format!("connection '{id}'")))
    }

    /// Add a profile, generating an id when none is given. Returns the stored copy.
    pub fn add(&self, mut profile: ConnectionProfile) -> Result<ConnectionProfile> {
        let mut state = self.write();
        let mut next = state.clone();

        if profile.id.is_empty() {
            profile.id = next.generate_id();
        }
        let now = Utc::now().timestamp();
        profile.created_at = now;
        profile.updated_at = now;

        if next.current_id.is_none() {
            next.current_id = Some(profile.id.clone());
        }
        next.profiles.insert(profile.id.clone(), profile.clone());
        self.commit(&mut state, next)?;

        tracing::info!("Added connection profile '{}'", profile.id);
        Ok(profile)
    }

    /// Overwrite the profile `id`, keeping its id and creation time.
    pub fn update(&self, id: &str, mut profile: ConnectionProfile) -> Result<ConnectionProfile> {
        let mut state = self.write();

        let existing = state
            .profiles
            .get(id)
            .ok_or_else(|| ConsoleError::not_found(format!("connection '{id}'")))?;

        profile.id = id.to_string();
        profile.created_at = existing.created_at;
        profile.updated_at = Utc::now().timestamp();

        let mut next = state.clone();
        next.profiles.insert(profile.id.clone(), profile.clone());
        self.commit(&mut state, next)?;

        tracing::info!("Updated connection profile '{id}'");
        Ok(profile)
    }

    /// Remove the profile `id`. If it was current, some remaining profile
    /// becomes current, or none when the store is now empty.
    pub fn delete(&self, id: &str) -> Result<()> {
        let mut state = self.write();
        let mut next = state.clone();

        if next.profiles.remove(id).is_none() {
            return Err(ConsoleError::not_found(format!("connection '{id}'")));
        }

        if next.current_id.as_deref() == Some(id) {
            next.current_id = next.profiles.keys().next().cloned();
        }
        self.commit(&mut state, next)?;

        tracing::info!("Deleted connection profile '{id}'");
        Ok(())
    }

    pub fn set_current(&self, id: &str) -> Result<()> {
        let mut state = self.write();

        if !state.profiles.contains_key(id) {
            return Err(ConsoleError::not_found(format!("connection '{id}'")));
        }
        let mut next = state.clone();
        next.current_id = Some(id.to_string());
        self.commit(&mut state, next)?;

        tracing::info!("Current connection set to '{id}'");
        Ok(())
    }

    pub fn current(&self) -> Option<ConnectionProfile> {
        let state = self.read();
        state
            .current_id
            .as_ref()
            .and_then(|id| state.profiles.get(id))
            .cloned()
    }

    pub fn current_id(&self) -> Option<String> {
        self.read().current_id.clone()
    }
}
