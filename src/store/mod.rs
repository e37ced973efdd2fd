//! The pod store: single source of truth for pods, identities, files and rituals
//!
//! Every mutation runs against a working copy of the state. The copy is
//! written to storage and only then swapped in, so a failed operation (missing
//! target, no active pod, storage error) leaves both memory and storage as
//! they were.
//!
//! The active pod is not stored separately: the store keeps its id and looks
//! the pod up in `pods` on demand.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::db::{KeyValueStore, KvWrite, StorageError, ACTIVE_POD_KEY, IDENTITY_KEY, POD_KEY};
use crate::models::{
    FileResource, Identity, NewFile, NewIdentity, NewPod, NewRitual, PodFilter, PromptPod, Ritual,
};
use crate::notify::Notice;
use crate::validation::validate_snapshot;

/// Kinds of records the store can fail to find
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Pod,
    Identity,
    File,
    Ritual,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Pod => write!(f, "Pod"),
            EntityKind::Identity => write!(f, "Identity"),
            EntityKind::File => write!(f, "File"),
            EntityKind::Ritual => write!(f, "Ritual"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("No active pod selected")]
    NoActivePod,

    #[error("Failed to persist state: {0}")]
    Persistence(#[from] StorageError),

    #[error("Stored value for '{key}' is malformed: {source}")]
    Corrupt {
        key: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode snapshot: {0}")]
    Encode(#[source] serde_json::Error),
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

fn not_found(kind: EntityKind, id: &str) -> StoreError {
    StoreError::NotFound {
        kind,
        id: id.to_string(),
    }
}

/// Current time at the precision we persist (milliseconds)
fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// A modification time strictly after `prev`, normally `now`
fn later(prev: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > prev {
        now
    } else {
        prev + Duration::milliseconds(1)
    }
}

fn touch(pod: &mut PromptPod, now: DateTime<Utc>) {
    pod.last_modified = later(pod.last_modified, now);
}

/// Generate an id like "pod-1714564800000-9f86d081", retrying while `taken`
/// reports a clash.
pub fn generate_id(kind: &str, taken: impl Fn(&str) -> bool) -> String {
    loop {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        let id = format!("{}-{}-{}", kind, Utc::now().timestamp_millis(), &uuid[..8]);
        if !taken(&id) {
            return id;
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum IdentityChange<'a> {
    Replace(&'a Identity),
    Remove,
}

/// Apply a master identity change to every embedded copy. Returns the number
/// of pods touched.
fn cascade_identity(
    pods: &mut [PromptPod],
    identity_id: &str,
    change: IdentityChange<'_>,
    now: DateTime<Utc>,
) -> usize {
    let mut touched = 0;
    for pod in pods.iter_mut().filter(|p| p.has_identity(identity_id)) {
        match change {
            IdentityChange::Replace(identity) => {
                for copy in pod.identities.iter_mut().filter(|i| i.id == identity_id) {
                    *copy = identity.clone();
                }
            }
            IdentityChange::Remove => pod.identities.retain(|i| i.id != identity_id),
        }
        touch(pod, now);
        touched += 1;
    }
    touched
}

#[derive(Debug, Clone, Default)]
struct Snapshot {
    pods: Vec<PromptPod>,
    identities: Vec<Identity>,
    active_pod_id: Option<String>,
}

impl Snapshot {
    fn pod_mut(&mut self, id: &str) -> Result<&mut PromptPod> {
        self.pods
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| not_found(EntityKind::Pod, id))
    }

    fn active_pod_mut(&mut self) -> Result<&mut PromptPod> {
        let id = self.active_pod_id.clone().ok_or(StoreError::NoActivePod)?;
        self.pods
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NoActivePod)
    }

    fn writes(&self) -> Result<Vec<KvWrite>> {
        let pods = serde_json::to_string(&self.pods).map_err(StoreError::Encode)?;
        let identities = serde_json::to_string(&self.identities).map_err(StoreError::Encode)?;
        let active = match &self.active_pod_id {
            Some(id) => KvWrite::Set {
                key: ACTIVE_POD_KEY,
                value: id.clone(),
            },
            None => KvWrite::Remove {
                key: ACTIVE_POD_KEY,
            },
        };

        Ok(vec![
            KvWrite::Set {
                key: POD_KEY,
                value: pods,
            },
            KvWrite::Set {
                key: IDENTITY_KEY,
                value: identities,
            },
            active,
        ])
    }
}

fn read_json<S: KeyValueStore, T: DeserializeOwned>(
    storage: &S,
    key: &'static str,
) -> Result<Option<T>> {
    match storage.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { key, source }),
        None => Ok(None),
    }
}

/// State container for pods and identities, persisted to `S` after every
/// change
pub struct PodStore<S: KeyValueStore> {
    state: Snapshot,
    storage: S,
    notices: Vec<Notice>,
}

impl<S: KeyValueStore> PodStore<S> {
    /// Rehydrate from storage. Missing keys mean empty collections; an active
    /// pod id that matches no pod is dropped.
    pub fn open(storage: S) -> Result<Self> {
        let pods: Vec<PromptPod> = read_json(&storage, POD_KEY)?.unwrap_or_default();
        let identities: Vec<Identity> = read_json(&storage, IDENTITY_KEY)?.unwrap_or_default();

        let active_pod_id = storage.get(ACTIVE_POD_KEY)?.filter(|id| {
            let found = pods.iter().any(|p| &p.id == id);
            if !found {
                warn!(pod_id = %id, "persisted active pod no longer exists, clearing");
            }
            found
        });

        for issue in validate_snapshot(&pods, &identities) {
            warn!(%issue, "snapshot integrity issue");
        }

        debug!(
            pods = pods.len(),
            identities = identities.len(),
            active = ?active_pod_id,
            "snapshot loaded"
        );

        Ok(Self {
            state: Snapshot {
                pods,
                identities,
                active_pod_id,
            },
            storage,
            notices: Vec::new(),
        })
    }

    pub fn pods(&self) -> &[PromptPod] {
        &self.state.pods
    }

    pub fn identities(&self) -> &[Identity] {
        &self.state.identities
    }

    pub fn pod(&self, id: &str) -> Option<&PromptPod> {
        self.state.pods.iter().find(|p| p.id == id)
    }

    pub fn identity(&self, id: &str) -> Option<&Identity> {
        self.state.identities.iter().find(|i| i.id == id)
    }

    pub fn active_pod_id(&self) -> Option<&str> {
        self.state.active_pod_id.as_deref()
    }

    /// The active pod, looked up from `pods`
    pub fn active_pod(&self) -> Option<&PromptPod> {
        self.active_pod_id().and_then(|id| self.pod(id))
    }

    pub fn find_pods(&self, filter: &PodFilter) -> Vec<&PromptPod> {
        self.state.pods.iter().filter(|p| p.matches(filter)).collect()
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn into_storage(self) -> S {
        self.storage
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Take every notice raised since the last drain
    pub fn drain_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    fn commit<T>(&mut self, apply: impl FnOnce(&mut Snapshot) -> Result<T>) -> Result<T> {
        let mut next = self.state.clone();
        let value = apply(&mut next)?;
        self.storage.apply(&next.writes()?)?;
        debug!(
            pods = next.pods.len(),
            identities = next.identities.len(),
            "snapshot persisted"
        );
        self.state = next;
        Ok(value)
    }

    fn announce<T>(
        &mut self,
        result: Result<T>,
        on_success: impl FnOnce(&T) -> Option<Notice>,
    ) -> Result<T> {
        let notice = match &result {
            Ok(value) => on_success(value),
            Err(e) => Some(Notice::error(e.to_string())),
        };
        if let Some(notice) = notice {
            notice.trace();
            self.notices.push(notice);
        }
        result
    }

    pub fn create_pod(&mut self, draft: NewPod) -> Result<PromptPod> {
        let now = now();
        let result = self.commit(|state| {
            let id = generate_id("pod", |candidate| {
                state.pods.iter().any(|p| p.id == candidate)
            });
            let pod = PromptPod::from_draft(id, draft, now);
            state.pods.push(pod.clone());
            Ok(pod)
        });
        self.announce(result, |pod| {
            Some(Notice::success(
                "PromptPod Created",
                format!("{} has been successfully created.", pod.name),
            ))
        })
    }

    /// Replace the stored pod with the same id. `lastModified` is forced
    /// forward and `createdAt` is kept from the stored record.
    pub fn update_pod(&mut self, pod: PromptPod) -> Result<PromptPod> {
        let now = now();
        let result = self.commit(|state| {
            let stored = state.pod_mut(&pod.id)?;
            let created_at = stored.created_at;
            let previous = stored.last_modified;
            *stored = pod;
            stored.created_at = created_at;
            stored.last_modified = later(previous, now);
            Ok(stored.clone())
        });
        self.announce(result, |pod| {
            Some(Notice::success(
                "PromptPod Updated",
                format!("{} has been successfully updated.", pod.name),
            ))
        })
    }

    /// Remove a pod, clearing the active pod if it was this one
    pub fn delete_pod(&mut self, id: &str) -> Result<PromptPod> {
        let result = self.commit(|state| {
            let index = state
                .pods
                .iter()
                .position(|p| p.id == id)
                .ok_or_else(|| not_found(EntityKind::Pod, id))?;
            let pod = state.pods.remove(index);
            if state.active_pod_id.as_deref() == Some(id) {
                state.active_pod_id = None;
            }
            Ok(pod)
        });
        self.announce(result, |pod| {
            Some(Notice::success(
                "PromptPod Deleted",
                format!("{} has been deleted.", pod.name),
            ))
        })
    }

    /// `None` clears the active pod. An unknown id fails and leaves the
    /// current selection alone.
    pub fn set_active_pod(&mut self, id: Option<&str>) -> Result<()> {
        let result = self.commit(|state| {
            state.active_pod_id = match id {
                None => None,
                Some(id) => {
                    if !state.pods.iter().any(|p| p.id == id) {
                        return Err(not_found(EntityKind::Pod, id));
                    }
                    Some(id.to_string())
                }
            };
            Ok(())
        });
        self.announce(result, |_| None)
    }

    pub fn create_identity(&mut self, draft: NewIdentity) -> Result<Identity> {
        let result = self.commit(|state| {
            let id = generate_id("identity", |candidate| {
                state.identities.iter().any(|i| i.id == candidate)
            });
            let identity = draft.into_identity(id);
            state.identities.push(identity.clone());
            Ok(identity)
        });
        self.announce(result, |identity| {
            Some(Notice::success(
                "Identity Created",
                format!("{} has been successfully created.", identity.name),
            ))
        })
    }

    /// Replace a master identity and every copy embedded in a pod
    pub fn update_identity(&mut self, identity: Identity) -> Result<Identity> {
        let now = now();
        let result = self.commit(|state| {
            let master = state
                .identities
                .iter_mut()
                .find(|i| i.id == identity.id)
                .ok_or_else(|| not_found(EntityKind::Identity, &identity.id))?;
            *master = identity.clone();

            let touched = cascade_identity(
                &mut state.pods,
                &identity.id,
                IdentityChange::Replace(&identity),
                now,
            );
            debug!(identity_id = %identity.id, pods = touched, "identity copies updated");
            Ok(identity)
        });
        self.announce(result, |identity| {
            Some(Notice::success(
                "Identity Updated",
                format!("{} has been successfully updated.", identity.name),
            ))
        })
    }

    /// Remove a master identity and strip its copies from every pod
    pub fn delete_identity(&mut self, id: &str) -> Result<Identity> {
        let now = now();
        let result = self.commit(|state| {
            let index = state
                .identities
                .iter()
                .position(|i| i.id == id)
                .ok_or_else(|| not_found(EntityKind::Identity, id))?;
            let identity = state.identities.remove(index);

            let touched = cascade_identity(&mut state.pods, id, IdentityChange::Remove, now);
            debug!(identity_id = %id, pods = touched, "identity copies removed");
            Ok(identity)
        });
        self.announce(result, |identity| {
            Some(Notice::success(
                "Identity Deleted",
                format!("{} has been deleted.", identity.name),
            ))
        })
    }

    /// Embed a copy of the identity in the active pod, or remove it if it is
    /// already there. Returns whether the identity is now in the pod.
    pub fn toggle_identity_in_active_pod(&mut self, identity_id: &str) -> Result<bool> {
        let now = now();
        let result = self.commit(|state| {
            let master = state.identities.iter().find(|i| i.id == identity_id).cloned();
            let pod = state.active_pod_mut()?;

            let added = if pod.has_identity(identity_id) {
                pod.identities.retain(|i| i.id != identity_id);
                false
            } else {
                let identity = master.ok_or_else(|| not_found(EntityKind::Identity, identity_id))?;
                pod.identities.push(identity);
                true
            };
            touch(pod, now);
            Ok((pod.name.clone(), added))
        });
        self.announce(result, |(pod_name, _)| {
            Some(Notice::success(
                "PromptPod Updated",
                format!("{} has been successfully updated.", pod_name),
            ))
        })
        .map(|(_, added)| added)
    }

    pub fn add_file_to_active_pod(&mut self, draft: NewFile) -> Result<FileResource> {
        let now = now();
        let result = self.commit(|state| {
            let pod = state.active_pod_mut()?;
            let id = generate_id("file", |candidate| {
                pod.files.iter().any(|f| f.id == candidate)
            });
            let file = draft.into_file(id, now);
            pod.files.push(file.clone());
            touch(pod, now);
            Ok((pod.name.clone(), file))
        });
        self.announce(result, |(pod_name, file)| {
            Some(Notice::success(
                "File Added",
                format!("{} has been added to {}.", file.name, pod_name),
            ))
        })
        .map(|(_, file)| file)
    }

    /// Replace a file inside a pod, bumping both the file and the pod
    pub fn update_file(&mut self, pod_id: &str, file: FileResource) -> Result<FileResource> {
        let now = now();
        let result = self.commit(|state| {
            let pod = state.pod_mut(pod_id)?;
            let stored = pod
                .files
                .iter_mut()
                .find(|f| f.id == file.id)
                .ok_or_else(|| not_found(EntityKind::File, &file.id))?;
            let created_at = stored.created_at;
            let previous = stored.last_modified;
            *stored = file;
            stored.created_at = created_at;
            stored.last_modified = later(previous, now);
            let updated = stored.clone();
            touch(pod, now);
            Ok(updated)
        });
        self.announce(result, |file| {
            Some(Notice::success(
                "File Updated",
                format!("{} has been updated.", file.name),
            ))
        })
    }

    pub fn delete_file(&mut self, pod_id: &str, file_id: &str) -> Result<FileResource> {
        let now = now();
        let result = self.commit(|state| {
            let pod = state.pod_mut(pod_id)?;
            let index = pod
                .files
                .iter()
                .position(|f| f.id == file_id)
                .ok_or_else(|| not_found(EntityKind::File, file_id))?;
            let file = pod.files.remove(index);
            touch(pod, now);
            Ok(file)
        });
        self.announce(result, |file| {
            Some(Notice::success(
                "File Deleted",
                format!("{} has been deleted.", file.name),
            ))
        })
    }

    pub fn add_ritual_to_active_pod(&mut self, draft: NewRitual) -> Result<Ritual> {
        let now = now();
        let result = self.commit(|state| {
            let pod = state.active_pod_mut()?;
            let id = generate_id("ritual", |candidate| {
                pod.rituals.iter().any(|r| r.id == candidate)
            });
            let ritual = draft.into_ritual(id);
            pod.rituals.push(ritual.clone());
            touch(pod, now);
            Ok((pod.name.clone(), ritual))
        });
        self.announce(result, |(pod_name, ritual)| {
            Some(Notice::success(
                "Ritual Added",
                format!("{} has been added to {}.", ritual.name, pod_name),
            ))
        })
        .map(|(_, ritual)| ritual)
    }

    pub fn update_ritual(&mut self, pod_id: &str, ritual: Ritual) -> Result<Ritual> {
        let now = now();
        let result = self.commit(|state| {
            let pod = state.pod_mut(pod_id)?;
            let stored = pod
                .rituals
                .iter_mut()
                .find(|r| r.id == ritual.id)
                .ok_or_else(|| not_found(EntityKind::Ritual, &ritual.id))?;
            *stored = ritual.clone();
            touch(pod, now);
            Ok(ritual)
        });
        self.announce(result, |ritual| {
            Some(Notice::success(
                "Ritual Updated",
                format!("{} has been updated.", ritual.name),
            ))
        })
    }

    pub fn delete_ritual(&mut self, pod_id: &str, ritual_id: &str) -> Result<Ritual> {
        let now = now();
        let result = self.commit(|state| {
            let pod = state.pod_mut(pod_id)?;
            let index = pod
                .rituals
                .iter()
                .position(|r| r.id == ritual_id)
                .ok_or_else(|| not_found(EntityKind::Ritual, ritual_id))?;
            let ritual = pod.rituals.remove(index);
            touch(pod, now);
            Ok(ritual)
        });
        self.announce(result, |ritual| {
            Some(Notice::success(
                "Ritual Deleted",
                format!("{} has been deleted.", ritual.name),
            ))
        })
    }
}
