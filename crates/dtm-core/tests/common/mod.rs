//! In-memory collaborators for driving the engine without git or docker.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use dtm_core::{
    artifact_tag, BuildPolicy, BuildRequest, HistoricalPoint, HistoryEntry, ImageBuilder,
    ImageInfo, StepError, Vcs, WorktreeState,
};
use tokio_util::sync::CancellationToken;

pub const MB: u64 = 1024 * 1024;

/// Id of the `n`th commit (oldest is 0), padded to 40 chars.
pub fn commit_id(n: usize) -> String {
    format!("{:0<40}", format!("c{n:03}x"))
}

/// Linear history of `len` commits, newest first, one day apart.
pub fn history(len: usize) -> Vec<HistoricalPoint> {
    let base: DateTime<Utc> = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
    (0..len)
        .rev()
        .map(|n| HistoricalPoint {
            id: commit_id(n),
            message: format!("commit {n}"),
            author: "Dev".into(),
            date: base + Duration::days(n as i64),
        })
        .collect()
}

/// Version control over a fixed linear history.
pub struct FakeVcs {
    workdir: PathBuf,
    /// Newest first.
    commits: Vec<HistoricalPoint>,
    refs: HashMap<String, String>,
    touching: Option<HashSet<String>>,
    state: Mutex<WorktreeState>,
    checkouts: Mutex<Vec<String>>,
    fail_checkout: HashSet<String>,
}

impl FakeVcs {
    /// `main` points at the newest commit and is checked out.
    pub fn new(commits: Vec<HistoricalPoint>) -> Self {
        let mut refs = HashMap::new();
        if let Some(head) = commits.first() {
            refs.insert("main".to_string(), head.id.clone());
        }
        Self {
            workdir: PathBuf::from("/fake/repo"),
            commits,
            refs,
            touching: None,
            state: Mutex::new(WorktreeState::Branch("main".into())),
            checkouts: Mutex::new(Vec::new()),
            fail_checkout: HashSet::new(),
        }
    }

    pub fn with_ref(mut self, name: &str, id: &str) -> Self {
        self.refs.insert(name.to_string(), id.to_string());
        self
    }

    pub fn with_state(self, state: WorktreeState) -> Self {
        *self.state.lock().unwrap() = state;
        self
    }

    /// Only these commits touch the build file.
    pub fn with_touching(mut self, ids: &[String]) -> Self {
        self.touching = Some(ids.iter().cloned().collect());
        self
    }

    /// Checking out `target` fails.
    pub fn failing_checkout(mut self, target: &str) -> Self {
        self.fail_checkout.insert(target.to_string());
        self
    }

    pub fn state(&self) -> WorktreeState {
        self.state.lock().unwrap().clone()
    }

    pub fn checkouts(&self) -> Vec<String> {
        self.checkouts.lock().unwrap().clone()
    }

    fn head_id(&self) -> Option<String> {
        match &*self.state.lock().unwrap() {
            WorktreeState::Branch(name) => self.refs.get(name).cloned(),
            WorktreeState::Detached(id) => Some(id.clone()),
        }
    }
}

#[async_trait]
impl Vcs for FakeVcs {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn resolve_ref(
        &self,
        name: &str,
        _cancel: &CancellationToken,
    ) -> Result<String, StepError> {
        let found = if name == "HEAD" {
            self.head_id()
        } else if let Some(id) = self.refs.get(name) {
            Some(id.clone())
        } else {
            self.commits.iter().find(|c| c.id == name).map(|c| c.id.clone())
        };
        found.ok_or_else(|| StepError::RefNotFound {
            name: name.to_string(),
        })
    }

    async fn enumerate_ancestry(
        &self,
        from: &str,
        path_filter: Option<&Path>,
        _cancel: &CancellationToken,
    ) -> Result<Vec<HistoricalPoint>, StepError> {
        let start = self
            .commits
            .iter()
            .position(|c| c.id == from)
            .ok_or_else(|| StepError::RefNotFound {
                name: from.to_string(),
            })?;
        Ok(self.commits[start..]
            .iter()
            .filter(|c| match (&self.touching, path_filter) {
                (Some(touching), Some(_)) => touching.contains(&c.id),
                _ => true,
            })
            .cloned()
            .collect())
    }

    async fn current_state(
        &self,
        _cancel: &CancellationToken,
    ) -> Result<WorktreeState, StepError> {
        Ok(self.state())
    }

    async fn checkout(&self, target: &str, cancel: &CancellationToken) -> Result<(), StepError> {
        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }
        self.checkouts.lock().unwrap().push(target.to_string());
        if self.fail_checkout.contains(target) {
            return Err(StepError::CheckoutFailed {
                target: target.to_string(),
                message: "simulated checkout failure".into(),
            });
        }
        let next = if self.refs.contains_key(target) {
            WorktreeState::Branch(target.to_string())
        } else {
            WorktreeState::Detached(target.to_string())
        };
        *self.state.lock().unwrap() = next;
        Ok(())
    }
}

struct FakeImage {
    size: u64,
    layers: Vec<HistoryEntry>,
}

/// Image builder keyed by commit id through the default tag derivation.
#[derive(Default)]
pub struct FakeBuilder {
    images: HashMap<String, FakeImage>,
    failing: HashSet<String>,
    panic_on: Option<String>,
    cancel_on: Option<(String, CancellationToken)>,
    history_unavailable: bool,
    built: Mutex<Vec<String>>,
    removed: Mutex<Vec<String>>,
}

fn tag_for(id: &str) -> String {
    artifact_tag(&BuildPolicy::default().tag_prefix, id)
}

impl FakeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Image of `size` bytes with a single `RUN build` layer.
    pub fn with_size(self, id: &str, size: u64) -> Self {
        self.with_layers(id, &[("/bin/sh -c RUN build", size)])
    }

    pub fn with_layers(mut self, id: &str, layers: &[(&str, u64)]) -> Self {
        self.images.insert(
            tag_for(id),
            FakeImage {
                size: layers.iter().map(|(_, s)| s).sum(),
                layers: layers
                    .iter()
                    .map(|(created_by, size)| HistoryEntry {
                        created_by: created_by.to_string(),
                        size: *size,
                    })
                    .collect(),
            },
        );
        self
    }

    pub fn failing(mut self, id: &str) -> Self {
        self.failing.insert(tag_for(id));
        self
    }

    pub fn panicking(mut self, id: &str) -> Self {
        self.panic_on = Some(tag_for(id));
        self
    }

    /// Fire `token` when `id` is built, as a user interrupt would.
    pub fn cancelling(mut self, id: &str, token: CancellationToken) -> Self {
        self.cancel_on = Some((tag_for(id), token));
        self
    }

    pub fn without_history(mut self) -> Self {
        self.history_unavailable = true;
        self
    }

    pub fn built(&self) -> Vec<String> {
        self.built.lock().unwrap().clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.removed.lock().unwrap().clone()
    }
}

#[async_trait]
impl ImageBuilder for FakeBuilder {
    async fn build(
        &self,
        request: &BuildRequest,
        cancel: &CancellationToken,
    ) -> Result<(), StepError> {
        self.built.lock().unwrap().push(request.tag.clone());
        if self.panic_on.as_deref() == Some(request.tag.as_str()) {
            panic!("builder crashed on {}", request.tag);
        }
        if let Some((tag, token)) = &self.cancel_on {
            if *tag == request.tag {
                token.cancel();
            }
        }
        if cancel.is_cancelled() {
            return Err(StepError::Cancelled);
        }
        if self.failing.contains(&request.tag) || !self.images.contains_key(&request.tag) {
            return Err(StepError::BuildFailed {
                message: format!("simulated build failure for {}", request.tag),
            });
        }
        Ok(())
    }

    async fn inspect(
        &self,
        tag: &str,
        _cancel: &CancellationToken,
    ) -> Result<ImageInfo, StepError> {
        let image = self.images.get(tag).ok_or_else(|| StepError::InspectFailed {
            message: format!("no such image {tag}"),
        })?;
        Ok(ImageInfo {
            total_size: image.size,
            layer_ids: (0..image.layers.len()).map(|i| format!("sha256:{i}")).collect(),
        })
    }

    async fn history(
        &self,
        tag: &str,
        _cancel: &CancellationToken,
    ) -> Result<Vec<HistoryEntry>, StepError> {
        if self.history_unavailable {
            return Err(StepError::HistoryUnavailable {
                message: "simulated".into(),
            });
        }
        Ok(self
            .images
            .get(tag)
            .map(|i| i.layers.clone())
            .unwrap_or_default())
    }

    async fn remove(&self, tag: &str, _cancel: &CancellationToken) -> Result<(), StepError> {
        self.removed.lock().unwrap().push(tag.to_string());
        Ok(())
    }
}

pub fn shared(vcs: FakeVcs, builder: FakeBuilder) -> (Arc<FakeVcs>, Arc<FakeBuilder>) {
    (Arc::new(vcs), Arc::new(builder))
}
