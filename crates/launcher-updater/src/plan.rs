//! Patch-chain planning.
//!
//! Patches are cumulative file-set overlays, so they must be applied in
//! ascending version order starting just above the installed version.

use std::collections::HashSet;

use crate::error::PlanningError;
use crate::manifest::{PatchId, RemoteManifest};
use crate::version::Version;

/// Ordered list of patches still needed, strictly increasing by version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    patches: Vec<PatchId>,
}

impl UpdatePlan {
    /// The patches, in application order.
    #[must_use]
    pub fn patches(&self) -> &[PatchId] {
        &self.patches
    }

    /// Whether the installation is already current.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patches.is_empty()
    }

    /// Number of patches to apply.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patches.len()
    }

    /// Version reached once every patch is applied.
    #[must_use]
    pub fn target(&self) -> Option<Version> {
        self.patches.last().map(PatchId::version)
    }

    /// File names in application order.
    #[must_use]
    pub fn file_names(&self) -> Vec<&str> {
        self.patches.iter().map(PatchId::file_name).collect()
    }
}

impl IntoIterator for UpdatePlan {
    type Item = PatchId;
    type IntoIter = std::vec::IntoIter<PatchId>;

    fn into_iter(self) -> Self::IntoIter {
        self.patches.into_iter()
    }
}

/// Compute the patches needed to bring `installed` up to the manifest's latest version.
///
/// Returns an empty plan when the manifest's latest version is not newer than
/// `installed`.
pub fn plan(installed: Version, manifest: &RemoteManifest) -> Result<UpdatePlan, PlanningError> {
    let latest = manifest.latest_version;
    if latest <= installed {
        tracing::info!("Installation is current ({installed}, latest {latest})");
        return Ok(UpdatePlan::default());
    }

    if manifest.updates.is_empty() {
        return Err(PlanningError::NoUpdatesPublished {
            latest: latest.to_string(),
        });
    }

    let mut seen = HashSet::new();
    let mut patches = Vec::with_capacity(manifest.updates.len());
    for patch in &manifest.updates {
        if patch.version() <= installed {
            tracing::debug!("Skipping {patch}: already at {installed}");
            continue;
        }
        if !seen.insert(patch.version()) {
            tracing::warn!("Ignoring duplicate update entry {patch}");
            continue;
        }
        patches.push(patch.clone());
    }

    if patches.is_empty() {
        return Err(PlanningError::LatestUnreachable {
            latest: latest.to_string(),
            installed: installed.to_string(),
        });
    }

    patches.sort_by_key(PatchId::version);

    let plan = UpdatePlan { patches };
    if plan.target().is_some_and(|target| target < latest) {
        tracing::warn!(
            "Published updates stop at {} but the manifest advertises {latest}",
            plan.target().unwrap_or_default()
        );
    }
    tracing::info!(
        "Planned {} update(s) from {installed} to {}",
        plan.len(),
        plan.target().unwrap_or(installed)
    );
    Ok(plan)
}
