// SYNOID Material Resolution
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Per-section source media. Resolvers only look at the filesystem; they never
// fetch, convert or delete anything.

use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::agent::worker_pool;
use crate::composer::script::ScriptSection;
use crate::error::Result;
use crate::timeline::SourceKind;

/// A material file chosen for one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMaterial {
    pub path: PathBuf,
    pub kind: SourceKind,
}

impl ResolvedMaterial {
    /// Classify `path`, or `None` when it is missing or not a media file.
    pub fn detect(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }
        match SourceKind::from_path(path) {
            SourceKind::Color => None,
            kind => Some(Self { path: path.to_path_buf(), kind }),
        }
    }
}

/// Picks a material file for a section. `index` is 0-based.
pub trait MaterialResolver: Send + Sync {
    fn resolve(&self, index: usize, section: &ScriptSection) -> Option<PathBuf>;
}

impl<F> MaterialResolver for F
where
    F: Fn(usize, &ScriptSection) -> Option<PathBuf> + Send + Sync,
{
    fn resolve(&self, index: usize, section: &ScriptSection) -> Option<PathBuf> {
        self(index, section)
    }
}

/// Uses whatever the script pinned in `material_path`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptMaterialResolver;

impl MaterialResolver for ScriptMaterialResolver {
    fn resolve(&self, _index: usize, section: &ScriptSection) -> Option<PathBuf> {
        section.material_path.clone()
    }
}

/// Resolve one section: resolver first, then the script's own path.
pub fn resolve_section(
    resolver: &dyn MaterialResolver,
    index: usize,
    section: &ScriptSection,
) -> Option<ResolvedMaterial> {
    let chosen = resolver
        .resolve(index, section)
        .and_then(|p| ResolvedMaterial::detect(&p))
        .or_else(|| section.material_path.as_deref().and_then(ResolvedMaterial::detect));
    match &chosen {
        Some(m) => debug!("[COMPOSER] Section {} material {:?} ({:?})", index + 1, m.path, m.kind),
        None => debug!("[COMPOSER] Section {} has no material, color fill", index + 1),
    }
    chosen
}

/// Resolve every section on a bounded pool. Output order matches input.
pub fn resolve_all(
    resolver: &dyn MaterialResolver,
    sections: &[ScriptSection],
    workers: usize,
) -> Result<Vec<Option<ResolvedMaterial>>> {
    if sections.is_empty() {
        return Ok(Vec::new());
    }
    let pool = worker_pool(workers, sections.len())?;
    let resolved: Vec<Option<ResolvedMaterial>> = pool.install(|| {
        sections
            .par_iter()
            .enumerate()
            .map(|(i, section)| resolve_section(resolver, i, section))
            .collect()
    });
    info!(
        "[COMPOSER] Materials resolved for {}/{} sections",
        resolved.iter().filter(|m| m.is_some()).count(),
        sections.len()
    );
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"media").unwrap();
        path
    }

    #[test]
    fn test_detect_by_extension_and_existence() {
        let dir = tempfile::tempdir().unwrap();
        let clip = touch(dir.path(), "clip.mp4");
        let notes = touch(dir.path(), "notes.txt");
        assert_eq!(ResolvedMaterial::detect(&clip).map(|m| m.kind), Some(SourceKind::Video));
        assert_eq!(ResolvedMaterial::detect(&notes), None);
        assert_eq!(ResolvedMaterial::detect(&dir.path().join("gone.png")), None);
    }

    #[test]
    fn test_resolver_falls_back_to_script_path() {
        let dir = tempfile::tempdir().unwrap();
        let still = touch(dir.path(), "still.png");
        let section = ScriptSection { material_path: Some(still.clone()), ..Default::default() };
        let missing = |_: usize, _: &ScriptSection| Some(PathBuf::from("/nope/clip.mp4"));
        let resolved = resolve_section(&missing, 0, &section).unwrap();
        assert_eq!(resolved.path, still);
        assert_eq!(resolved.kind, SourceKind::Image);
    }

    #[test]
    fn test_resolve_all_keeps_order() {
        let dir = tempfile::tempdir().unwrap();
        let clip = touch(dir.path(), "clip.mov");
        let sections = vec![
            ScriptSection::default(),
            ScriptSection { material_path: Some(clip.clone()), ..Default::default() },
            ScriptSection { material_path: Some(dir.path().join("missing.jpg")), ..Default::default() },
        ];
        let resolved = resolve_all(&ScriptMaterialResolver, &sections, 8).unwrap();
        assert_eq!(resolved.len(), 3);
        assert!(resolved[0].is_none());
        assert_eq!(resolved[1].as_ref().map(|m| &m.path), Some(&clip));
        assert!(resolved[2].is_none());
    }
}
