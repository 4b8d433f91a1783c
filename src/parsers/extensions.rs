use std::path::Path;

use anyhow::Result;
use serde::Deserialize;
use walkdir::WalkDir;

use crate::parsers::browser::{ArtifactKind, ArtifactRecord, BrowserKind, BrowserProfile, RecordFields};
use crate::parsers::{ArtifactExtractor, ExtractionContext, each_firefox_profile, guarded};

/// Fields of a Chromium extension `manifest.json` that end up in a record.
/// Each may be absent or `null`.
#[derive(Debug, Default, Deserialize)]
pub struct ExtensionManifest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub homepage_url: Option<String>,
}

pub struct ExtensionsExtractor;

impl ArtifactExtractor for ExtensionsExtractor {
    fn kind(&self) -> ArtifactKind {
        ArtifactKind::Extension
    }

    fn extract(&self, profile: &BrowserProfile, ctx: &ExtractionContext<'_>) -> Vec<ArtifactRecord> {
        let mut out = Vec::new();
        match profile.browser {
            BrowserKind::Chrome | BrowserKind::Edge => {
                extract_chromium_extensions(profile, ctx, &mut out);
            }
            BrowserKind::Firefox => {
                each_firefox_profile(ctx, self.kind(), &profile.path, &mut out, |dir, out| {
                    list_xpi_packages(dir, ctx, out)
                });
            }
            BrowserKind::Safari => {}
        }
        out
    }
}

/// `Extensions/<id>/<version>/manifest.json`, one record per manifest.
fn extract_chromium_extensions(
    profile: &BrowserProfile,
    ctx: &ExtractionContext<'_>,
    out: &mut Vec<ArtifactRecord>,
) {
    let root = profile.profile_dir().join("Extensions");
    if !root.is_dir() {
        return;
    }
    let walker = WalkDir::new(&root)
        .min_depth(3)
        .max_depth(3)
        .sort_by_file_name();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err.path().unwrap_or(root.as_path()).to_path_buf();
                ctx.log.error(format!(
                    "Error extension {} {}: {err}",
                    profile.browser,
                    path.display()
                ));
                continue;
            }
        };
        if !entry.file_type().is_file() || entry.file_name() != "manifest.json" {
            continue;
        }
        let manifest_path = entry.path();
        guarded(ctx, ArtifactKind::Extension, profile.browser, manifest_path, out, |out| {
            let manifest: ExtensionManifest = serde_json::from_slice(&std::fs::read(manifest_path)?)?;
            out.push(ArtifactRecord::new(
                ctx.host,
                profile.browser,
                ArtifactKind::Extension,
                profile.profile_dir(),
                RecordFields {
                    url: manifest.homepage_url.unwrap_or_default(),
                    title: manifest.name.unwrap_or_default(),
                    extra: format!("version={}", manifest.version.unwrap_or_default()),
                    ..RecordFields::default()
                },
            ));
            Ok(())
        });
    }
}

fn list_xpi_packages(
    profile_dir: &Path,
    ctx: &ExtractionContext<'_>,
    out: &mut Vec<ArtifactRecord>,
) -> Result<()> {
    let dir = profile_dir.join("extensions");
    if !dir.is_dir() {
        return Ok(());
    }
    let mut packages: Vec<String> = std::fs::read_dir(&dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".xpi"))
        .collect();
    packages.sort();
    for name in packages {
        out.push(ArtifactRecord::new(
            ctx.host,
            BrowserKind::Firefox,
            ArtifactKind::Extension,
            profile_dir,
            RecordFields {
                title: name,
                extra: "xpi package".to_string(),
                ..RecordFields::default()
            },
        ));
    }
    Ok(())
}
