use crate::db::DB_FILE;
use anyhow::{anyhow, Context};
use serde_json::json;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const MANIFEST_ENTRY: &str = "manifest.json";
const DB_ENTRY: &str = "db/portal.sqlite3";
const MEDIA_PREFIX: &str = "media/";
pub const MEDIA_DIR: &str = "media";
pub const BUNDLE_FORMAT: &str = "student-portal-workspace-v1";
const STAGING_DIR: &str = ".import-staging";

#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub bundle_format: String,
    pub entry_count: usize,
}

#[derive(Debug, Clone)]
pub struct ImportSummary {
    pub bundle_format_detected: String,
    pub media_files: usize,
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for ent in std::fs::read_dir(dir)
        .with_context(|| format!("failed to list {}", dir.to_string_lossy()))?
    {
        let p = ent?.path();
        if p.is_dir() {
            collect_files(&p, out)?;
        } else if p.is_file() {
            out.push(p);
        }
    }
    Ok(())
}

pub fn export_workspace_bundle(
    workspace_path: &Path,
    out_path: &Path,
) -> anyhow::Result<ExportSummary> {
    let db_path = workspace_path.join(DB_FILE);
    if !db_path.is_file() {
        return Err(anyhow!(
            "workspace database not found: {}",
            db_path.to_string_lossy()
        ));
    }

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.to_string_lossy()))?;
    }

    let out_file = File::create(out_path).with_context(|| {
        format!(
            "failed to create output file {}",
            out_path.to_string_lossy()
        )
    })?;
    let mut zip = ZipWriter::new(out_file);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);

    let manifest = json!({
        "format": BUNDLE_FORMAT,
        "version": 1,
        "appVersion": env!("CARGO_PKG_VERSION"),
        "exportedAt": chrono::Utc::now().to_rfc3339(),
    });
    zip.start_file(MANIFEST_ENTRY, opts)
        .context("failed to start manifest entry")?;
    zip.write_all(
        serde_json::to_string_pretty(&manifest)
            .context("failed to serialize manifest")?
            .as_bytes(),
    )
    .context("failed to write manifest entry")?;

    zip.start_file(DB_ENTRY, opts)
        .context("failed to start database entry")?;
    let mut db_file = File::open(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.to_string_lossy()))?;
    std::io::copy(&mut db_file, &mut zip).context("failed to write database entry")?;

    let media_root = workspace_path.join(MEDIA_DIR);
    let mut media = Vec::new();
    collect_files(&media_root, &mut media)?;
    media.sort();
    for path in &media {
        let rel = path
            .strip_prefix(&media_root)
            .context("media file outside media directory")?;
        let name = format!(
            "{}{}",
            MEDIA_PREFIX,
            rel.to_string_lossy().replace('\\', "/")
        );
        zip.start_file(name.as_str(), opts)
            .with_context(|| format!("failed to start entry {name}"))?;
        let mut f = File::open(path)
            .with_context(|| format!("failed to open media {}", path.to_string_lossy()))?;
        std::io::copy(&mut f, &mut zip).with_context(|| format!("failed to write {name}"))?;
    }

    zip.finish().context("failed to finalize zip bundle")?;

    Ok(ExportSummary {
        bundle_format: BUNDLE_FORMAT.to_string(),
        entry_count: 2 + media.len(),
    })
}

fn read_manifest_format(archive: &mut ZipArchive<File>) -> anyhow::Result<String> {
    let mut manifest_text = String::new();
    archive
        .by_name(MANIFEST_ENTRY)
        .context("bundle missing manifest.json")?
        .read_to_string(&mut manifest_text)
        .context("failed to read manifest.json")?;
    let manifest: serde_json::Value =
        serde_json::from_str(&manifest_text).context("manifest.json is invalid JSON")?;
    let format = manifest
        .get("format")
        .and_then(|v| v.as_str())
        .unwrap_or("");
    if format != BUNDLE_FORMAT {
        return Err(anyhow!("unsupported bundle format: {}", format));
    }
    Ok(format.to_string())
}

/// Index and path (relative to `media/`) of every media entry. Fails on the
/// first name that could land outside the media directory.
fn media_entries(archive: &mut ZipArchive<File>) -> anyhow::Result<Vec<(usize, PathBuf)>> {
    let mut out = Vec::new();
    for i in 0..archive.len() {
        let entry = archive.by_index(i).context("failed to read bundle entry")?;
        if entry.is_dir() || !entry.name().starts_with(MEDIA_PREFIX) {
            continue;
        }
        let rel = entry
            .enclosed_name()
            .and_then(|p| p.strip_prefix(MEDIA_DIR).ok().map(Path::to_path_buf))
            .filter(|p| {
                p.components().next().is_some()
                    && p.components().all(|c| matches!(c, Component::Normal(_)))
            });
        let Some(rel) = rel else {
            return Err(anyhow!("unsafe media entry name: {}", entry.name()));
        };
        out.push((i, rel));
    }
    Ok(out)
}

fn extract_entry(archive: &mut ZipArchive<File>, index: usize, target: &Path) -> anyhow::Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.to_string_lossy()))?;
    }
    let mut entry = archive.by_index(index).context("failed to read bundle entry")?;
    let mut out = File::create(target)
        .with_context(|| format!("failed to create {}", target.to_string_lossy()))?;
    std::io::copy(&mut entry, &mut out)
        .with_context(|| format!("failed to extract {}", target.to_string_lossy()))?;
    out.flush()
        .with_context(|| format!("failed to flush {}", target.to_string_lossy()))?;
    Ok(())
}

fn extract_to_staging(
    archive: &mut ZipArchive<File>,
    db_index: usize,
    media: &[(usize, PathBuf)],
    staging: &Path,
) -> anyhow::Result<()> {
    extract_entry(archive, db_index, &staging.join(DB_FILE))?;
    let media_root = staging.join(MEDIA_DIR);
    std::fs::create_dir_all(&media_root)
        .with_context(|| format!("failed to create {}", media_root.to_string_lossy()))?;
    for (index, rel) in media {
        extract_entry(archive, *index, &media_root.join(rel))?;
    }
    Ok(())
}

fn swap_in_staged(staging: &Path, workspace_path: &Path) -> anyhow::Result<()> {
    let dst = workspace_path.join(DB_FILE);
    if dst.exists() {
        std::fs::remove_file(&dst).with_context(|| {
            format!(
                "failed to remove existing database {}",
                dst.to_string_lossy()
            )
        })?;
    }
    std::fs::rename(staging.join(DB_FILE), &dst).with_context(|| {
        format!(
            "failed to move extracted database to {}",
            dst.to_string_lossy()
        )
    })?;

    let media_root = workspace_path.join(MEDIA_DIR);
    if media_root.exists() {
        std::fs::remove_dir_all(&media_root).with_context(|| {
            format!("failed to clear media {}", media_root.to_string_lossy())
        })?;
    }
    std::fs::rename(staging.join(MEDIA_DIR), &media_root).with_context(|| {
        format!("failed to move media to {}", media_root.to_string_lossy())
    })?;
    Ok(())
}

/// Replaces the workspace database and media with the bundle's. Every entry
/// is checked and extracted to a staging directory first, so a rejected
/// bundle leaves the workspace as it was.
pub fn import_workspace_bundle(
    in_path: &Path,
    workspace_path: &Path,
) -> anyhow::Result<ImportSummary> {
    let in_file = File::open(in_path)
        .with_context(|| format!("failed to open bundle {}", in_path.to_string_lossy()))?;
    let mut archive = ZipArchive::new(in_file).context("invalid zip archive")?;

    let bundle_format_detected = read_manifest_format(&mut archive)?;
    let db_index = (0..archive.len())
        .find(|&i| {
            archive
                .by_index(i)
                .map(|e| e.name() == DB_ENTRY)
                .unwrap_or(false)
        })
        .context("bundle missing db/portal.sqlite3")?;
    let media = media_entries(&mut archive)?;

    std::fs::create_dir_all(workspace_path).with_context(|| {
        format!(
            "failed to create workspace {}",
            workspace_path.to_string_lossy()
        )
    })?;
    let staging = workspace_path.join(STAGING_DIR);
    if staging.exists() {
        std::fs::remove_dir_all(&staging)
            .with_context(|| format!("failed to clear {}", staging.to_string_lossy()))?;
    }
    std::fs::create_dir_all(&staging)
        .with_context(|| format!("failed to create {}", staging.to_string_lossy()))?;

    let staged = extract_to_staging(&mut archive, db_index, &media, &staging)
        .and_then(|()| swap_in_staged(&staging, workspace_path));
    let _ = std::fs::remove_dir_all(&staging);
    staged?;

    Ok(ImportSummary {
        bundle_format_detected,
        media_files: media.len(),
    })
}
