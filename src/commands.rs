//! Subcommand implementations.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result, bail};
use recap::config::RecapConfig;
use recap::replay::Timeline;
use recap::repository::{CancellationToken, FileId, Index, NoProgress, RebuildReport, Repository};
use tracing::info;

use crate::format::{self, OutputFormat};

/// Workspace root and configuration shared by every subcommand.
pub struct Context {
    pub root: PathBuf,
    pub config: RecapConfig,
}

impl Context {
    pub fn load(root: PathBuf, config: Option<&Path>) -> Result<Self> {
        let config_path = config.map_or_else(|| RecapConfig::default_path(&root), Path::to_owned);
        let config = RecapConfig::load(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        Ok(Self { root, config })
    }

    fn rebuild(&self) -> Result<(Repository, RebuildReport)> {
        let mut repo = Repository::from_config(&self.root, &self.config);
        let report = repo
            .rebuild(&CancellationToken::new(), &mut NoProgress)
            .with_context(|| format!("indexing {}", repo.root().display()))?;
        info!(
            files = report.files_scanned,
            skipped = report.skipped_count(),
            "history indexed"
        );
        Ok((repo, report))
    }
}

/// The live file at `path`, else the most recent evicted file that was
/// recorded under exactly that path.
fn resolve(index: &Index, path: &str) -> Result<FileId> {
    if let Some(id) = index.find_file(path) {
        return Ok(id);
    }
    index
        .all_files()
        .filter(|(_, node)| node.path.as_deref() == Some(path))
        .map(|(id, _)| id)
        .last()
        .with_context(|| format!("no recorded history for {path}"))
}

pub fn index(ctx: &Context, format: OutputFormat) -> Result<()> {
    let (repo, report) = ctx.rebuild()?;
    let out = match format {
        OutputFormat::Text => format::index_text(repo.index(), &report),
        OutputFormat::Json => format::index_json(repo.index(), &report)?,
    };
    print!("{out}");
    Ok(())
}

pub fn ops(ctx: &Context, path: &str, format: OutputFormat) -> Result<()> {
    let (repo, _) = ctx.rebuild()?;
    let index = repo.index();
    let id = resolve(index, path)?;
    let Some(node) = index.file(id) else {
        bail!("no recorded history for {path}");
    };
    match format {
        OutputFormat::Text => print!("{}", format::operations_text(&node.operations)),
        OutputFormat::Json => println!("{}", format::to_json(&node.operations)?),
    }
    Ok(())
}

pub fn replay(
    ctx: &Context,
    path: &str,
    at: Option<u64>,
    position: Option<usize>,
    lineage: bool,
) -> Result<()> {
    let (repo, _) = ctx.rebuild()?;
    let index = repo.index();
    let id = resolve(index, path)?;
    let timeline = if lineage {
        Timeline::with_lineage(index, id)
    } else {
        Timeline::for_file(index, id)
    };
    let Some(mut timeline) = timeline else {
        bail!("no recorded history for {path}");
    };

    match (at, position) {
        (Some(t), _) => {
            if timeline.find_focal_time(t)?.is_none() {
                bail!("{path} has no operations");
            }
        }
        (None, Some(i)) => {
            timeline.go_to(i)?;
        }
        (None, None) => bail!("pass --at <ms> or --index <n>"),
    }

    if let (Some(i), Some(t)) = (timeline.focal_index(), timeline.focal_time()) {
        info!(index = i, timestamp = t, "focused operation");
    }
    print!("{}", timeline.current_text().unwrap_or_default());
    Ok(())
}
