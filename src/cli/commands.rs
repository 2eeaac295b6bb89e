//! Command implementations

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tracing::{info, warn};

use crate::adapters::project_file::{self, ProjectDocument, ProjectFormat};
use crate::app::container::{AppContainer, DefaultAppContainer};
use crate::cli::args::{CleanArgs, EditArgs, ExportArgs, InspectArgs, MapArgs, NewArgs};
use crate::cli::{Cli, Commands};
use crate::config::CutlistConfig;
use crate::domain::mapper;
use crate::domain::model::{MediaProbe, Project, SourceId, StreamKind, TimeSpec, Timeline};
use crate::engine::CancelToken;
use crate::planner::transitions::cluster_effects;
use crate::planner::CutPlan;
use crate::utils::{format_duration, format_file_size};
use crate::utils::temp::sweep_stale;

/// Run the parsed command against a fully resolved configuration
pub async fn run(cli: Cli, config: CutlistConfig) -> Result<()> {
    if let Commands::Clean(args) = &cli.command {
        return clean(args, &config);
    }

    let container = DefaultAppContainer::new(config);
    match cli.command {
        Commands::New(args) => new_project(&container, args).await,
        Commands::Edit(args) => edit(&container, args),
        Commands::Inspect(args) => inspect(&container, args).await,
        Commands::Map(args) => map(args),
        Commands::Export(args) => export(&container, args).await,
        Commands::Clean(_) => Ok(()),
    }
}

fn load_project(path: &Path) -> Result<Project> {
    project_file::load(path).with_context(|| format!("Failed to load project {}", path.display()))
}

fn is_project_file(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref(),
        Some("json") | Some("yaml") | Some("yml")
    )
}

/// Execute the new command
pub async fn new_project(container: &DefaultAppContainer, args: NewArgs) -> Result<()> {
    if args.project.exists() && !args.force {
        bail!(
            "Project {} already exists (use --force to replace it)",
            args.project.display()
        );
    }

    let duration = match args.duration {
        Some(duration) => duration,
        None => {
            let probe = container
                .inspect_interactor()
                .inspect(&args.source)
                .await
                .context("Failed to probe source duration")?;
            probe.duration
        }
    };

    let timeline = Timeline::from_source(SourceId::from(args.source.as_path()), duration)
        .map_err(|e| anyhow::anyhow!("Invalid source: {}", e))?;
    let project = Project::new(timeline);
    project_file::save(&project, &args.project)
        .with_context(|| format!("Failed to save project {}", args.project.display()))?;

    info!(
        "Created {} over {} ({})",
        args.project.display(),
        args.source.display(),
        TimeSpec::from_seconds(duration)
    );
    print_timeline(&project);
    Ok(())
}

/// Execute the edit command
///
/// Operations run in order against one store, so copy/paste and undo work
/// across them. The first rejected operation aborts without saving.
pub fn edit(container: &DefaultAppContainer, args: EditArgs) -> Result<()> {
    let mut lines = args.ops.clone();
    if let Some(script) = &args.script {
        let content = std::fs::read_to_string(script)
            .with_context(|| format!("Failed to read script {}", script.display()))?;
        lines.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#'))
                .map(str::to_string),
        );
    }
    if lines.is_empty() {
        bail!("No operations given (use --op or --script)");
    }

    let project = load_project(&args.project)?;
    let mut editor = container.editor(project);

    for (index, line) in lines.iter().enumerate() {
        let outcome = editor.apply_line(line);
        if !outcome.success {
            bail!(
                "Operation {} '{}' rejected: {}; project not saved",
                index + 1,
                line,
                outcome.reason.unwrap_or_default()
            );
        }
    }

    let project = editor.project();
    if args.dry_run {
        info!("Dry run, {} not modified", args.project.display());
    } else {
        project_file::save(&project, &args.project)
            .with_context(|| format!("Failed to save project {}", args.project.display()))?;
        info!("Applied {} operations to {}", lines.len(), args.project.display());
    }
    print_timeline(&project);
    Ok(())
}

#[derive(Debug, Serialize)]
struct ProjectSummary {
    duration: f64,
    segments: usize,
    sources: Vec<SourceId>,
    transitions: usize,
    render_clusters: usize,
    project: ProjectDocument,
}

#[derive(Debug, Serialize)]
struct MediaSummary<'a> {
    probe: &'a MediaProbe,
    #[serde(skip_serializing_if = "Option::is_none")]
    plan: Option<&'a CutPlan>,
}

/// Execute the inspect command
pub async fn inspect(container: &DefaultAppContainer, args: InspectArgs) -> Result<()> {
    if is_project_file(&args.target) {
        if args.plan.is_some() {
            bail!("--plan applies to media files, not projects");
        }
        return inspect_project(container.config(), &args.target, args.json);
    }

    let interactor = container.inspect_interactor();
    let probe = interactor
        .inspect(&args.target)
        .await
        .context("Failed to inspect input file")?;

    let plan = match args.plan.as_deref() {
        Some([start, end]) => Some(
            interactor
                .plan(&args.target, *start, *end)
                .await
                .context("Failed to plan cut")?,
        ),
        Some(_) => bail!("--plan takes START and END"),
        None => None,
    };

    if args.json {
        let summary = MediaSummary {
            probe: &probe,
            plan: plan.as_ref(),
        };
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialize media info to JSON")?;
        println!("{}", json);
    } else {
        display_media_info(&probe);
        if let Some(plan) = &plan {
            display_plan(plan);
        }
    }
    Ok(())
}

fn inspect_project(config: &CutlistConfig, path: &Path, json: bool) -> Result<()> {
    let project = load_project(path)?;
    let duration = project.timeline.total_duration();
    let clusters = cluster_effects(
        &project.transitions,
        duration,
        config.transitions.pad,
        config.transitions.merge_tolerance,
    );

    if json {
        let summary = ProjectSummary {
            duration,
            segments: project.timeline.len(),
            sources: project.timeline.sources(),
            transitions: project.transitions.len(),
            render_clusters: clusters.len(),
            project: ProjectDocument::from_project(&project),
        };
        let json = serde_json::to_string_pretty(&summary).context("Failed to serialize project to JSON")?;
        println!("{}", json);
        return Ok(());
    }

    println!("Project: {} ({:?})", path.display(), ProjectFormat::from_path(path));
    print_timeline(&project);
    if !project.transitions.is_empty() {
        println!("Transitions:");
        for effect in project.sorted_transitions() {
            println!(
                "  {:>12}  {:<12} {:.2}s{}",
                TimeSpec::from_seconds(effect.time).to_string(),
                effect.kind.as_str(),
                effect.duration,
                if effect.use_effect_audio { "  +audio" } else { "" }
            );
        }
        println!("Render clusters:");
        for cluster in &clusters {
            println!(
                "  {} - {}  ({} effects)",
                TimeSpec::from_seconds(cluster.start),
                TimeSpec::from_seconds(cluster.end),
                cluster.effects.len()
            );
        }
    }
    Ok(())
}

/// Execute the map command
pub fn map(args: MapArgs) -> Result<()> {
    let project = load_project(&args.project)?;
    let segments = project.timeline.segments();

    if let Some(at) = args.at {
        match mapper::timeline_to_source(segments, at) {
            Some(position) => println!(
                "{} -> {} @ {:.3}s (segment {})",
                TimeSpec::from_seconds(at),
                position.source,
                position.time,
                position.segment_index
            ),
            None => bail!("Timeline is empty"),
        }
        return Ok(());
    }

    let Some(source_time) = args.source_time else {
        bail!("Either --at or --source-time is required");
    };
    let source = match args.source {
        Some(source) => SourceId::from(source),
        None => project
            .timeline
            .primary_source()
            .cloned()
            .context("Project has no primary source")?,
    };

    if args.nearest {
        let t = mapper::source_to_timeline_nearest(segments, source_time, &source);
        println!("{} @ {:.3}s -> {:.3}s", source, source_time, t);
        return Ok(());
    }

    match mapper::source_to_timeline(segments, source_time, &source) {
        Some(t) => println!("{} @ {:.3}s -> {:.3}s", source, source_time, t),
        None => bail!(
            "{} @ {:.3}s is not on the timeline (use --nearest to snap)",
            source,
            source_time
        ),
    }
    Ok(())
}

/// Execute the export command
pub async fn export(container: &DefaultAppContainer, args: ExportArgs) -> Result<()> {
    let mut project = load_project(&args.project)?;
    if args.no_transitions && !project.transitions.is_empty() {
        info!("Skipping {} transitions", project.transitions.len());
        project.transitions.clear();
    }

    let cancel = CancelToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling export");
            interrupt.cancel();
        }
    });

    let outcome = container
        .export_interactor()
        .request_export(&project, &args.out, cancel)
        .await;

    if !outcome.outcome.success {
        bail!(
            "Export failed: {}",
            outcome.outcome.reason.unwrap_or_else(|| "unknown error".to_string())
        );
    }

    if let Some(report) = outcome.report {
        println!(
            "Exported {} ({}, {} segments, {} transition clusters) in {}",
            report.output.display(),
            TimeSpec::from_seconds(report.duration),
            report.segments,
            report.clusters,
            format_duration(report.elapsed)
        );
        if let Ok(meta) = std::fs::metadata(&report.output) {
            println!("Size: {}", format_file_size(meta.len()));
        }
        if report.normalized {
            println!("Note: inputs were normalized before concatenation");
        }
    }
    Ok(())
}

/// Execute the clean command
pub fn clean(args: &CleanArgs, config: &CutlistConfig) -> Result<()> {
    let root = config.export.scratch_root();
    let max_age = Duration::from_secs(args.older_than_hours.saturating_mul(3600));
    let removed = sweep_stale(&root, max_age);
    println!("Removed {} stale scratch directories from {}", removed, root.display());
    Ok(())
}

fn print_timeline(project: &Project) {
    let segments = project.timeline.segments();
    let offsets = mapper::segment_offsets(segments);
    println!(
        "Timeline: {} segments, {}",
        segments.len(),
        TimeSpec::from_seconds(project.timeline.total_duration())
    );
    for (index, (segment, offset)) in segments.iter().zip(offsets).enumerate() {
        println!(
            "  #{:<3} {:>12} - {:<12} <- {} [{:.3} - {:.3}]",
            index,
            TimeSpec::from_seconds(offset).to_string(),
            TimeSpec::from_seconds(offset + segment.duration()).to_string(),
            segment.source,
            segment.start,
            segment.end
        );
    }
}

fn display_media_info(probe: &MediaProbe) {
    println!("File: {}", probe.path.display());
    println!("Duration: {}", TimeSpec::from_seconds(probe.duration));
    println!("Streams:");
    for stream in &probe.streams {
        let detail = match stream.kind {
            StreamKind::Video => match (stream.width, stream.height) {
                (Some(width), Some(height)) => format!("{}x{}", width, height),
                _ => String::new(),
            },
            StreamKind::Audio => stream
                .sample_rate
                .map(|rate| format!("{} Hz", rate))
                .unwrap_or_default(),
            _ => String::new(),
        };
        println!("  #{} {:?} {} {}", stream.index, stream.kind, stream.codec, detail);
    }
}

fn display_plan(plan: &CutPlan) {
    let (start, end) = plan.range();
    println!(
        "Cut plan for {:.3}s - {:.3}s: {} ({:.3}s re-encoded)",
        start,
        end,
        plan.name(),
        plan.reencoded_seconds()
    );
    for part in plan.parts() {
        println!(
            "  {:<5} {:?} {:.3} - {:.3}",
            part.role.as_str(),
            part.mode,
            part.start,
            part.end
        );
    }
}
