// Project file adapter - JSON or YAML persistence of project state
//
// Loading restores the timeline only; edit history always starts empty.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::model::{Project, Segment, SourceId, Timeline, TransitionEffect};
use crate::error::{CutlistError, CutlistResult};

/// Current on-disk format version
pub const PROJECT_VERSION: u32 = 1;

/// Serialization format, chosen by file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectFormat {
    Json,
    Yaml,
}

impl ProjectFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .as_deref()
        {
            Some("yaml") | Some("yml") => ProjectFormat::Yaml,
            _ => ProjectFormat::Json,
        }
    }
}

/// Stored segment; a missing source means the primary source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredSegment {
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceId>,
}

/// On-disk project document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectDocument {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub primary_source: Option<SourceId>,
    #[serde(default)]
    pub segments: Vec<StoredSegment>,
    #[serde(default)]
    pub applied_transitions: Vec<TransitionEffect>,
    #[serde(default)]
    pub assets: Vec<PathBuf>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

fn default_version() -> u32 {
    PROJECT_VERSION
}

fn project_error(message: impl Into<String>) -> CutlistError {
    CutlistError::Project {
        message: message.into(),
    }
}

impl ProjectDocument {
    pub fn from_project(project: &Project) -> Self {
        let primary = project.timeline.primary_source().cloned();
        let segments = project
            .timeline
            .segments()
            .iter()
            .map(|segment| StoredSegment {
                start: segment.start,
                end: segment.end,
                source: (Some(&segment.source) != primary.as_ref()).then(|| segment.source.clone()),
            })
            .collect();

        Self {
            version: PROJECT_VERSION,
            primary_source: primary,
            segments,
            applied_transitions: project.transitions.clone(),
            assets: project.assets.clone(),
            saved_at: Some(Utc::now()),
        }
    }

    /// Rebuild the project, resolving omitted sources to the primary one
    pub fn into_project(self) -> CutlistResult<Project> {
        if self.version > PROJECT_VERSION {
            return Err(project_error(format!(
                "project version {} is newer than supported version {}",
                self.version, PROJECT_VERSION
            )));
        }

        let mut segments = Vec::with_capacity(self.segments.len());
        for (index, stored) in self.segments.into_iter().enumerate() {
            let source = stored
                .source
                .or_else(|| self.primary_source.clone())
                .ok_or_else(|| project_error(format!("segment {} has no source and no primary source is set", index)))?;
            let segment = Segment::new(stored.start, stored.end, source)
                .map_err(|e| project_error(format!("segment {}: {}", index, e)))?;
            segments.push(segment);
        }

        let timeline = Timeline::from_segments(segments, self.primary_source)
            .map_err(|e| project_error(e.to_string()))?;
        Ok(Project {
            timeline,
            transitions: self.applied_transitions,
            assets: self.assets,
        })
    }
}

pub fn to_string(project: &Project, format: ProjectFormat) -> CutlistResult<String> {
    let document = ProjectDocument::from_project(project);
    match format {
        ProjectFormat::Json => Ok(serde_json::to_string_pretty(&document)?),
        ProjectFormat::Yaml => serde_yaml::to_string(&document).map_err(|e| project_error(e.to_string())),
    }
}

pub fn from_str(content: &str, format: ProjectFormat) -> CutlistResult<Project> {
    let document: ProjectDocument = match format {
        ProjectFormat::Json => {
            serde_json::from_str(content).map_err(|e| project_error(format!("invalid JSON: {}", e)))?
        }
        ProjectFormat::Yaml => {
            serde_yaml::from_str(content).map_err(|e| project_error(format!("invalid YAML: {}", e)))?
        }
    };
    document.into_project()
}

/// Read a project file
pub fn load(path: &Path) -> CutlistResult<Project> {
    let content = fs::read_to_string(path)
        .map_err(|e| project_error(format!("cannot read {}: {}", path.display(), e)))?;
    let project = from_str(&content, ProjectFormat::from_path(path))?;
    info!(
        "Loaded {} ({} segments, {:.3}s)",
        path.display(),
        project.timeline.len(),
        project.timeline.total_duration()
    );
    Ok(project)
}

/// Write a project file, replacing any previous version atomically
pub fn save(project: &Project, path: &Path) -> CutlistResult<()> {
    let content = to_string(project, ProjectFormat::from_path(path))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir)?;

    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    staged.write_all(content.as_bytes())?;
    staged.persist(path).map_err(|e| CutlistError::Io(e.error))?;
    info!("Saved {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::TransitionKind;

    fn project() -> Project {
        let timeline = Timeline::from_segments(
            vec![
                Segment::new(0.0, 10.0, "a.mp4").unwrap(),
                Segment::new(5.0, 15.0, "b.mp4").unwrap(),
            ],
            Some(SourceId::from("a.mp4")),
        )
        .unwrap();
        Project {
            timeline,
            transitions: vec![TransitionEffect::new(10.0, TransitionKind::FadeBlack, 1.0, true).unwrap()],
            assets: vec![PathBuf::from("sounds/flash.wav")],
        }
    }

    #[test]
    fn test_primary_source_is_not_repeated() {
        let document = ProjectDocument::from_project(&project());
        assert_eq!(document.segments[0].source, None);
        assert_eq!(document.segments[1].source, Some(SourceId::from("b.mp4")));
    }

    #[test]
    fn test_json_and_yaml_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["edit.json", "edit.yaml"] {
            let path = dir.path().join(name);
            save(&project(), &path).unwrap();
            assert_eq!(load(&path).unwrap(), project());
        }
    }

    #[test]
    fn test_missing_source_defaults_to_primary() {
        let json = r#"{
            "version": 1,
            "primary_source": "a.mp4",
            "segments": [{"start": 0, "end": 10}, {"start": 20, "end": 30, "source": "b.mp4"}]
        }"#;
        let project = from_str(json, ProjectFormat::Json).unwrap();
        assert_eq!(project.timeline.segments()[0].source, SourceId::from("a.mp4"));
        assert_eq!(project.timeline.segments()[1].source, SourceId::from("b.mp4"));
        assert!(project.transitions.is_empty());
    }

    #[test]
    fn test_invalid_documents() {
        let orphan = r#"{"segments": [{"start": 0, "end": 10}]}"#;
        assert!(matches!(from_str(orphan, ProjectFormat::Json), Err(CutlistError::Project { .. })));

        let inverted = r#"{"primary_source": "a.mp4", "segments": [{"start": 10, "end": 5}]}"#;
        assert!(from_str(inverted, ProjectFormat::Json).is_err());

        let future = r#"{"version": 99}"#;
        assert!(from_str(future, ProjectFormat::Json).is_err());
    }

    #[test]
    fn test_format_from_extension() {
        assert_eq!(ProjectFormat::from_path(Path::new("a.YML")), ProjectFormat::Yaml);
        assert_eq!(ProjectFormat::from_path(Path::new("a.cutlist")), ProjectFormat::Json);
    }
}
