// Editor interactor - timeline edit commands for the command layer
//
// Every command reports success plus an optional reason; nothing is thrown
// across this boundary.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::domain::edl::{EdlOptions, EdlStore};
use crate::domain::errors::EditError;
use crate::domain::model::{Project, SourceId, TimeSpec, TransitionEffect, TransitionKind};

/// Result of one command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl CommandOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            reason: Some(reason.into()),
        }
    }
}

impl From<Result<(), EditError>> for CommandOutcome {
    fn from(result: Result<(), EditError>) -> Self {
        match result {
            Ok(()) => CommandOutcome::ok(),
            Err(e) => CommandOutcome::failed(e.to_string()),
        }
    }
}

/// One edit command, as written in scripts and `--op` arguments
#[derive(Debug, Clone, PartialEq)]
pub enum EditOp {
    Delete { start: f64, end: f64 },
    Cut { start: f64, end: f64 },
    Copy { start: f64, end: f64 },
    Paste { at: f64 },
    Insert {
        at: f64,
        start: f64,
        end: f64,
        source: Option<SourceId>,
    },
    Transition {
        at: f64,
        kind: TransitionKind,
        duration: f64,
        use_effect_audio: bool,
    },
    Undo,
    Redo,
}

fn time_arg(words: &[&str], index: usize, name: &str) -> Result<f64, EditError> {
    let word = words
        .get(index)
        .ok_or_else(|| EditError::BadArgs(format!("missing {}", name)))?;
    Ok(TimeSpec::parse(word)?.as_seconds())
}

impl EditOp {
    /// Parse e.g. `delete 10 20`, `paste 1:05.5`, `insert 30 b.mp4 0 10`,
    /// `transition 30 fade-black 1 audio`. An insert source of `-` means the
    /// primary source.
    pub fn parse(line: &str) -> Result<Self, EditError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Some((command, rest)) = words.split_first() else {
            return Err(EditError::BadArgs("empty command".to_string()));
        };

        let op = match command.to_ascii_lowercase().as_str() {
            "delete" | "del" => EditOp::Delete {
                start: time_arg(rest, 0, "start")?,
                end: time_arg(rest, 1, "end")?,
            },
            "cut" => EditOp::Cut {
                start: time_arg(rest, 0, "start")?,
                end: time_arg(rest, 1, "end")?,
            },
            "copy" => EditOp::Copy {
                start: time_arg(rest, 0, "start")?,
                end: time_arg(rest, 1, "end")?,
            },
            "paste" => EditOp::Paste {
                at: time_arg(rest, 0, "position")?,
            },
            "insert" => EditOp::Insert {
                at: time_arg(rest, 0, "position")?,
                source: match rest.get(1) {
                    Some(&"-") => None,
                    Some(source) => Some(SourceId::from(*source)),
                    None => return Err(EditError::BadArgs("missing source".to_string())),
                },
                start: time_arg(rest, 2, "source start")?,
                end: time_arg(rest, 3, "source end")?,
            },
            "transition" => EditOp::Transition {
                at: time_arg(rest, 0, "time")?,
                kind: TransitionKind::parse(
                    rest.get(1)
                        .ok_or_else(|| EditError::BadArgs("missing transition kind".to_string()))?,
                )?,
                duration: match rest.get(2) {
                    Some(_) => time_arg(rest, 2, "duration")?,
                    None => 1.0,
                },
                use_effect_audio: rest.get(3).map_or(false, |flag| *flag == "audio"),
            },
            "undo" => EditOp::Undo,
            "redo" => EditOp::Redo,
            other => return Err(EditError::BadArgs(format!("unknown command '{}'", other))),
        };
        Ok(op)
    }
}

impl fmt::Display for EditOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EditOp::Delete { start, end } => write!(f, "delete {} {}", start, end),
            EditOp::Cut { start, end } => write!(f, "cut {} {}", start, end),
            EditOp::Copy { start, end } => write!(f, "copy {} {}", start, end),
            EditOp::Paste { at } => write!(f, "paste {}", at),
            EditOp::Insert {
                at,
                start,
                end,
                source,
            } => match source {
                Some(source) => write!(f, "insert {} {} {} {}", at, source, start, end),
                None => write!(f, "insert {} - {} {}", at, start, end),
            },
            EditOp::Transition {
                at,
                kind,
                duration,
                use_effect_audio,
            } => {
                write!(f, "transition {} {} {}", at, kind, duration)?;
                if *use_effect_audio {
                    f.write_str(" audio")?;
                }
                Ok(())
            }
            EditOp::Undo => f.write_str("undo"),
            EditOp::Redo => f.write_str("redo"),
        }
    }
}

/// Edits one project
#[derive(Debug, Clone, Default)]
pub struct EditorInteractor {
    store: EdlStore,
    transitions: Vec<TransitionEffect>,
    assets: Vec<PathBuf>,
}

impl EditorInteractor {
    pub fn new(options: EdlOptions) -> Self {
        Self {
            store: EdlStore::new(options),
            ..Self::default()
        }
    }

    /// Open a loaded project; edit history starts empty
    pub fn from_project(project: Project, options: EdlOptions) -> Self {
        let mut store = EdlStore::new(options);
        store.restore(project.timeline);
        Self {
            store,
            transitions: project.transitions,
            assets: project.assets,
        }
    }

    /// Current state as a project
    pub fn project(&self) -> Project {
        Project {
            timeline: self.store.timeline().clone(),
            transitions: self.transitions.clone(),
            assets: self.assets.clone(),
        }
    }

    pub fn store(&self) -> &EdlStore {
        &self.store
    }

    pub fn transitions(&self) -> &[TransitionEffect] {
        &self.transitions
    }

    /// Start over from one whole source
    pub fn load_source(&mut self, source: impl Into<SourceId>, duration: f64) -> CommandOutcome {
        self.transitions.clear();
        self.store.load_source(source, duration).into()
    }

    pub fn apply_delete(&mut self, start: f64, end: f64) -> CommandOutcome {
        self.store.delete_range(start, end).into()
    }

    pub fn apply_cut(&mut self, start: f64, end: f64) -> CommandOutcome {
        self.store.cut(start, end).into()
    }

    pub fn apply_copy(&mut self, start: f64, end: f64) -> CommandOutcome {
        self.store.copy(start, end).into()
    }

    pub fn apply_paste(&mut self, at: f64) -> CommandOutcome {
        self.store.paste(at).into()
    }

    pub fn apply_insert(&mut self, at: f64, start: f64, end: f64, source: Option<SourceId>) -> CommandOutcome {
        self.store.insert_source_range(at, start, end, source).into()
    }

    /// Place an effect on the assembled timeline
    pub fn add_transition(&mut self, effect: TransitionEffect) -> CommandOutcome {
        let total = self.store.total_duration();
        if effect.time > total {
            return CommandOutcome::failed(
                EditError::OutOfBounds {
                    position: effect.time,
                    duration: total,
                }
                .to_string(),
            );
        }
        self.transitions.push(effect);
        self.transitions.sort_by(|a, b| a.time.total_cmp(&b.time));
        CommandOutcome::ok()
    }

    pub fn undo(&mut self) -> CommandOutcome {
        self.store.undo().into()
    }

    pub fn redo(&mut self) -> CommandOutcome {
        self.store.redo().into()
    }

    /// Apply one parsed command
    pub fn apply(&mut self, op: &EditOp) -> CommandOutcome {
        let outcome = match op {
            EditOp::Delete { start, end } => self.apply_delete(*start, *end),
            EditOp::Cut { start, end } => self.apply_cut(*start, *end),
            EditOp::Copy { start, end } => self.apply_copy(*start, *end),
            EditOp::Paste { at } => self.apply_paste(*at),
            EditOp::Insert {
                at,
                start,
                end,
                source,
            } => self.apply_insert(*at, *start, *end, source.clone()),
            EditOp::Transition {
                at,
                kind,
                duration,
                use_effect_audio,
            } => match TransitionEffect::new(*at, *kind, *duration, *use_effect_audio) {
                Ok(effect) => self.add_transition(effect),
                Err(e) => CommandOutcome::failed(e.to_string()),
            },
            EditOp::Undo => self.undo(),
            EditOp::Redo => self.redo(),
        };

        if outcome.success {
            info!(
                "{}: {} segments, {:.3}s",
                op,
                self.store.timeline().len(),
                self.store.total_duration()
            );
        } else {
            debug!("{} rejected: {:?}", op, outcome.reason);
        }
        outcome
    }

    /// Parse and apply one command line
    pub fn apply_line(&mut self, line: &str) -> CommandOutcome {
        match EditOp::parse(line) {
            Ok(op) => self.apply(&op),
            Err(e) => CommandOutcome::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::Timeline;

    fn editor() -> EditorInteractor {
        let timeline = Timeline::from_source("a.mp4", 100.0).unwrap();
        EditorInteractor::from_project(Project::new(timeline), EdlOptions::default())
    }

    #[test]
    fn test_parse_ops() {
        assert_eq!(
            EditOp::parse("delete 10 20").unwrap(),
            EditOp::Delete { start: 10.0, end: 20.0 }
        );
        assert_eq!(EditOp::parse("paste 01:05.5").unwrap(), EditOp::Paste { at: 65.5 });
        assert_eq!(
            EditOp::parse("insert 30 b.mp4 0 10").unwrap(),
            EditOp::Insert {
                at: 30.0,
                start: 0.0,
                end: 10.0,
                source: Some(SourceId::from("b.mp4")),
            }
        );
        assert_eq!(
            EditOp::parse("transition 12 flash").unwrap(),
            EditOp::Transition {
                at: 12.0,
                kind: TransitionKind::Flash,
                duration: 1.0,
                use_effect_audio: false,
            }
        );
        assert!(matches!(
            EditOp::parse("insert 0 - 5 6").unwrap(),
            EditOp::Insert { source: None, .. }
        ));
        assert_eq!(EditOp::parse("UNDO").unwrap(), EditOp::Undo);
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        assert!(EditOp::parse("").is_err());
        assert!(EditOp::parse("delete 10").is_err());
        assert!(EditOp::parse("explode 1 2").is_err());
        assert!(EditOp::parse("transition 5 wipe").is_err());
    }

    #[test]
    fn test_display_parses_back() {
        let op = EditOp::Transition {
            at: 12.5,
            kind: TransitionKind::FadeWhite,
            duration: 2.0,
            use_effect_audio: true,
        };
        assert_eq!(EditOp::parse(&op.to_string()).unwrap(), op);
    }

    #[test]
    fn test_failures_are_reported_not_raised() {
        let mut editor = editor();
        let outcome = editor.apply_line("undo");
        assert!(!outcome.success);
        assert_eq!(outcome.reason.as_deref(), Some("Nothing to undo"));

        let outcome = editor.apply_delete(20.0, 10.0);
        assert!(!outcome.success);
        assert!(outcome.reason.is_some());
    }

    #[test]
    fn test_delete_then_undo() {
        let mut editor = editor();
        assert!(editor.apply_line("delete 10 20").success);
        assert_eq!(editor.store().total_duration(), 90.0);
        assert!(editor.apply_line("undo").success);
        assert_eq!(editor.store().total_duration(), 100.0);
    }

    #[test]
    fn test_transitions_stay_sorted_and_bounded() {
        let mut editor = editor();
        assert!(editor.apply_line("transition 50 blur").success);
        assert!(editor.apply_line("transition 10 fade-black 1 audio").success);
        assert!(!editor.apply_line("transition 150 flash").success);
        let times: Vec<f64> = editor.transitions().iter().map(|t| t.time).collect();
        assert_eq!(times, vec![10.0, 50.0]);
        assert_eq!(editor.project().transitions.len(), 2);
    }
}
