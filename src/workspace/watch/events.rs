//! Watch events and notify event conversion.

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind};
use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Filesystem notification as seen by the router.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FileEvent {
    Created(PathBuf),
    Changed(PathBuf),
    Deleted(PathBuf),
    Renamed { from: PathBuf, to: PathBuf },
}

impl FileEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            FileEvent::Created(_) => "created",
            FileEvent::Changed(_) => "changed",
            FileEvent::Deleted(_) => "deleted",
            FileEvent::Renamed { .. } => "renamed",
        }
    }
}

/// Turns raw notify events into [`FileEvent`]s, pairing rename halves.
///
/// Backends report a rename as `From` + `To` (often followed by a `Both`
/// carrying both paths), as a single `Both`, or as `Any` on each side.
/// A `From` with no `To` inside `stale_after` became a move out of the
/// watched tree and is reported as a delete.
#[derive(Debug)]
pub struct RenameAssembler {
    pending_from: Option<(PathBuf, Option<usize>, Instant)>,
    last_pair: Option<(PathBuf, PathBuf)>,
    stale_after: Duration,
}

impl RenameAssembler {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            pending_from: None,
            last_pair: None,
            stale_after,
        }
    }

    /// Convert one notify event.
    pub fn push(&mut self, event: Event) -> Vec<FileEvent> {
        self.push_at(event, Instant::now())
    }

    pub(crate) fn push_at(&mut self, event: Event, now: Instant) -> Vec<FileEvent> {
        let tracker = event.attrs.tracker();
        let mut out = Vec::new();
        let mut paths = event.paths.into_iter();

        match event.kind {
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                out.extend(self.take_pending());
                if let Some(from) = paths.next() {
                    self.pending_from = Some((from, tracker, now));
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                let Some(to) = paths.next() else {
                    return out;
                };
                match self.pending_from.take() {
                    Some((from, from_tracker, _)) if tracker.is_none() || from_tracker == tracker => {
                        self.last_pair = Some((from.clone(), to.clone()));
                        out.push(FileEvent::Renamed { from, to });
                    }
                    other => {
                        self.pending_from = other;
                        out.extend(self.take_pending());
                        out.push(FileEvent::Created(to));
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                out.extend(self.take_pending());
                if let (Some(from), Some(to)) = (paths.next(), paths.next()) {
                    let pair = (from, to);
                    if self.last_pair.as_ref() == Some(&pair) {
                        self.last_pair = None;
                    } else {
                        out.push(FileEvent::Renamed {
                            from: pair.0,
                            to: pair.1,
                        });
                    }
                }
            }
            EventKind::Modify(ModifyKind::Name(_)) => {
                out.extend(self.take_pending());
                for path in paths {
                    if path.exists() {
                        out.push(FileEvent::Created(path));
                    } else {
                        out.push(FileEvent::Deleted(path));
                    }
                }
            }
            EventKind::Modify(ModifyKind::Metadata(_)) => {}
            EventKind::Modify(_) => {
                out.extend(self.take_pending());
                out.extend(paths.map(FileEvent::Changed));
            }
            EventKind::Create(_) => {
                out.extend(self.take_pending());
                out.extend(paths.map(FileEvent::Created));
            }
            EventKind::Remove(_) => {
                out.extend(self.take_pending());
                out.extend(paths.map(FileEvent::Deleted));
            }
            _ => {}
        }
        out
    }

    /// Report a `From` half that waited longer than `stale_after`.
    pub fn flush_stale(&mut self, now: Instant) -> Option<FileEvent> {
        match &self.pending_from {
            Some((_, _, at)) if now.duration_since(*at) >= self.stale_after => self.take_pending(),
            _ => None,
        }
    }

    /// Report any held `From` half unconditionally.
    pub fn drain(&mut self) -> Option<FileEvent> {
        self.take_pending()
    }

    fn take_pending(&mut self) -> Option<FileEvent> {
        self.pending_from
            .take()
            .map(|(from, _, _)| FileEvent::Deleted(from))
    }
}
