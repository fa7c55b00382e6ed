//! Dependency Tracking
//!
//! A tracking frame records which cells are read while a derived computation
//! runs. Cells report every `read` to the innermost active frame; the derived
//! cell that opened the frame then subscribes to exactly those cells.
//!
//! # Implementation
//!
//! Frames live on a thread-local stack. Entering a frame pushes it, dropping
//! the guard pops it, so nested derived computations each see only their own
//! reads. The stack is per thread: cells are `Rc`-based and the whole core
//! runs on one thread.
//!
//! Tracking is a snapshot. Once a frame is popped nothing else is recorded
//! for it; later recomputations run [`untracked`] and keep the dependency set
//! discovered on the first run.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use super::cell::CellId;
use super::same_value::Path;
use super::subscription::Subscription;

thread_local! {
    static FRAME_STACK: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// Identifier for one entered frame, used to catch mismatched pops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FrameId(u64);

impl FrameId {
    fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// Which parts of a cell a computation read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reads {
    /// The whole value was read at least once.
    Whole,
    /// Only these sub-paths were read.
    Paths(Vec<Path>),
}

impl Reads {
    fn merge(&mut self, path: Option<&[String]>) {
        match (self, path) {
            (Reads::Whole, _) => {}
            (this, None) => *this = Reads::Whole,
            (Reads::Paths(paths), Some(path)) => {
                if !paths.iter().any(|p| p.as_slice() == path) {
                    paths.push(path.iter().cloned().collect());
                }
            }
        }
    }

    fn from_path(path: Option<&[String]>) -> Self {
        match path {
            None => Reads::Whole,
            Some(path) => Reads::Paths(vec![path.iter().cloned().collect()]),
        }
    }
}

/// A cell seen from the tracker: identity plus the ability to watch it.
pub(crate) trait Source {
    fn id(&self) -> CellId;

    /// Subscribe to `changed`, invoking `on_change` only when the value
    /// differs at one of the recorded reads.
    fn watch(&self, reads: Reads, on_change: Rc<dyn Fn()>) -> Subscription;
}

/// A discovered dependency.
pub(crate) struct Dependency {
    pub(crate) source: Rc<dyn Source>,
    pub(crate) reads: Reads,
}

impl std::fmt::Debug for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dependency")
            .field("cell", &self.source.id())
            .field("reads", &self.reads)
            .finish()
    }
}

struct Frame {
    id: FrameId,
    recording: bool,
    dependencies: IndexMap<CellId, Dependency>,
}

/// Guard for an active tracking frame. Pops the frame when dropped, even if
/// the computation panics.
pub struct TrackingFrame {
    id: FrameId,
}

impl TrackingFrame {
    /// Enter a new recording frame.
    pub fn enter() -> Self {
        Self::push(true)
    }

    fn push(recording: bool) -> Self {
        let id = FrameId::new();
        FRAME_STACK.with(|stack| {
            stack.borrow_mut().push(Frame {
                id,
                recording,
                dependencies: IndexMap::new(),
            });
        });
        Self { id }
    }

    /// Whether reads on this thread are currently being recorded.
    pub fn is_active() -> bool {
        FRAME_STACK.with(|stack| stack.borrow().last().is_some_and(|frame| frame.recording))
    }

    /// Record a read of `source` in the innermost frame.
    pub(crate) fn track(source: Rc<dyn Source>, path: Option<&[String]>) {
        FRAME_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let Some(frame) = stack.last_mut().filter(|frame| frame.recording) else {
                return;
            };
            frame
                .dependencies
                .entry(source.id())
                .and_modify(|dep| dep.reads.merge(path))
                .or_insert_with(|| Dependency {
                    reads: Reads::from_path(path),
                    source,
                });
        });
    }

    /// IDs of the cells recorded so far in this frame, in first-read order.
    pub fn tracked_cells(&self) -> Vec<CellId> {
        self.with_frame(|frame| frame.dependencies.keys().copied().collect())
    }

    /// Take the dependencies recorded so far.
    pub(crate) fn take_dependencies(&self) -> Vec<Dependency> {
        self.with_frame(|frame| {
            std::mem::take(&mut frame.dependencies)
                .into_values()
                .collect()
        })
    }

    fn with_frame<R: Default>(&self, f: impl FnOnce(&mut Frame) -> R) -> R {
        FRAME_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.last_mut() {
                Some(frame) if frame.id == self.id => f(frame),
                _ => R::default(),
            }
        })
    }
}

impl Drop for TrackingFrame {
    fn drop(&mut self) {
        FRAME_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(frame) = popped {
                debug_assert_eq!(
                    frame.id, self.id,
                    "TrackingFrame mismatch: expected {:?}, got {:?}",
                    self.id,
                    frame.id
                );
            }
        });
    }
}

/// Run `f` without recording any reads into the enclosing frame.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _frame = TrackingFrame::push(false);
    f()
}
