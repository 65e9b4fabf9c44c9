//! Task scheduling state machine.
//!
//! Every map and reduce task moves through
//! `Pending --dispatch--> Running --report--> Completed`, and a watchdog moves a
//! task that stays `Running` too long back to `Pending`. Workers are never
//! tracked: the phase of a task is the only source of truth, and a late report
//! from a straggler is resolved against the current phase under the lock.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use common::naming;

use crate::error::{CoordinatorError, Result};

pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Map,
    Reduce,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Map => write!(f, "map"),
            TaskKind::Reduce => write!(f, "reduce"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Pending,
    Running,
    Completed,
}

/// Scheduling knobs of a job.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Number of reduce buckets.
    pub n_reduce: u32,

    /// How long a dispatched task may run before it is handed out again.
    pub task_timeout: Duration,

    /// Upper bound between re-scans while `get_task` has nothing to hand out.
    pub backoff: Duration,

    /// Shared directory where staged files are published.
    pub work_dir: PathBuf,
}

impl SchedulerConfig {
    pub fn new(n_reduce: u32, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            n_reduce,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            backoff: DEFAULT_BACKOFF,
            work_dir: work_dir.into(),
        }
    }
}

/// What a worker is asked to do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Assignment {
    Map {
        index: u32,
        file_name: String,
        n_reduce: u32,
    },
    Reduce {
        index: u32,
    },
    /// The job is done; stop polling.
    Exit,
}

/// A worker's completion report.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub kind: TaskKind,
    pub index: u32,

    /// Input file of a map task, checked against the descriptor when present.
    pub file_name: Option<String>,

    /// Final file name -> staged temporary file path.
    pub staged_output: HashMap<String, String>,
}

#[derive(Debug, Clone)]
struct TaskState {
    phase: TaskPhase,

    /// Bumped on every dispatch, so a watchdog only acts on its own attempt.
    attempt: u32,

    /// A report is publishing this task's files outside the lock.
    committing: bool,
}

impl TaskState {
    fn new() -> Self {
        Self {
            phase: TaskPhase::Pending,
            attempt: 0,
            committing: false,
        }
    }

    fn is_available(&self) -> bool {
        self.phase == TaskPhase::Pending && !self.committing
    }
}

#[derive(Debug)]
struct MapTaskDescriptor {
    input_file_name: String,
    state: TaskState,
}

#[derive(Debug)]
struct ReduceTaskDescriptor {
    state: TaskState,
}

/// All scheduling state, guarded by one lock.
#[derive(Debug)]
struct JobState {
    map_tasks: Vec<MapTaskDescriptor>,
    reduce_tasks: Vec<ReduceTaskDescriptor>,
    completed_maps: usize,
    completed_reduces: usize,
    n_reduce: u32,
}

impl JobState {
    fn new(files: Vec<String>, n_reduce: u32) -> Self {
        let map_tasks = files
            .into_iter()
            .map(|input_file_name| MapTaskDescriptor {
                input_file_name,
                state: TaskState::new(),
            })
            .collect();
        let reduce_tasks = (0..n_reduce)
            .map(|_| ReduceTaskDescriptor {
                state: TaskState::new(),
            })
            .collect();

        Self {
            map_tasks,
            reduce_tasks,
            completed_maps: 0,
            completed_reduces: 0,
            n_reduce,
        }
    }

    fn map_phase_done(&self) -> bool {
        self.completed_maps == self.map_tasks.len()
    }

    fn is_done(&self) -> bool {
        self.map_phase_done() && self.completed_reduces == self.reduce_tasks.len()
    }

    /// Hand out the first pending task, maps strictly before reduces.
    ///
    /// Returns the assignment and the attempt number it was dispatched as.
    fn dispatch(&mut self) -> Option<(Assignment, TaskKind, u32, u32)> {
        if !self.map_phase_done() {
            let n_reduce = self.n_reduce;
            let (index, task) = self
                .map_tasks
                .iter_mut()
                .enumerate()
                .find(|(_, task)| task.state.is_available())?;
            task.state.phase = TaskPhase::Running;
            task.state.attempt += 1;

            let assignment = Assignment::Map {
                index: index as u32,
                file_name: task.input_file_name.clone(),
                n_reduce,
            };
            return Some((assignment, TaskKind::Map, index as u32, task.state.attempt));
        }

        let (index, task) = self
            .reduce_tasks
            .iter_mut()
            .enumerate()
            .find(|(_, task)| task.state.is_available())?;
        task.state.phase = TaskPhase::Running;
        task.state.attempt += 1;

        let assignment = Assignment::Reduce {
            index: index as u32,
        };
        Some((assignment, TaskKind::Reduce, index as u32, task.state.attempt))
    }

    fn task_mut(&mut self, kind: TaskKind, index: u32) -> Result<&mut TaskState> {
        let state = match kind {
            TaskKind::Map => self.map_tasks.get_mut(index as usize).map(|t| &mut t.state),
            TaskKind::Reduce => self
                .reduce_tasks
                .get_mut(index as usize)
                .map(|t| &mut t.state),
        };
        state.ok_or(CoordinatorError::UnknownTask { kind, index })
    }

    fn mark_completed(&mut self, kind: TaskKind, index: u32) -> Result<()> {
        let task = self.task_mut(kind, index)?;
        task.phase = TaskPhase::Completed;
        task.committing = false;
        match kind {
            TaskKind::Map => self.completed_maps += 1,
            TaskKind::Reduce => self.completed_reduces += 1,
        }
        Ok(())
    }
}

/// Point-in-time view of the job, for status reporting and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSnapshot {
    pub map_phases: Vec<TaskPhase>,
    pub reduce_phases: Vec<TaskPhase>,
    pub completed_maps: usize,
    pub completed_reduces: usize,
}

#[derive(Debug)]
struct Inner {
    state: Mutex<JobState>,
    /// Signalled on every change that could make a task available.
    changed: Notify,
    config: SchedulerConfig,
    /// Canonical form of `config.work_dir`.
    work_dir: PathBuf,
}

/// The coordinator's scheduler. Cheap to clone; clones share the job.
#[derive(Debug, Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    /// Create a job with one map task per input file and `n_reduce` reduce
    /// tasks, all pending.
    pub fn new(files: Vec<String>, config: SchedulerConfig) -> Result<Self> {
        if config.n_reduce == 0 {
            return Err(CoordinatorError::InvalidConfig(
                "n_reduce must be at least 1".to_string(),
            ));
        }

        info!(
            "New job with {} map tasks and {} reduce tasks",
            files.len(),
            config.n_reduce
        );

        let work_dir =
            std::fs::canonicalize(&config.work_dir).unwrap_or_else(|_| config.work_dir.clone());

        Ok(Self {
            inner: Arc::new(Inner {
                state: Mutex::new(JobState::new(files, config.n_reduce)),
                changed: Notify::new(),
                config,
                work_dir,
            }),
        })
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Wait until a task can be handed out and mark it running.
    ///
    /// Returns [`Assignment::Exit`] once the job is done.
    pub async fn get_task(&self) -> Assignment {
        loop {
            let changed = {
                let mut state = self.inner.state.lock().await;
                if state.is_done() {
                    return Assignment::Exit;
                }

                if let Some((assignment, kind, index, attempt)) = state.dispatch() {
                    drop(state);
                    info!("Dispatched {kind} task {index} (attempt {attempt})");
                    self.spawn_watchdog(kind, index, attempt);
                    return assignment;
                }

                // Registered before the lock is released, so no change is missed.
                self.inner.changed.notified()
            };

            tokio::select! {
                _ = changed => {},
                _ = tokio::time::sleep(self.inner.config.backoff) => {},
            }
        }
    }

    /// Apply a completion report.
    ///
    /// Returns `Ok(true)` if this report completed the task and `Ok(false)` if
    /// the task was already completed (or being completed) by another report.
    pub async fn complete_task(&self, report: TaskReport) -> Result<bool> {
        let TaskReport {
            kind,
            index,
            file_name,
            staged_output,
        } = report;

        let staged = self.validate_staged(kind, index, &staged_output).await?;

        {
            let mut state = self.inner.state.lock().await;

            if let (TaskKind::Map, Some(file_name)) = (kind, &file_name) {
                let expected = state
                    .map_tasks
                    .get(index as usize)
                    .map(|t| t.input_file_name.as_str());
                if expected.is_some_and(|expected| expected != file_name) {
                    return Err(CoordinatorError::InvalidReport(format!(
                        "map task {index} reads {}, not {file_name}",
                        expected.unwrap_or_default()
                    )));
                }
            }

            let task = state.task_mut(kind, index)?;
            if task.phase == TaskPhase::Completed || task.committing {
                drop(state);
                warn!("Ignoring stale report for {kind} task {index}");
                discard_staged(&staged).await;
                return Ok(false);
            }
            task.committing = true;
        }

        if let Err(e) = publish(&staged).await {
            let mut state = self.inner.state.lock().await;
            let task = state.task_mut(kind, index)?;
            task.committing = false;
            task.phase = TaskPhase::Pending;
            drop(state);
            self.inner.changed.notify_waiters();
            return Err(e);
        }

        {
            let mut state = self.inner.state.lock().await;
            state.mark_completed(kind, index)?;
            info!(
                "Completed {kind} task {index} ({}/{} maps, {}/{} reduces)",
                state.completed_maps,
                state.map_tasks.len(),
                state.completed_reduces,
                state.reduce_tasks.len()
            );
        }
        self.inner.changed.notify_waiters();

        Ok(true)
    }

    /// Whether every map and reduce task has completed.
    pub async fn done(&self) -> bool {
        self.inner.state.lock().await.is_done()
    }

    pub async fn snapshot(&self) -> JobSnapshot {
        let state = self.inner.state.lock().await;
        JobSnapshot {
            map_phases: state.map_tasks.iter().map(|t| t.state.phase).collect(),
            reduce_phases: state.reduce_tasks.iter().map(|t| t.state.phase).collect(),
            completed_maps: state.completed_maps,
            completed_reduces: state.completed_reduces,
        }
    }

    /// Put the task back into the pool if `attempt` is still running after the
    /// timeout.
    fn spawn_watchdog(&self, kind: TaskKind, index: u32, attempt: u32) {
        let inner = self.inner.clone();
        tokio::spawn(async move {
            tokio::time::sleep(inner.config.task_timeout).await;

            let mut state = inner.state.lock().await;
            let Ok(task) = state.task_mut(kind, index) else {
                return;
            };
            if task.phase == TaskPhase::Running && task.attempt == attempt && !task.committing {
                task.phase = TaskPhase::Pending;
                drop(state);
                info!("{kind} task {index} timed out (attempt {attempt}), reassigning");
                inner.changed.notify_waiters();
            }
        });
    }

    /// Check a report's `(final name, staged path)` pairs and resolve them
    /// against the work directory.
    ///
    /// Final names must be the task's own canonical outputs, and staged
    /// files must be hidden files directly inside the work directory.
    async fn validate_staged(
        &self,
        kind: TaskKind,
        index: u32,
        staged_output: &HashMap<String, String>,
    ) -> Result<Vec<(PathBuf, PathBuf)>> {
        let mut staged = Vec::with_capacity(staged_output.len());
        for (final_name, path) in staged_output {
            if !self.owns_output(kind, index, final_name) {
                return Err(CoordinatorError::InvalidReport(format!(
                    "`{final_name}` is not an output of {kind} task {index}"
                )));
            }

            let path = PathBuf::from(path);
            if !is_staged_file(&path) || !self.in_work_dir(&path).await {
                return Err(CoordinatorError::InvalidReport(format!(
                    "`{}` is not a staged file in the work directory",
                    path.display()
                )));
            }
            staged.push((path, self.inner.config.work_dir.join(final_name)));
        }
        Ok(staged)
    }

    fn owns_output(&self, kind: TaskKind, index: u32, final_name: &str) -> bool {
        match kind {
            TaskKind::Map => naming::parse_intermediate(final_name).is_some_and(
                |(map_index, bucket)| {
                    map_index == index
                        && bucket < self.inner.config.n_reduce
                        && final_name == naming::intermediate_file(map_index, bucket)
                },
            ),
            TaskKind::Reduce => final_name == naming::result_file(index),
        }
    }

    async fn in_work_dir(&self, path: &Path) -> bool {
        let Some(parent) = path.parent() else {
            return false;
        };
        match tokio::fs::canonicalize(parent).await {
            Ok(parent) => parent == self.inner.work_dir,
            Err(_) => false,
        }
    }
}

fn is_staged_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.') && n.len() > 1 && n != "..")
}

/// Atomically rename every staged file into place.
///
/// On failure the files not yet renamed are removed.
async fn publish(staged: &[(PathBuf, PathBuf)]) -> Result<()> {
    for (i, (from, to)) in staged.iter().enumerate() {
        if let Err(source) = tokio::fs::rename(from, to).await {
            discard_staged(&staged[i..]).await;
            return Err(CoordinatorError::Publish {
                file: to.display().to_string(),
                source,
            });
        }
        debug!("Published {} -> {}", from.display(), to.display());
    }
    Ok(())
}

/// Remove the staged files of a report that lost the race.
async fn discard_staged(staged: &[(PathBuf, PathBuf)]) {
    for (from, _) in staged {
        if let Err(e) = tokio::fs::remove_file(from).await {
            warn!("Failed to remove orphaned file {}: {}", from.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    fn scheduler(files: &[&str], n_reduce: u32) -> Scheduler {
        let files = files.iter().map(|f| f.to_string()).collect();
        Scheduler::new(files, SchedulerConfig::new(n_reduce, "/nonexistent")).unwrap()
    }

    fn report(kind: TaskKind, index: u32) -> TaskReport {
        TaskReport {
            kind,
            index,
            file_name: None,
            staged_output: HashMap::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn maps_then_reduces_in_index_order() {
        let s = scheduler(&["a.txt", "b.txt"], 2);

        assert_eq!(
            s.get_task().await,
            Assignment::Map {
                index: 0,
                file_name: "a.txt".into(),
                n_reduce: 2
            }
        );
        assert_eq!(
            s.get_task().await,
            Assignment::Map {
                index: 1,
                file_name: "b.txt".into(),
                n_reduce: 2
            }
        );

        // Nothing pending and the map phase is unfinished: reduces are held back.
        assert!(timeout(Duration::from_secs(2), s.get_task()).await.is_err());

        assert!(s.complete_task(report(TaskKind::Map, 0)).await.unwrap());
        assert!(timeout(Duration::from_secs(2), s.get_task()).await.is_err());

        assert!(s.complete_task(report(TaskKind::Map, 1)).await.unwrap());
        assert_eq!(s.get_task().await, Assignment::Reduce { index: 0 });
        assert_eq!(s.get_task().await, Assignment::Reduce { index: 1 });
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_reports_count_once() {
        let s = scheduler(&["a.txt"], 1);

        s.get_task().await;
        assert!(s.complete_task(report(TaskKind::Map, 0)).await.unwrap());
        assert!(!s.complete_task(report(TaskKind::Map, 0)).await.unwrap());

        assert_eq!(s.get_task().await, Assignment::Reduce { index: 0 });
        assert!(s.complete_task(report(TaskKind::Reduce, 0)).await.unwrap());
        assert!(!s.complete_task(report(TaskKind::Reduce, 0)).await.unwrap());

        let snapshot = s.snapshot().await;
        assert_eq!(snapshot.completed_maps, 1);
        assert_eq!(snapshot.completed_reduces, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn silent_task_is_reassigned_after_timeout() {
        let s = scheduler(&["a.txt"], 1);

        s.get_task().await;
        assert_eq!(s.snapshot().await.map_phases, vec![TaskPhase::Running]);

        tokio::time::sleep(DEFAULT_TASK_TIMEOUT - Duration::from_secs(1)).await;
        assert_eq!(s.snapshot().await.map_phases, vec![TaskPhase::Running]);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(s.snapshot().await.map_phases, vec![TaskPhase::Pending]);

        assert_eq!(
            s.get_task().await,
            Assignment::Map {
                index: 0,
                file_name: "a.txt".into(),
                n_reduce: 1
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_request_wakes_on_reassignment() {
        let s = scheduler(&["a.txt"], 1);
        s.get_task().await;

        let waiter = {
            let s = s.clone();
            tokio::spawn(async move { s.get_task().await })
        };

        let assignment = timeout(DEFAULT_TASK_TIMEOUT * 2, waiter)
            .await
            .expect("waiter should be handed the reclaimed task")
            .unwrap();
        assert!(matches!(assignment, Assignment::Map { index: 0, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn straggler_and_replacement_count_once() {
        let s = scheduler(&["a.txt"], 1);

        // The first worker goes quiet and its task is handed to a second one.
        s.get_task().await;
        tokio::time::sleep(DEFAULT_TASK_TIMEOUT + Duration::from_secs(1)).await;
        assert!(matches!(s.get_task().await, Assignment::Map { index: 0, .. }));

        assert!(s.complete_task(report(TaskKind::Map, 0)).await.unwrap());
        assert!(!s.complete_task(report(TaskKind::Map, 0)).await.unwrap());

        let snapshot = s.snapshot().await;
        assert_eq!(snapshot.completed_maps, 1);
        assert_eq!(snapshot.map_phases, vec![TaskPhase::Completed]);
    }

    #[tokio::test(start_paused = true)]
    async fn late_report_after_reset_is_accepted() {
        let s = scheduler(&["a.txt"], 1);

        s.get_task().await;
        tokio::time::sleep(DEFAULT_TASK_TIMEOUT + Duration::from_secs(1)).await;
        assert_eq!(s.snapshot().await.map_phases, vec![TaskPhase::Pending]);

        assert!(s.complete_task(report(TaskKind::Map, 0)).await.unwrap());
        assert_eq!(s.get_task().await, Assignment::Reduce { index: 0 });
    }

    #[tokio::test(start_paused = true)]
    async fn completed_task_is_not_reset_by_its_watchdog() {
        let s = scheduler(&["a.txt"], 1);

        s.get_task().await;
        s.complete_task(report(TaskKind::Map, 0)).await.unwrap();
        tokio::time::sleep(DEFAULT_TASK_TIMEOUT * 2).await;

        assert_eq!(s.snapshot().await.map_phases, vec![TaskPhase::Completed]);
    }

    #[tokio::test(start_paused = true)]
    async fn done_only_when_every_task_completed() {
        let s = scheduler(&["a.txt", "b.txt"], 2);
        assert!(!s.done().await);

        for _ in 0..2 {
            if let Assignment::Map { index, .. } = s.get_task().await {
                s.complete_task(report(TaskKind::Map, index)).await.unwrap();
            }
        }
        assert!(!s.done().await);

        s.get_task().await;
        s.complete_task(report(TaskKind::Reduce, 0)).await.unwrap();
        assert!(!s.done().await);

        s.get_task().await;
        s.complete_task(report(TaskKind::Reduce, 1)).await.unwrap();
        assert!(s.done().await);

        assert_eq!(s.get_task().await, Assignment::Exit);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_request_exits_when_job_finishes() {
        let s = scheduler(&[], 1);
        assert_eq!(s.get_task().await, Assignment::Reduce { index: 0 });

        let waiter = {
            let s = s.clone();
            tokio::spawn(async move { s.get_task().await })
        };
        tokio::task::yield_now().await;

        s.complete_task(report(TaskKind::Reduce, 0)).await.unwrap();
        assert_eq!(waiter.await.unwrap(), Assignment::Exit);
    }

    #[tokio::test]
    async fn rejects_unknown_tasks_and_bad_config() {
        assert!(matches!(
            Scheduler::new(vec![], SchedulerConfig::new(0, ".")),
            Err(CoordinatorError::InvalidConfig(_))
        ));

        let s = scheduler(&["a.txt"], 1);
        assert!(matches!(
            s.complete_task(report(TaskKind::Map, 3)).await,
            Err(CoordinatorError::UnknownTask {
                kind: TaskKind::Map,
                index: 3
            })
        ));
        assert!(matches!(
            s.complete_task(report(TaskKind::Reduce, 1)).await,
            Err(CoordinatorError::UnknownTask { .. })
        ));

        let mut mismatched = report(TaskKind::Map, 0);
        mismatched.file_name = Some("other.txt".into());
        assert!(matches!(
            s.complete_task(mismatched).await,
            Err(CoordinatorError::InvalidReport(_))
        ));

        let mut escaping = report(TaskKind::Map, 0);
        escaping
            .staged_output
            .insert("../intermediate-0-0".into(), "/tmp/.x".into());
        assert!(matches!(
            s.complete_task(escaping).await,
            Err(CoordinatorError::InvalidReport(_))
        ));
    }

    #[tokio::test]
    async fn publishes_staged_files_atomically_and_discards_stragglers() {
        let dir = tempfile::tempdir().unwrap();
        let s = Scheduler::new(
            vec!["a.txt".into()],
            SchedulerConfig::new(2, dir.path()),
        )
        .unwrap();

        let stage = |name: &str, body: &str| {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            path.display().to_string()
        };

        s.get_task().await;
        let first = TaskReport {
            kind: TaskKind::Map,
            index: 0,
            file_name: Some("a.txt".into()),
            staged_output: HashMap::from([
                ("intermediate-0-0".to_string(), stage(".intermediate-0-0-aaa", "zero")),
                ("intermediate-0-1".to_string(), stage(".intermediate-0-1-aaa", "one")),
            ]),
        };
        assert!(s.complete_task(first).await.unwrap());

        assert_eq!(
            std::fs::read_to_string(dir.path().join("intermediate-0-0")).unwrap(),
            "zero"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("intermediate-0-1")).unwrap(),
            "one"
        );
        assert!(!dir.path().join(".intermediate-0-0-aaa").exists());

        let straggler_file = stage(".intermediate-0-0-bbb", "late");
        let straggler = TaskReport {
            kind: TaskKind::Map,
            index: 0,
            file_name: Some("a.txt".into()),
            staged_output: HashMap::from([(
                "intermediate-0-0".to_string(),
                straggler_file.clone(),
            )]),
        };
        assert!(!s.complete_task(straggler).await.unwrap());

        assert!(!Path::new(&straggler_file).exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("intermediate-0-0")).unwrap(),
            "zero"
        );
        assert_eq!(s.snapshot().await.completed_maps, 1);
    }

    #[tokio::test]
    async fn failed_publish_returns_task_to_pending() {
        let dir = tempfile::tempdir().unwrap();
        let s = Scheduler::new(vec!["a.txt".into()], SchedulerConfig::new(1, dir.path())).unwrap();

        s.get_task().await;
        let missing = dir.path().join(".intermediate-0-0-gone");
        let report = TaskReport {
            kind: TaskKind::Map,
            index: 0,
            file_name: None,
            staged_output: HashMap::from([(
                "intermediate-0-0".to_string(),
                missing.display().to_string(),
            )]),
        };

        assert!(matches!(
            s.complete_task(report).await,
            Err(CoordinatorError::Publish { .. })
        ));
        let snapshot = s.snapshot().await;
        assert_eq!(snapshot.map_phases, vec![TaskPhase::Pending]);
        assert_eq!(snapshot.completed_maps, 0);
    }

    #[tokio::test]
    async fn failed_publish_leaves_no_staged_files() {
        let dir = tempfile::tempdir().unwrap();
        let s = Scheduler::new(vec!["a.txt".into()], SchedulerConfig::new(2, dir.path())).unwrap();

        s.get_task().await;
        let present = dir.path().join(".intermediate-0-1-aaa");
        std::fs::write(&present, "one").unwrap();
        let report = TaskReport {
            kind: TaskKind::Map,
            index: 0,
            file_name: None,
            staged_output: HashMap::from([
                (
                    "intermediate-0-0".to_string(),
                    dir.path().join(".intermediate-0-0-gone").display().to_string(),
                ),
                ("intermediate-0-1".to_string(), present.display().to_string()),
            ]),
        };

        assert!(s.complete_task(report).await.is_err());
        assert!(!present.exists());
        assert_eq!(s.snapshot().await.map_phases, vec![TaskPhase::Pending]);
    }

    #[tokio::test(start_paused = true)]
    async fn watchdog_of_failed_attempt_spares_the_next_one() {
        let dir = tempfile::tempdir().unwrap();
        let s = Scheduler::new(vec!["a.txt".into()], SchedulerConfig::new(1, dir.path())).unwrap();

        // Attempt 1 at t=0; its watchdog fires at t=10.
        s.get_task().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let report = TaskReport {
            kind: TaskKind::Map,
            index: 0,
            file_name: None,
            staged_output: HashMap::from([(
                "intermediate-0-0".to_string(),
                dir.path().join(".intermediate-0-0-gone").display().to_string(),
            )]),
        };
        assert!(s.complete_task(report).await.is_err());

        // Attempt 2 at t=5; its watchdog fires at t=15.
        assert!(matches!(s.get_task().await, Assignment::Map { index: 0, .. }));

        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(s.snapshot().await.map_phases, vec![TaskPhase::Running]);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(s.snapshot().await.map_phases, vec![TaskPhase::Pending]);
    }

    #[tokio::test]
    async fn rejects_staged_files_outside_the_work_dir() {
        let dir = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let s = Scheduler::new(vec!["a.txt".into()], SchedulerConfig::new(1, dir.path())).unwrap();

        let victim = elsewhere.path().join(".victim");
        std::fs::write(&victim, "keep").unwrap();
        let outside = || TaskReport {
            kind: TaskKind::Map,
            index: 0,
            file_name: None,
            staged_output: HashMap::from([(
                "intermediate-0-0".to_string(),
                victim.display().to_string(),
            )]),
        };

        s.get_task().await;
        assert!(matches!(
            s.complete_task(outside()).await,
            Err(CoordinatorError::InvalidReport(_))
        ));
        assert!(!dir.path().join("intermediate-0-0").exists());

        // A stale report is rejected before anything is discarded.
        assert!(s.complete_task(report(TaskKind::Map, 0)).await.unwrap());
        assert!(matches!(
            s.complete_task(outside()).await,
            Err(CoordinatorError::InvalidReport(_))
        ));
        assert_eq!(std::fs::read_to_string(&victim).unwrap(), "keep");

        let mut relative = report(TaskKind::Map, 0);
        relative
            .staged_output
            .insert("intermediate-0-0".into(), ".intermediate-0-0-aaa".into());
        assert!(matches!(
            s.complete_task(relative).await,
            Err(CoordinatorError::InvalidReport(_))
        ));
    }

    #[tokio::test]
    async fn rejects_outputs_of_other_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let s = Scheduler::new(
            vec!["a.txt".into(), "b.txt".into()],
            SchedulerConfig::new(2, dir.path()),
        )
        .unwrap();
        let staged = dir.path().join(".x-aaa");
        std::fs::write(&staged, "x").unwrap();

        let claiming = |kind, index, final_name: &str| TaskReport {
            kind,
            index,
            file_name: None,
            staged_output: HashMap::from([(
                final_name.to_string(),
                staged.display().to_string(),
            )]),
        };

        s.get_task().await;
        for final_name in ["intermediate-1-0", "intermediate-0-2", "result-0", "intermediate-00-0"] {
            assert!(
                matches!(
                    s.complete_task(claiming(TaskKind::Map, 0, final_name)).await,
                    Err(CoordinatorError::InvalidReport(_))
                ),
                "map 0 must not publish {final_name}"
            );
        }
        for final_name in ["result-1", "intermediate-0-0"] {
            assert!(
                matches!(
                    s.complete_task(claiming(TaskKind::Reduce, 0, final_name)).await,
                    Err(CoordinatorError::InvalidReport(_))
                ),
                "reduce 0 must not publish {final_name}"
            );
        }

        assert!(!dir.path().join("intermediate-1-0").exists());
        assert!(!dir.path().join("result-0").exists());
        assert!(staged.exists());
        assert_eq!(s.snapshot().await.completed_maps, 0);
    }
}
