use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

pub type Task = Box<dyn FnOnce() + Send>;

/// Cancellation face of one scheduled timer. Cancellation is idempotent and
/// best-effort: a timer that already fired is unaffected.
#[derive(Clone)]
pub struct TimerHandle {
    cancelled: Arc<AtomicBool>,
}

impl TimerHandle {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for TimerHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Opaque scheduler supplied by the hosting process. Runs tasks and
/// schedules timers; the core never blocks on it.
pub trait Stage: Send + Sync {
    fn run_task(&self, task: Task);
    fn schedule_after(&self, delay: Duration, task: Task) -> TimerHandle;
}

struct ScheduledTimer {
    due: Duration,
    seq: u64,
    task: Task,
    handle: TimerHandle,
}

struct ManualStageInner {
    now: Duration,
    ready: VecDeque<Task>,
    timers: Vec<ScheduledTimer>,
    next_seq: u64,
}

/// Deterministic single-threaded stage with a virtual clock.
///
/// Tasks queue until `run_until_idle` drains them; timers fire when
/// `advance` moves the clock past their deadline, in deadline order.
/// Intended for tests and deterministic embeddings.
pub struct ManualStage {
    inner: Mutex<ManualStageInner>,
}

impl ManualStage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(ManualStageInner {
                now: Duration::ZERO,
                ready: VecDeque::new(),
                timers: Vec::new(),
                next_seq: 0,
            }),
        })
    }

    pub fn now(&self) -> Duration {
        self.inner
            .lock()
            .map(|inner| inner.now)
            .unwrap_or(Duration::ZERO)
    }

    pub fn pending_tasks(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.ready.len())
            .unwrap_or(0)
    }

    pub fn pending_timers(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| {
                inner
                    .timers
                    .iter()
                    .filter(|timer| !timer.handle.is_cancelled())
                    .count()
            })
            .unwrap_or(0)
    }

    /// Runs queued tasks, including any a running task enqueues, until none
    /// remain. Returns the number of tasks run. Tasks execute outside the
    /// internal lock so they may schedule freely.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            let task = {
                let Ok(mut inner) = self.inner.lock() else {
                    return ran;
                };
                inner.ready.pop_front()
            };
            match task {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }

    /// Moves the clock forward, fires every due and uncancelled timer in
    /// deadline order, then runs until idle.
    pub fn advance(&self, delta: Duration) -> usize {
        {
            let Ok(mut inner) = self.inner.lock() else {
                return 0;
            };
            inner.now += delta;
            let now = inner.now;
            let mut due: Vec<ScheduledTimer> = Vec::new();
            let mut index = 0;
            while index < inner.timers.len() {
                if inner.timers[index].due <= now {
                    due.push(inner.timers.remove(index));
                } else {
                    index += 1;
                }
            }
            due.sort_by_key(|timer| (timer.due, timer.seq));
            for timer in due {
                if !timer.handle.is_cancelled() {
                    inner.ready.push_back(timer.task);
                }
            }
        }
        self.run_until_idle()
    }
}

impl Stage for ManualStage {
    fn run_task(&self, task: Task) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.ready.push_back(task);
        }
    }

    fn schedule_after(&self, delay: Duration, task: Task) -> TimerHandle {
        let handle = TimerHandle::new();
        if let Ok(mut inner) = self.inner.lock() {
            let due = inner.now + delay;
            let seq = inner.next_seq;
            inner.next_seq += 1;
            inner.timers.push(ScheduledTimer {
                due,
                seq,
                task,
                handle: handle.clone(),
            });
        }
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::{ManualStage, Stage};
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
        time::Duration,
    };

    #[test]
    fn tasks_run_in_submission_order() {
        let stage = ManualStage::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for index in 0..3 {
            let log = log.clone();
            stage.run_task(Box::new(move || log.lock().unwrap().push(index)));
        }
        assert_eq!(stage.run_until_idle(), 3);
        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn tasks_may_enqueue_more_tasks() {
        let stage = ManualStage::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let inner_counter = counter.clone();
        let inner_stage = stage.clone();
        stage.run_task(Box::new(move || {
            inner_counter.fetch_add(1, Ordering::SeqCst);
            let counter = inner_counter.clone();
            inner_stage.run_task(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }));
        }));
        stage.run_until_idle();
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn timers_fire_in_deadline_order() {
        let stage = ManualStage::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for (label, millis) in [("late", 200u64), ("early", 100)] {
            let log = log.clone();
            stage.schedule_after(
                Duration::from_millis(millis),
                Box::new(move || log.lock().unwrap().push(label)),
            );
        }
        stage.advance(Duration::from_millis(250));
        assert_eq!(*log.lock().unwrap(), vec!["early", "late"]);
    }

    #[test]
    fn cancelled_timers_never_fire() {
        let stage = ManualStage::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let handle = stage.schedule_after(
            Duration::from_millis(50),
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }),
        );
        handle.cancel();
        stage.advance(Duration::from_millis(100));
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(stage.pending_timers(), 0);
    }

    #[test]
    fn undue_timers_stay_scheduled() {
        let stage = ManualStage::new();
        stage.schedule_after(Duration::from_millis(500), Box::new(|| {}));
        stage.advance(Duration::from_millis(100));
        assert_eq!(stage.pending_timers(), 1);
        stage.advance(Duration::from_millis(400));
        assert_eq!(stage.pending_timers(), 0);
    }
}
