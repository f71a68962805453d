//! Scheduled Tasks
//!
//! One-shot and repeating tasks driven by an external millisecond clock.
//! Nothing fires on its own: the owner calls [`Scheduler::poll`] from its
//! tick and acts on the returned handles. A cancelled handle can never fire,
//! even if its deadline already passed before the cancel.

/// Handle to a scheduled task; the generation makes stale handles inert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskHandle<K> {
    pub kind: K,
    generation: u64,
}

#[derive(Debug, Clone)]
struct Task<K> {
    handle: TaskHandle<K>,
    due_ms: u64,
    interval_ms: Option<u64>,
}

/// Poll-driven task scheduler
#[derive(Debug, Clone)]
pub struct Scheduler<K> {
    tasks: Vec<Task<K>>,
    next_generation: u64,
}

impl<K> Default for Scheduler<K> {
    fn default() -> Self {
        Scheduler {
            tasks: Vec::new(),
            next_generation: 1,
        }
    }
}

impl<K: Copy + Eq + std::fmt::Debug> Scheduler<K> {
    pub fn new() -> Self {
        Scheduler::default()
    }

    fn insert(&mut self, kind: K, due_ms: u64, interval_ms: Option<u64>) -> TaskHandle<K> {
        let handle = TaskHandle {
            kind,
            generation: self.next_generation,
        };
        self.next_generation += 1;
        self.tasks.push(Task {
            handle,
            due_ms,
            interval_ms,
        });
        log::trace!("Scheduled {:?} at {} ms (interval {:?})", kind, due_ms, interval_ms);
        handle
    }

    /// Fire once, `delay_ms` after `now_ms`
    pub fn schedule_once(&mut self, kind: K, now_ms: u64, delay_ms: u64) -> TaskHandle<K> {
        self.insert(kind, now_ms.saturating_add(delay_ms), None)
    }

    /// Fire every `interval_ms`, first time one interval after `now_ms`
    pub fn schedule_repeating(&mut self, kind: K, now_ms: u64, interval_ms: u64) -> TaskHandle<K> {
        let interval_ms = interval_ms.max(1);
        self.insert(kind, now_ms.saturating_add(interval_ms), Some(interval_ms))
    }

    /// Cancel a task. Returns false if it already fired (one-shot) or was
    /// cancelled before.
    pub fn cancel(&mut self, handle: TaskHandle<K>) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|task| task.handle != handle);
        before != self.tasks.len()
    }

    pub fn cancel_all(&mut self) {
        self.tasks.clear();
    }

    pub fn is_scheduled(&self, handle: TaskHandle<K>) -> bool {
        self.tasks.iter().any(|task| task.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Earliest deadline among scheduled tasks
    pub fn next_due_ms(&self) -> Option<u64> {
        self.tasks.iter().map(|task| task.due_ms).min()
    }

    /// Return every task due at `now_ms`, earliest first.
    ///
    /// One-shot tasks are removed. Repeating tasks fire at most once per
    /// poll and move to their next deadline after `now_ms`.
    pub fn poll(&mut self, now_ms: u64) -> Vec<TaskHandle<K>> {
        let mut fired: Vec<(u64, TaskHandle<K>)> = Vec::new();

        self.tasks.retain_mut(|task| {
            if task.due_ms > now_ms {
                return true;
            }
            fired.push((task.due_ms, task.handle));
            match task.interval_ms {
                Some(interval) => {
                    let missed = (now_ms - task.due_ms) / interval;
                    task.due_ms += interval * (missed + 1);
                    true
                }
                None => false,
            }
        });

        fired.sort_by_key(|(due, _)| *due);
        fired.into_iter().map(|(_, handle)| handle).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        A,
        B,
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut s = Scheduler::new();
        let h = s.schedule_once(Kind::A, 1_000, 500);
        assert!(s.poll(1_499).is_empty());
        assert_eq!(s.poll(1_500), vec![h]);
        assert!(s.poll(5_000).is_empty());
        assert!(!s.is_scheduled(h));
    }

    #[test]
    fn test_repeating_reschedules() {
        let mut s = Scheduler::new();
        let h = s.schedule_repeating(Kind::B, 0, 5_000);
        assert!(s.poll(4_999).is_empty());
        assert_eq!(s.poll(5_000), vec![h]);
        assert_eq!(s.next_due_ms(), Some(10_000));
        // A long stall fires once and skips the missed deadlines
        assert_eq!(s.poll(23_000), vec![h]);
        assert_eq!(s.next_due_ms(), Some(25_000));
    }

    #[test]
    fn test_cancel_prevents_overdue_firing() {
        let mut s = Scheduler::new();
        let h = s.schedule_once(Kind::A, 0, 100);
        assert!(s.cancel(h));
        assert!(!s.cancel(h));
        assert!(s.poll(1_000).is_empty());
    }

    #[test]
    fn test_stale_handle_does_not_cancel_new_task() {
        let mut s = Scheduler::new();
        let old = s.schedule_once(Kind::A, 0, 100);
        s.poll(100);
        let new = s.schedule_once(Kind::A, 100, 100);
        assert!(!s.cancel(old));
        assert!(s.is_scheduled(new));
    }

    #[test]
    fn test_fired_in_due_order() {
        let mut s = Scheduler::new();
        let late = s.schedule_once(Kind::A, 0, 300);
        let early = s.schedule_once(Kind::B, 0, 100);
        assert_eq!(s.poll(1_000), vec![early, late]);
        assert!(s.is_empty());
    }
}
