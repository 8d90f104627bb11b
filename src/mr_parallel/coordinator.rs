use std::collections::{BTreeMap, VecDeque};
use std::sync::{Mutex, MutexGuard};

use crate::common::{MapTask, ReduceTask, Task};

/// What a worker should do after asking for work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Poll {
    Assigned(Task),
    /// Nothing to hand out right now, the job is still running elsewhere.
    Wait,
    Finished,
}

#[derive(Debug)]
struct State {
    pending_map_tasks: VecDeque<MapTask>,
    pending_reduce_tasks: VecDeque<ReduceTask>,
    // bucket -> intermediate locations, in report order
    intermediate: BTreeMap<usize, Vec<String>>,
    completed_map_tasks: usize,
    completed_reduce_tasks: usize,
    total_map_tasks: usize,
    total_reduce_tasks: usize,
}

impl State {
    fn map_phase_done(&self) -> bool {
        self.completed_map_tasks == self.total_map_tasks
    }

    fn all_tasks_completed(&self) -> bool {
        self.completed_reduce_tasks == self.total_reduce_tasks
    }

    fn next_task(&mut self) -> Option<Task> {
        if let Some(task) = self.pending_map_tasks.pop_front() {
            return Some(Task::Map(task));
        }
        if self.map_phase_done() {
            return self.pending_reduce_tasks.pop_front().map(Task::Reduce);
        }
        None
    }

    fn synthesize_reduce_tasks(&mut self) {
        self.pending_reduce_tasks = (0..self.total_reduce_tasks)
            .map(|bucket| ReduceTask {
                id: bucket,
                inputs: self.intermediate.get(&bucket).cloned().unwrap_or_default(),
            })
            .collect();
        tracing::info!(
            reduce_tasks = self.total_reduce_tasks,
            "map phase complete, releasing reduce tasks"
        );
    }
}

/// Single source of truth for scheduling. Every operation runs under one
/// mutex, so "check phase, then dequeue" and "record completion, then maybe
/// release the reduce phase" are each atomic for all workers.
///
/// There is no lease or timeout: a task whose worker never reports back
/// stalls the job.
#[derive(Debug)]
pub struct Coordinator {
    state: Mutex<State>,
}

impl Coordinator {
    /// One map task per input location, each partitioning into
    /// `num_reduce` buckets.
    pub fn new(inputs: Vec<String>, num_reduce: usize) -> Self {
        assert!(num_reduce > 0, "a job needs at least one reduce task");

        let pending_map_tasks: VecDeque<_> = inputs
            .into_iter()
            .enumerate()
            .map(|(id, input)| MapTask {
                id,
                input,
                partitions: num_reduce,
            })
            .collect();

        let mut state = State {
            total_map_tasks: pending_map_tasks.len(),
            total_reduce_tasks: num_reduce,
            pending_map_tasks,
            pending_reduce_tasks: VecDeque::new(),
            intermediate: BTreeMap::new(),
            completed_map_tasks: 0,
            completed_reduce_tasks: 0,
        };
        // Nothing to map: the barrier is already passed.
        if state.total_map_tasks == 0 {
            state.synthesize_reduce_tasks();
        }

        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // No critical section can panic halfway through an update.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// A pending map task if any remain; otherwise, once every map task is
    /// complete, a pending reduce task. `None` does not mean the job is done.
    pub fn get_task(&self) -> Option<Task> {
        self.lock().next_task()
    }

    /// `get_task` and `all_tasks_completed` observed under the same lock.
    pub fn poll(&self) -> Poll {
        let mut state = self.lock();
        match state.next_task() {
            Some(task) => Poll::Assigned(task),
            None if state.all_tasks_completed() => Poll::Finished,
            None => Poll::Wait,
        }
    }

    /// Records the locations one map task wrote, per bucket. The report that
    /// completes the map phase creates the reduce tasks.
    pub fn complete_map_task(&self, generated: BTreeMap<usize, Vec<String>>) {
        let mut state = self.lock();
        if state.map_phase_done() {
            tracing::warn!("map completion reported after the map phase ended, ignoring");
            return;
        }

        for (bucket, locations) in generated {
            state.intermediate.entry(bucket).or_default().extend(locations);
        }
        state.completed_map_tasks += 1;
        tracing::debug!(
            completed = state.completed_map_tasks,
            total = state.total_map_tasks,
            "map task completed"
        );

        if state.map_phase_done() {
            state.synthesize_reduce_tasks();
        }
    }

    pub fn complete_reduce_task(&self) {
        let mut state = self.lock();
        if state.all_tasks_completed() {
            tracing::warn!("reduce completion reported after the job finished, ignoring");
            return;
        }
        state.completed_reduce_tasks += 1;
        tracing::debug!(
            completed = state.completed_reduce_tasks,
            total = state.total_reduce_tasks,
            "reduce task completed"
        );
    }

    pub fn all_tasks_completed(&self) -> bool {
        self.lock().all_tasks_completed()
    }

    pub fn completed_map_tasks(&self) -> usize {
        self.lock().completed_map_tasks
    }

    pub fn completed_reduce_tasks(&self) -> usize {
        self.lock().completed_reduce_tasks
    }

    pub fn total_map_tasks(&self) -> usize {
        self.lock().total_map_tasks
    }

    pub fn total_reduce_tasks(&self) -> usize {
        self.lock().total_reduce_tasks
    }

    /// Locations reported so far for `bucket`.
    pub fn intermediate_locations(&self, bucket: usize) -> Vec<String> {
        self.lock()
            .intermediate
            .get(&bucket)
            .cloned()
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;

    fn inputs(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("input-{}", i)).collect()
    }

    fn report(map_id: usize, buckets: &[usize]) -> BTreeMap<usize, Vec<String>> {
        buckets
            .iter()
            .map(|&b| (b, vec![format!("mr-{}-{}", map_id, b)]))
            .collect()
    }

    fn take_map(coord: &Coordinator) -> MapTask {
        match coord.get_task() {
            Some(Task::Map(task)) => task,
            other => panic!("expected a map task, got {:?}", other),
        }
    }

    #[test]
    fn hands_out_each_map_task_once() {
        let coord = Coordinator::new(inputs(3), 2);
        let ids: Vec<_> = (0..3).map(|_| take_map(&coord).id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
        assert_eq!(coord.get_task(), None);
        assert_eq!(coord.poll(), Poll::Wait);
    }

    #[test]
    fn map_tasks_carry_input_and_partition_count() {
        let coord = Coordinator::new(vec!["doc.txt".to_string()], 5);
        let task = take_map(&coord);
        assert_eq!(task.input, "doc.txt");
        assert_eq!(task.partitions, 5);
    }

    #[test]
    fn no_reduce_task_before_every_map_completes() {
        let coord = Coordinator::new(inputs(2), 2);
        take_map(&coord);
        take_map(&coord);

        coord.complete_map_task(report(0, &[0, 1]));
        assert_eq!(coord.completed_map_tasks(), 1);
        assert_eq!(coord.get_task(), None);

        coord.complete_map_task(report(1, &[1]));
        match coord.get_task() {
            Some(Task::Reduce(task)) => {
                assert_eq!(task.id, 0);
                assert_eq!(task.inputs, vec!["mr-0-0".to_string()]);
            }
            other => panic!("expected reduce task 0, got {:?}", other),
        }
        match coord.get_task() {
            Some(Task::Reduce(task)) => {
                assert_eq!(task.id, 1);
                assert_eq!(task.inputs, vec!["mr-0-1".to_string(), "mr-1-1".to_string()]);
            }
            other => panic!("expected reduce task 1, got {:?}", other),
        }
        assert_eq!(coord.get_task(), None);
    }

    #[test]
    fn bucket_without_contributions_gets_empty_reduce_task() {
        let coord = Coordinator::new(inputs(1), 3);
        take_map(&coord);
        coord.complete_map_task(report(0, &[2]));

        let mut tasks = Vec::new();
        while let Some(Task::Reduce(task)) = coord.get_task() {
            tasks.push(task);
        }
        assert_eq!(tasks.len(), 3);
        assert!(tasks[0].inputs.is_empty());
        assert!(tasks[1].inputs.is_empty());
        assert_eq!(tasks[2].inputs, vec!["mr-0-2".to_string()]);
    }

    #[test]
    fn late_map_report_does_not_resynthesize() {
        let coord = Coordinator::new(inputs(1), 2);
        take_map(&coord);
        coord.complete_map_task(report(0, &[0, 1]));
        coord.complete_map_task(report(9, &[0, 1]));

        assert_eq!(coord.completed_map_tasks(), 1);
        assert_eq!(coord.intermediate_locations(0), vec!["mr-0-0".to_string()]);
        let mut reduce_ids = Vec::new();
        while let Some(Task::Reduce(task)) = coord.get_task() {
            reduce_ids.push(task.id);
        }
        assert_eq!(reduce_ids, vec![0, 1]);
    }

    #[test]
    fn completion_flag_flips_once_and_stays() {
        let coord = Coordinator::new(inputs(1), 2);
        take_map(&coord);
        coord.complete_map_task(report(0, &[0]));
        assert!(!coord.all_tasks_completed());

        coord.get_task();
        coord.get_task();
        coord.complete_reduce_task();
        assert!(!coord.all_tasks_completed());
        assert_eq!(coord.poll(), Poll::Wait);

        coord.complete_reduce_task();
        assert!(coord.all_tasks_completed());
        assert_eq!(coord.poll(), Poll::Finished);

        coord.complete_reduce_task();
        assert!(coord.all_tasks_completed());
        assert_eq!(coord.completed_reduce_tasks(), 2);
    }

    #[test]
    fn empty_job_goes_straight_to_reduce() {
        let coord = Coordinator::new(Vec::new(), 2);
        assert_eq!(coord.total_map_tasks(), 0);
        match coord.poll() {
            Poll::Assigned(Task::Reduce(task)) => assert_eq!(task.id, 0),
            other => panic!("expected reduce task, got {:?}", other),
        }
    }

    #[test]
    #[should_panic(expected = "at least one reduce task")]
    fn rejects_zero_reduce_tasks() {
        Coordinator::new(inputs(1), 0);
    }

    #[test]
    fn concurrent_workers_never_share_a_task() {
        const MAPS: usize = 64;
        const REDUCES: usize = 8;
        let coord = Arc::new(Coordinator::new(inputs(MAPS), REDUCES));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coord = Arc::clone(&coord);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    loop {
                        match coord.poll() {
                            Poll::Assigned(Task::Map(task)) => {
                                assert!(coord.completed_map_tasks() < MAPS);
                                let buckets: Vec<_> = (0..REDUCES).collect();
                                coord.complete_map_task(report(task.id, &buckets));
                                seen.push(("map", task.id));
                            }
                            Poll::Assigned(Task::Reduce(task)) => {
                                assert_eq!(coord.completed_map_tasks(), MAPS);
                                assert_eq!(task.inputs.len(), MAPS);
                                coord.complete_reduce_task();
                                seen.push(("reduce", task.id));
                            }
                            Poll::Wait => thread::yield_now(),
                            Poll::Finished => return seen,
                        }
                    }
                })
            })
            .collect();

        let mut all = Vec::new();
        for handle in handles {
            all.extend(handle.join().expect("worker thread panicked"));
        }
        let unique: HashSet<_> = all.iter().cloned().collect();
        assert_eq!(all.len(), MAPS + REDUCES);
        assert_eq!(unique.len(), MAPS + REDUCES);
        assert!(coord.all_tasks_completed());

        for bucket in 0..REDUCES {
            let reported = coord.intermediate_locations(bucket);
            assert_eq!(reported.len(), MAPS);
            let locations: HashSet<_> = reported.into_iter().collect();
            let expected: HashSet<_> = (0..MAPS).map(|m| format!("mr-{}-{}", m, bucket)).collect();
            assert_eq!(locations, expected);
        }
    }
}
