use std::collections::BTreeMap;

use log::debug;

use crate::collector::Collector;
use crate::common_types::{Pid, Tick};
use crate::memory::MemoryManager;
use crate::process::{Pcb, ProcState};

use super::{summarize, SchedulerSummary};

/// Non-preemptive shortest-job-first scheduler
///
/// Once dispatched, a process keeps the cpu until it terminates. Selection
/// picks the ready process with the smallest remaining burst, breaking ties
/// by earliest arrival and then by smallest pid.
pub struct SchedulerSjf<'a> {
    global_tick: Tick,
    next_pid: Pid,
    processes: BTreeMap<Pid, Pcb>,
    ready_queue: Vec<Pid>,
    running: Option<Pid>,
    memory: &'a mut MemoryManager,
}

impl<'a> SchedulerSjf<'a> {
    pub fn new(memory: &'a mut MemoryManager) -> SchedulerSjf<'a> {
        SchedulerSjf {
            global_tick: 0,
            next_pid: Pid::new(1),
            processes: BTreeMap::new(),
            ready_queue: Vec::new(),
            running: None,
            memory,
        }
    }

    pub fn create_process(&mut self, burst: i64, pages: usize) -> Pid {
        let pid = self.next_pid;
        self.next_pid = self.next_pid + 1;

        let mut pcb = Pcb::new(pid, burst, self.global_tick, pages);
        pcb.state = ProcState::Ready;
        self.processes.insert(pid, pcb);
        self.ready_queue.push(pid);
        debug!("created pid {} (burst {})", pid, burst);
        pid
    }

    pub fn tick(&mut self) {
        self.global_tick += 1;

        if self.running.is_none() {
            self.schedule_next();
        }

        let running = self.running;
        for proc in self.processes.values_mut() {
            if Some(proc.id) == running {
                continue;
            }
            if proc.is_ready() {
                proc.waiting_time += 1;
            }
        }

        if let Some(pid) = self.running {
            let (next_page, num_pages) = match self.processes.get(&pid) {
                Some(proc) => (proc.next_page, proc.num_pages),
                None => return,
            };
            let fault = self.memory.access(pid, next_page);

            let finished = match self.processes.get_mut(&pid) {
                Some(proc) => {
                    proc.state = ProcState::Running;
                    proc.burst_remaining -= 1;
                    proc.page_accesses += 1;
                    if fault {
                        proc.page_faults += 1;
                    }
                    proc.next_page = (next_page + 1) % num_pages;
                    proc.burst_remaining <= 0
                }
                None => false,
            };

            if finished {
                let now = self.global_tick;
                if let Some(proc) = self.processes.get_mut(&pid) {
                    proc.state = ProcState::Terminated;
                    proc.finish_tick = Some(now);
                    proc.turnaround = now - proc.arrival_tick;
                }
                self.memory.free_frames_of(pid);
                self.running = None;
                debug!("pid {} terminated at tick {}", pid, now);
            }
        }
    }

    pub fn run_ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// Picks the shortest ready job, discarding terminated entries
    fn schedule_next(&mut self) {
        let processes = &self.processes;
        self.ready_queue
            .retain(|pid| processes.get(pid).is_some_and(|p| !p.is_terminated()));

        let best = self
            .ready_queue
            .iter()
            .copied()
            .min_by_key(|pid| {
                let proc = &processes[pid];
                (proc.burst_remaining, proc.arrival_tick, proc.id)
            });

        if let Some(pid) = best {
            self.ready_queue.retain(|&other| other != pid);
            self.running = Some(pid);
            debug!("dispatch pid {}", pid);
        }
    }

    pub fn current_tick(&self) -> Tick {
        self.global_tick
    }

    pub fn running_pid(&self) -> Option<Pid> {
        self.running
    }

    pub fn process(&self, pid: Pid) -> Option<&Pcb> {
        self.processes.get(&pid)
    }

    pub fn processes(&self) -> impl Iterator<Item = &Pcb> {
        self.processes.values()
    }

    pub fn memory(&self) -> &MemoryManager {
        self.memory
    }

    pub fn summary(&self) -> SchedulerSummary {
        summarize(self.global_tick, self.processes.values())
    }
}

impl Collector for SchedulerSjf<'_> {
    fn collect_running(&self) -> Vec<&Pcb> {
        self.processes.values().filter(|p| p.is_running()).collect()
    }

    fn collect_ready(&self) -> Vec<&Pcb> {
        self.processes.values().filter(|p| p.is_ready()).collect()
    }

    fn collect_waiting(&self) -> Vec<&Pcb> {
        self.processes.values().filter(|p| p.is_waiting()).collect()
    }

    fn collect_suspended(&self) -> Vec<&Pcb> {
        self.processes.values().filter(|p| p.is_suspended()).collect()
    }

    fn collect_terminated(&self) -> Vec<&Pcb> {
        self.processes
            .values()
            .filter(|p| p.is_terminated())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common_types::DEFAULT_NUM_FRAMES;
    use crate::memory::PageAlgo;

    fn memory() -> MemoryManager {
        MemoryManager::new(DEFAULT_NUM_FRAMES, PageAlgo::Fifo)
    }

    #[test]
    fn shortest_job_goes_first() {
        let mut mem = memory();
        let mut sched = SchedulerSjf::new(&mut mem);

        let long = sched.create_process(3, 2);
        let short = sched.create_process(1, 2);
        let mid = sched.create_process(2, 2);

        sched.run_ticks(6);
        assert_eq!(sched.process(short).unwrap().finish_tick, Some(1));
        assert_eq!(sched.process(mid).unwrap().finish_tick, Some(3));
        assert_eq!(sched.process(long).unwrap().finish_tick, Some(6));

        assert_eq!(sched.process(short).unwrap().waiting_time, 0);
        assert_eq!(sched.process(mid).unwrap().waiting_time, 1);
        assert_eq!(sched.process(long).unwrap().waiting_time, 3);
    }

    #[test]
    fn equal_bursts_fall_back_to_pid_order() {
        let mut mem = memory();
        let mut sched = SchedulerSjf::new(&mut mem);

        let a = sched.create_process(2, 2);
        let b = sched.create_process(2, 2);

        sched.run_ticks(4);
        assert_eq!(sched.process(a).unwrap().finish_tick, Some(2));
        assert_eq!(sched.process(b).unwrap().finish_tick, Some(4));
    }

    #[test]
    fn a_dispatched_job_is_never_preempted() {
        let mut mem = memory();
        let mut sched = SchedulerSjf::new(&mut mem);

        let long = sched.create_process(3, 2);
        sched.tick();

        // a shorter job arriving mid-run still waits for the cpu
        let short = sched.create_process(1, 2);
        sched.run_ticks(3);
        assert_eq!(sched.process(long).unwrap().finish_tick, Some(3));
        assert_eq!(sched.process(short).unwrap().finish_tick, Some(4));
    }

    #[test]
    fn frames_are_released_on_termination() {
        let mut mem = memory();
        let mut sched = SchedulerSjf::new(&mut mem);

        let pid = sched.create_process(4, 3);
        sched.run_ticks(4);
        assert!(sched.process(pid).unwrap().is_terminated());
        assert_eq!(sched.memory().resident_pages(), 0);
    }
}
