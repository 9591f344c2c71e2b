use std::collections::{BTreeMap, VecDeque};

use log::debug;

use crate::collector::Collector;
use crate::common_types::{Pid, Tick, Tid, MAX_THREADS_PER_PROCESS};
use crate::memory::MemoryManager;
use crate::process::{Pcb, ProcState, ProcType, Thread, ThreadState};
use crate::sync::{ConsumeResult, ProduceResult, ProducerConsumer};

use super::{summarize, SchedulerSummary};

/// What the running process did with its slice of the tick
enum StepOutcome {
    Advanced,
    Blocked(usize),
}

/// Preemptive round robin driver over a single ready queue
///
/// Owns the process table and integrates the memory manager (one page
/// touch per running tick) and the producer-consumer buffer (one role
/// action per running tick). Both collaborators are borrowed exclusively
/// for the scheduler's lifetime.
///
/// The ready queue holds pids, not process records: stale entries for
/// terminated or suspended processes are dropped at dispatch without
/// disturbing the order of live ones.
pub struct SchedulerRr<'a> {
    quantum: usize,
    global_tick: Tick,
    next_pid: Pid,
    processes: BTreeMap<Pid, Pcb>,
    ready_queue: VecDeque<Pid>,
    running: Option<Pid>,
    quantum_used: usize,
    memory: &'a mut MemoryManager,
    buffer: &'a mut ProducerConsumer,
}

impl<'a> SchedulerRr<'a> {
    pub fn new(
        memory: &'a mut MemoryManager,
        buffer: &'a mut ProducerConsumer,
        quantum: usize,
    ) -> SchedulerRr<'a> {
        SchedulerRr {
            quantum,
            global_tick: 0,
            next_pid: Pid::new(1),
            processes: BTreeMap::new(),
            ready_queue: VecDeque::new(),
            running: None,
            quantum_used: 0,
            memory,
            buffer,
        }
    }

    /// Creates a process in ready state and queues it at the tail
    pub fn create_process(&mut self, burst: i64, pages: usize, role: ProcType) -> Pid {
        let pid = self.next_pid;
        self.next_pid = self.next_pid + 1;

        let mut pcb = Pcb::new(pid, burst, self.global_tick, pages);
        pcb.state = ProcState::Ready;
        pcb.role = role;
        self.processes.insert(pid, pcb);
        self.ready_queue.push_back(pid);
        debug!("created pid {} ({}, burst {})", pid, role.name(), burst);
        pid
    }

    /// Adds a thread to an existing process, up to the per-process cap
    pub fn create_thread(&mut self, pid: Pid, burst: i64) -> Option<Tid> {
        let proc = self.processes.get_mut(&pid)?;
        if proc.threads.len() >= MAX_THREADS_PER_PROCESS {
            return None;
        }

        let tid = proc.next_tid;
        proc.next_tid += 1;
        let mut thread = Thread::new(tid, pid, burst);
        thread.state = ThreadState::Ready;
        proc.threads.push(thread);
        debug!("created thread {} in pid {}", tid, pid);
        Some(tid)
    }

    /// Terminates a process and releases its frames
    ///
    /// Idempotent: killing an already terminated pid succeeds without
    /// touching its frozen counters. After the call no tick executes on
    /// this pid again.
    pub fn kill(&mut self, pid: Pid) -> bool {
        let now = self.global_tick;
        match self.processes.get_mut(&pid) {
            None => return false,
            Some(proc) => {
                if !proc.is_terminated() {
                    proc.state = ProcState::Terminated;
                    proc.finish_tick = Some(now);
                    proc.turnaround = now - proc.arrival_tick;
                }
            }
        }
        self.memory.free_frames_of(pid);
        if self.running == Some(pid) {
            self.running = None;
            self.quantum_used = 0;
        }
        debug!("killed pid {}", pid);
        true
    }

    /// Freezes a ready, running or waiting process
    pub fn suspend(&mut self, pid: Pid) -> bool {
        match self.processes.get_mut(&pid) {
            Some(proc) if !proc.is_terminated() && !proc.is_suspended() => {
                proc.state = ProcState::Suspended;
            }
            _ => return false,
        }
        // drop the queue entry now; resume re-enqueues, and a leftover
        // entry would turn into a duplicate once the state is Ready again
        self.ready_queue.retain(|&queued| queued != pid);
        if self.running == Some(pid) {
            self.running = None;
            self.quantum_used = 0;
        }
        debug!("suspended pid {}", pid);
        true
    }

    /// Thaws a suspended process back into the ready queue
    pub fn resume(&mut self, pid: Pid) -> bool {
        match self.processes.get_mut(&pid) {
            Some(proc) if proc.is_suspended() => {
                proc.state = ProcState::Ready;
            }
            _ => return false,
        }
        self.ready_queue.push_back(pid);
        debug!("resumed pid {}", pid);
        true
    }

    /// Advances the simulation by one tick
    pub fn tick(&mut self) {
        self.global_tick += 1;

        if self.running.is_none() {
            self.schedule_next();
        }

        // credit waiting time before the running step, skipping the
        // process selected for this tick
        let running = self.running;
        for proc in self.processes.values_mut() {
            if Some(proc.id) == running {
                continue;
            }
            if proc.is_ready() || proc.is_waiting() {
                proc.waiting_time += 1;
            }
        }

        if let Some(pid) = self.running {
            match self.execute_running(pid) {
                StepOutcome::Blocked(semaphore) => {
                    if let Some(proc) = self.processes.get_mut(&pid) {
                        proc.state = ProcState::Waiting;
                        proc.blocked_on_semaphore = Some(semaphore);
                    }
                    self.running = None;
                    self.quantum_used = 0;
                    debug!("pid {} blocked on semaphore {}", pid, semaphore);
                    // the blocking tick ends here, without an unblock sweep
                    return;
                }
                StepOutcome::Advanced => {
                    let burst = self
                        .processes
                        .get(&pid)
                        .map(|p| p.burst_remaining)
                        .unwrap_or(0);
                    if burst <= 0 {
                        self.terminate(pid);
                    } else if self.quantum_used >= self.quantum {
                        if let Some(proc) = self.processes.get_mut(&pid) {
                            proc.state = ProcState::Ready;
                        }
                        self.ready_queue.push_back(pid);
                        self.running = None;
                        self.quantum_used = 0;
                        debug!("pid {} preempted", pid);
                    }
                }
            }
        }

        self.unblock_waiting();
    }

    /// Runs `n` ticks back to back
    pub fn run_ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    /// One slice of work for the running process: a page touch plus either
    /// the thread step or the burst decrement and role action
    fn execute_running(&mut self, pid: Pid) -> StepOutcome {
        let (next_page, num_pages) = match self.processes.get(&pid) {
            Some(proc) => (proc.next_page, proc.num_pages),
            None => return StepOutcome::Advanced,
        };
        let fault = self.memory.access(pid, next_page);
        self.quantum_used += 1;

        let threaded = match self.processes.get_mut(&pid) {
            Some(proc) => {
                proc.state = ProcState::Running;
                proc.page_accesses += 1;
                if fault {
                    proc.page_faults += 1;
                }
                proc.next_page = (next_page + 1) % num_pages;
                proc.has_threads()
            }
            None => return StepOutcome::Advanced,
        };

        if threaded {
            self.thread_step(pid);
            return StepOutcome::Advanced;
        }

        let role = match self.processes.get_mut(&pid) {
            Some(proc) => {
                proc.burst_remaining -= 1;
                proc.role
            }
            None => return StepOutcome::Advanced,
        };

        match role {
            ProcType::Producer => match self.buffer.try_produce(pid) {
                ProduceResult::Produced(_) => {
                    if let Some(proc) = self.processes.get_mut(&pid) {
                        proc.items_produced += 1;
                    }
                    StepOutcome::Advanced
                }
                ProduceResult::Blocked(semaphore) => StepOutcome::Blocked(semaphore),
            },
            ProcType::Consumer => match self.buffer.try_consume(pid) {
                ConsumeResult::Consumed(_) => {
                    if let Some(proc) = self.processes.get_mut(&pid) {
                        proc.items_consumed += 1;
                    }
                    StepOutcome::Advanced
                }
                ConsumeResult::Blocked(semaphore) => StepOutcome::Blocked(semaphore),
            },
            _ => StepOutcome::Advanced,
        }
    }

    /// Dispatches the first thread in declaration order that is ready or
    /// running; siblings accrue waiting time and the active thread yields
    /// back to ready at the end of its tick
    fn thread_step(&mut self, pid: Pid) {
        let SchedulerRr {
            processes, buffer, ..
        } = self;
        let Some(proc) = processes.get_mut(&pid) else {
            return;
        };
        let role = proc.role;

        let Some(active) = proc
            .threads
            .iter()
            .position(|t| matches!(t.state, ThreadState::Ready | ThreadState::Running))
        else {
            return;
        };

        proc.threads[active].state = ThreadState::Running;
        proc.threads[active].burst_remaining -= 1;

        match role {
            ProcType::Producer => match buffer.try_produce(pid) {
                ProduceResult::Produced(_) => {
                    proc.threads[active].items_produced += 1;
                    proc.items_produced += 1;
                }
                ProduceResult::Blocked(semaphore) => {
                    let thread = &mut proc.threads[active];
                    thread.state = ThreadState::Waiting;
                    thread.blocked_on_semaphore = Some(semaphore);
                    return;
                }
            },
            ProcType::Consumer => match buffer.try_consume(pid) {
                ConsumeResult::Consumed(_) => {
                    proc.threads[active].items_consumed += 1;
                    proc.items_consumed += 1;
                }
                ConsumeResult::Blocked(semaphore) => {
                    let thread = &mut proc.threads[active];
                    thread.state = ThreadState::Waiting;
                    thread.blocked_on_semaphore = Some(semaphore);
                    return;
                }
            },
            _ => {}
        }

        for (idx, thread) in proc.threads.iter_mut().enumerate() {
            if idx != active
                && matches!(thread.state, ThreadState::Ready | ThreadState::Waiting)
            {
                thread.waiting_time += 1;
            }
        }

        if proc.threads[active].burst_remaining <= 0 {
            proc.threads[active].state = ThreadState::Terminated;
            if proc
                .threads
                .iter()
                .all(|t| t.state == ThreadState::Terminated)
            {
                // the parent's burst is derived from thread completion
                proc.burst_remaining = 0;
            }
        } else {
            proc.threads[active].state = ThreadState::Ready;
        }
    }

    /// Picks the next running process, dropping stale queue entries
    fn schedule_next(&mut self) {
        let now = self.global_tick;
        while let Some(pid) = self.ready_queue.pop_front() {
            let mut drained = false;
            match self.processes.get_mut(&pid) {
                None => continue,
                Some(proc) => {
                    if proc.is_terminated() || proc.is_suspended() {
                        continue;
                    }
                    if proc.burst_remaining <= 0 {
                        proc.state = ProcState::Terminated;
                        proc.finish_tick = Some(now);
                        proc.turnaround = now - proc.arrival_tick;
                        drained = true;
                    }
                }
            }
            if drained {
                self.memory.free_frames_of(pid);
                continue;
            }

            self.running = Some(pid);
            self.quantum_used = 0;
            debug!("dispatch pid {}", pid);
            return;
        }
    }

    fn terminate(&mut self, pid: Pid) {
        let now = self.global_tick;
        if let Some(proc) = self.processes.get_mut(&pid) {
            proc.state = ProcState::Terminated;
            proc.finish_tick = Some(now);
            proc.turnaround = now - proc.arrival_tick;
        }
        self.memory.free_frames_of(pid);
        if self.running == Some(pid) {
            self.running = None;
            self.quantum_used = 0;
        }
        debug!("pid {} terminated at tick {}", pid, now);
    }

    /// Best-effort unblock sweep, in pid order
    ///
    /// Retries the failed role action for every waiting process and every
    /// waiting thread; successes go back to ready.
    fn unblock_waiting(&mut self) {
        let SchedulerRr {
            processes,
            ready_queue,
            buffer,
            ..
        } = self;

        for proc in processes.values_mut() {
            let pid = proc.id;
            if proc.is_terminated() {
                continue;
            }

            if !proc.has_threads() && proc.is_waiting() {
                let unblocked = match proc.role {
                    ProcType::Producer => match buffer.try_produce(pid) {
                        ProduceResult::Produced(_) => {
                            proc.items_produced += 1;
                            true
                        }
                        ProduceResult::Blocked(_) => false,
                    },
                    ProcType::Consumer => match buffer.try_consume(pid) {
                        ConsumeResult::Consumed(_) => {
                            proc.items_consumed += 1;
                            true
                        }
                        ConsumeResult::Blocked(_) => false,
                    },
                    _ => false,
                };
                if unblocked {
                    proc.state = ProcState::Ready;
                    proc.blocked_on_semaphore = None;
                    ready_queue.push_back(pid);
                    debug!("pid {} unblocked", pid);
                }
            }

            if proc.has_threads() {
                let role = proc.role;
                let mut produced = 0;
                let mut consumed = 0;
                let mut any_unblocked = false;

                for thread in proc.threads.iter_mut() {
                    if thread.state != ThreadState::Waiting {
                        continue;
                    }
                    let unblocked = match role {
                        ProcType::Producer => match buffer.try_produce(pid) {
                            ProduceResult::Produced(_) => {
                                thread.items_produced += 1;
                                produced += 1;
                                true
                            }
                            ProduceResult::Blocked(_) => false,
                        },
                        ProcType::Consumer => match buffer.try_consume(pid) {
                            ConsumeResult::Consumed(_) => {
                                thread.items_consumed += 1;
                                consumed += 1;
                                true
                            }
                            ConsumeResult::Blocked(_) => false,
                        },
                        _ => false,
                    };
                    if unblocked {
                        thread.state = ThreadState::Ready;
                        thread.blocked_on_semaphore = None;
                        any_unblocked = true;
                    }
                }

                proc.items_produced += produced;
                proc.items_consumed += consumed;
                if any_unblocked && proc.is_waiting() {
                    proc.state = ProcState::Ready;
                    ready_queue.push_back(pid);
                }
            }
        }
    }

    pub fn current_tick(&self) -> Tick {
        self.global_tick
    }

    pub fn quantum(&self) -> usize {
        self.quantum
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

    /// Threads of a process in declaration order
    pub fn threads(&self, pid: Pid) -> Option<&[Thread]> {
        self.processes.get(&pid).map(|p| p.threads.as_slice())
    }

    pub fn memory(&self) -> &MemoryManager {
        self.memory
    }

    pub fn buffer(&self) -> &ProducerConsumer {
        self.buffer
    }

    pub fn summary(&self) -> SchedulerSummary {
        summarize(self.global_tick, self.processes.values())
    }
}

impl Collector for SchedulerRr<'_> {
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
