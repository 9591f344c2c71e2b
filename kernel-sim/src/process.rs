use crate::common_types::{Pid, Tick, Tid};

/// The execution state of a process
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProcState {
    New,
    Ready,
    Running,
    Waiting,
    Suspended,
    Terminated,
}

impl ProcState {
    pub fn name(&self) -> &'static str {
        match self {
            ProcState::New => "NEW",
            ProcState::Ready => "READY",
            ProcState::Running => "RUNNING",
            ProcState::Waiting => "WAITING",
            ProcState::Suspended => "SUSPENDED",
            ProcState::Terminated => "TERMINATED",
        }
    }
}

/// The synchronization role of a process
///
/// Philosopher, Reader and Writer are reserved for workloads the tick
/// driver does not dispatch; they behave like Normal.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ProcType {
    Normal,
    Producer,
    Consumer,
    Philosopher,
    Reader,
    Writer,
}

impl ProcType {
    pub fn name(&self) -> &'static str {
        match self {
            ProcType::Normal => "NORMAL",
            ProcType::Producer => "PRODUCER",
            ProcType::Consumer => "CONSUMER",
            ProcType::Philosopher => "PHILOSOPHER",
            ProcType::Reader => "READER",
            ProcType::Writer => "WRITER",
        }
    }
}

/// The execution state of a thread
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ThreadState {
    New,
    Ready,
    Running,
    Waiting,
    Terminated,
}

impl ThreadState {
    pub fn name(&self) -> &'static str {
        match self {
            ThreadState::New => "NEW",
            ThreadState::Ready => "READY",
            ThreadState::Running => "RUNNING",
            ThreadState::Waiting => "WAITING",
            ThreadState::Terminated => "TERMINATED",
        }
    }
}

/// A thread owned by a single process
///
/// Threads are dispatched cooperatively in declaration order, one per tick
/// of their parent process.
#[derive(Clone, Debug)]
pub struct Thread {
    /// Thread id, unique within the parent process
    pub tid: Tid,
    /// Pid of the owning process
    pub parent: Pid,
    pub state: ThreadState,
    /// Ticks of work still owed by this thread
    pub burst_remaining: i64,
    /// Ticks spent ready or blocked while a sibling ran
    pub waiting_time: usize,
    pub items_produced: usize,
    pub items_consumed: usize,
    /// Semaphore slot this thread is blocked on, if any
    pub blocked_on_semaphore: Option<usize>,
}

impl Thread {
    pub fn new(tid: Tid, parent: Pid, burst: i64) -> Thread {
        Thread {
            tid,
            parent,
            state: ThreadState::New,
            burst_remaining: burst,
            waiting_time: 0,
            items_produced: 0,
            items_consumed: 0,
            blocked_on_semaphore: None,
        }
    }
}

/// The Process Control Block
#[derive(Clone, Debug)]
pub struct Pcb {
    pub id: Pid,
    pub state: ProcState,
    pub role: ProcType,
    /// Ticks of work still owed; frozen once the process terminates
    pub burst_remaining: i64,
    pub arrival_tick: Tick,
    /// Set exactly once, when the process terminates
    pub finish_tick: Option<Tick>,
    /// Ticks spent in Ready or Waiting while another process ran
    pub waiting_time: usize,
    /// finish_tick - arrival_tick, valid once terminated
    pub turnaround: usize,
    /// Size of the virtual address space, in pages
    pub num_pages: usize,
    /// Next page index to touch, cycles over 0..num_pages
    pub next_page: usize,
    pub page_accesses: usize,
    pub page_faults: usize,
    pub items_produced: usize,
    pub items_consumed: usize,
    /// Semaphore slot the process is blocked on, if any
    pub blocked_on_semaphore: Option<usize>,
    /// Threads in declaration order; non-empty marks the process "threaded"
    pub threads: Vec<Thread>,
    pub next_tid: Tid,
}

impl Pcb {
    /// Creates a new Process Control Block
    ///
    /// * `id` - pid of the new process
    /// * `burst` - ticks of CPU work the process needs
    /// * `arrival` - the tick the process was created at
    /// * `pages` - number of virtual pages (clamped to at least 1)
    pub fn new(id: Pid, burst: i64, arrival: Tick, pages: usize) -> Pcb {
        Pcb {
            id,
            state: ProcState::New,
            role: ProcType::Normal,
            burst_remaining: burst,
            arrival_tick: arrival,
            finish_tick: None,
            waiting_time: 0,
            turnaround: 0,
            num_pages: pages.max(1),
            next_page: 0,
            page_accesses: 0,
            page_faults: 0,
            items_produced: 0,
            items_consumed: 0,
            blocked_on_semaphore: None,
            threads: Vec::new(),
            next_tid: 0,
        }
    }

    /// A process with at least one thread derives its burst from thread
    /// completion instead of per-tick decrements
    pub fn has_threads(&self) -> bool {
        !self.threads.is_empty()
    }

    pub fn is_terminated(&self) -> bool {
        self.state == ProcState::Terminated
    }

    pub fn is_ready(&self) -> bool {
        self.state == ProcState::Ready
    }

    pub fn is_running(&self) -> bool {
        self.state == ProcState::Running
    }

    pub fn is_waiting(&self) -> bool {
        self.state == ProcState::Waiting
    }

    pub fn is_suspended(&self) -> bool {
        self.state == ProcState::Suspended
    }
}
