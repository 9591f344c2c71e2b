use std::fmt;
use std::ops::Add;

/// Default time quanta of the round robin scheduler
pub const DEFAULT_QUANTUM: usize = 3;

/// Default number of physical frames managed by the memory manager
pub const DEFAULT_NUM_FRAMES: usize = 4;

/// Default capacity of the producer-consumer buffer
pub const DEFAULT_BUFFER_SIZE: usize = 5;

/// Hard cap on the number of threads a single process may own
pub const MAX_THREADS_PER_PROCESS: usize = 4;

/// Process identifier, assigned monotonically starting from 1
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Pid(usize);

impl Pid {
    /// Creates a new Pid object
    ///
    /// * `pid` - the process identifier as usize
    pub fn new(pid: usize) -> Pid {
        Pid(pid)
    }

    /// Gets the pid as a usize value
    pub fn get(&self) -> usize {
        self.0
    }
}

impl Add<usize> for Pid {
    type Output = Pid;

    fn add(self, rhs: usize) -> Self::Output {
        Pid::new(self.0 + rhs)
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread identifier, unique within the owning process
pub type Tid = usize;

/// One unit of the simulator's logical clock
pub type Tick = usize;
