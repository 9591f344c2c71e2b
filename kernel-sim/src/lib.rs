//! A tick-driven simulator of kernel resource-management subsystems.
//!
//! This library provides the deterministic engines of the simulator: cpu
//! scheduling, paged virtual memory, producer-consumer synchronization, a
//! buddy-system heap, disk-arm scheduling and multi-device I/O. Every
//! engine advances in lockstep with a logical tick counter; there is no
//! real concurrency and nothing blocks.
//!

mod common_types;
pub use common_types::{Pid, Tick, Tid};
pub use common_types::{
    DEFAULT_BUFFER_SIZE, DEFAULT_NUM_FRAMES, DEFAULT_QUANTUM, MAX_THREADS_PER_PROCESS,
};

mod process;
pub use process::{Pcb, ProcState, ProcType, Thread, ThreadState};

mod sync;
pub use sync::{ConsumeResult, ProduceResult, ProducerConsumer, Semaphore};

mod memory;
pub use memory::{Frame, MemoryManager, PageAlgo};

mod heap;
pub use heap::{HeapAllocator, HeapBlock, HeapStats};

mod disk;
pub use disk::{DiskAlgo, DiskScheduler};

mod io;
pub use io::{IoDevice, IoDeviceStatus, IoManager, IoPriority, IoRequest};

mod schedulers;
pub use schedulers::{SchedulerRr, SchedulerSjf, SchedulerSummary};

mod collector;
pub use collector::{collect_all, Collector};

/// Returns a round robin scheduler over the given memory manager and
/// producer-consumer buffer
///
/// * `memory` - the paged memory every running process touches once per tick
/// * `buffer` - the bounded buffer backing producer and consumer roles
/// * `quantum` - maximum consecutive ticks a process may run before
///               preemption
pub fn round_robin<'a>(
    memory: &'a mut MemoryManager,
    buffer: &'a mut ProducerConsumer,
    quantum: usize,
) -> SchedulerRr<'a> {
    SchedulerRr::new(memory, buffer, quantum)
}

/// Returns a non-preemptive shortest-job-first scheduler
///
/// * `memory` - the paged memory every running process touches once per tick
pub fn shortest_job_first(memory: &mut MemoryManager) -> SchedulerSjf<'_> {
    SchedulerSjf::new(memory)
}
