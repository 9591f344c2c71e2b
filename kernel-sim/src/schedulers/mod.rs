//! The scheduling engines
//!
//! `SchedulerRr` is the round robin tick driver integrating memory access
//! and producer-consumer blocking; `SchedulerSjf` is the non-preemptive
//! shortest-job-first variant.

use std::fmt;

use crate::common_types::Tick;
use crate::process::{Pcb, ProcType};

mod round_robin;
pub use round_robin::SchedulerRr;

mod sjf;
pub use sjf::SchedulerSjf;

/// Aggregate counters over a scheduler's process table
#[derive(Clone, Copy, Debug)]
pub struct SchedulerSummary {
    pub global_tick: Tick,
    pub total_processes: usize,
    pub finished: usize,
    pub avg_waiting: f64,
    pub avg_turnaround: f64,
    /// Share of ticks spent executing finished processes, in percent
    pub cpu_utilization: f64,
    pub total_produced: usize,
    pub total_consumed: usize,
}

impl fmt::Display for SchedulerSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tick {}", self.global_tick)?;
        writeln!(
            f,
            "  processes: {} created, {} finished",
            self.total_processes, self.finished
        )?;
        writeln!(
            f,
            "  avg waiting={:.2} avg turnaround={:.2} cpu={:.2}%",
            self.avg_waiting, self.avg_turnaround, self.cpu_utilization
        )?;
        write!(
            f,
            "  items: {} produced, {} consumed",
            self.total_produced, self.total_consumed
        )
    }
}

fn summarize<'a>(global_tick: Tick, procs: impl Iterator<Item = &'a Pcb>) -> SchedulerSummary {
    let mut total = 0;
    let mut finished = 0;
    let mut waiting = 0usize;
    let mut turnaround = 0usize;
    let mut cpu_time = 0usize;
    let mut produced = 0;
    let mut consumed = 0;

    for proc in procs {
        total += 1;
        match proc.role {
            ProcType::Producer => produced += proc.items_produced,
            ProcType::Consumer => consumed += proc.items_consumed,
            _ => {}
        }
        if proc.is_terminated() {
            finished += 1;
            waiting += proc.waiting_time;
            turnaround += proc.turnaround;
            cpu_time += proc.turnaround.saturating_sub(proc.waiting_time);
        }
    }

    let (avg_waiting, avg_turnaround) = if finished > 0 {
        (
            waiting as f64 / finished as f64,
            turnaround as f64 / finished as f64,
        )
    } else {
        (0.0, 0.0)
    };
    let cpu_utilization = if global_tick > 0 {
        cpu_time as f64 * 100.0 / global_tick as f64
    } else {
        0.0
    };

    SchedulerSummary {
        global_tick,
        total_processes: total,
        finished,
        avg_waiting,
        avg_turnaround,
        cpu_utilization,
        total_produced: produced,
        total_consumed: consumed,
    }
}
