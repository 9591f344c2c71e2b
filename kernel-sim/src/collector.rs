use crate::process::Pcb;

/// Reporting surface shared by the schedulers
///
/// External front-ends render tables from these listings; the engines only
/// hand out the process records.
pub trait Collector {
    /// Returns the running process, if any
    fn collect_running(&self) -> Vec<&Pcb>;

    /// Returns the processes in ready state
    fn collect_ready(&self) -> Vec<&Pcb>;

    /// Returns the processes blocked on a semaphore
    fn collect_waiting(&self) -> Vec<&Pcb>;

    /// Returns the administratively frozen processes
    fn collect_suspended(&self) -> Vec<&Pcb>;

    /// Returns the finished processes
    fn collect_terminated(&self) -> Vec<&Pcb>;
}

pub fn collect_all(scheduler: &dyn Collector) -> Vec<&Pcb> {
    let mut procs: Vec<&Pcb> = Vec::new();

    for item in scheduler.collect_running() {
        procs.push(item);
    }

    for item in scheduler.collect_ready() {
        procs.push(item);
    }

    for item in scheduler.collect_waiting() {
        procs.push(item);
    }

    for item in scheduler.collect_suspended() {
        procs.push(item);
    }

    for item in scheduler.collect_terminated() {
        procs.push(item);
    }

    procs
}
