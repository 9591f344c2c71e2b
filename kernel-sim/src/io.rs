use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

use log::debug;

use crate::common_types::{Pid, Tick};

/// The three simulated devices
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IoDevice {
    Printer,
    Disk,
    Network,
}

impl IoDevice {
    pub const ALL: [IoDevice; 3] = [IoDevice::Printer, IoDevice::Disk, IoDevice::Network];

    pub fn name(&self) -> &'static str {
        match self {
            IoDevice::Printer => "PRINTER",
            IoDevice::Disk => "DISK",
            IoDevice::Network => "NETWORK",
        }
    }

    /// Fixed service rate in bytes per tick
    pub fn service_rate(&self) -> usize {
        match self {
            IoDevice::Printer => 80,
            IoDevice::Disk => 512,
            IoDevice::Network => 256,
        }
    }

    fn index(&self) -> usize {
        match self {
            IoDevice::Printer => 0,
            IoDevice::Disk => 1,
            IoDevice::Network => 2,
        }
    }
}

/// Request urgency; earlier variants are served first
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub enum IoPriority {
    High,
    Medium,
    Low,
}

impl IoPriority {
    pub fn name(&self) -> &'static str {
        match self {
            IoPriority::High => "HIGH",
            IoPriority::Medium => "MEDIUM",
            IoPriority::Low => "LOW",
        }
    }
}

/// One I/O transfer tracked from submission to completion
#[derive(Clone, Debug)]
pub struct IoRequest {
    pub pid: Pid,
    pub device: IoDevice,
    pub priority: IoPriority,
    /// Bytes requested at submission
    pub size: usize,
    /// Bytes still to transfer; drops by the device rate each busy tick
    pub remaining: i64,
    pub arrival_tick: Tick,
    /// Tick the device picked the request up
    pub start_tick: Option<Tick>,
    pub completion_tick: Option<Tick>,
}

/// Heap entry: most urgent first, FIFO within a priority
struct Queued {
    request: IoRequest,
    seq: u64,
}

impl PartialEq for Queued {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for Queued {}

impl PartialOrd for Queued {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Queued {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .request
            .priority
            .cmp(&self.request.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct DeviceState {
    device: IoDevice,
    queue: BinaryHeap<Queued>,
    current: Option<IoRequest>,
    dispatched: usize,
    completed: usize,
    total_wait: usize,
    total_turnaround: usize,
}

impl DeviceState {
    fn new(device: IoDevice) -> DeviceState {
        DeviceState {
            device,
            queue: BinaryHeap::new(),
            current: None,
            dispatched: 0,
            completed: 0,
            total_wait: 0,
            total_turnaround: 0,
        }
    }
}

/// Read-only view of one device, for reporting
#[derive(Clone, Debug)]
pub struct IoDeviceStatus {
    pub device: IoDevice,
    pub busy_with: Option<(Pid, i64)>,
    pub queued: usize,
    pub completed: usize,
}

/// Multi-device I/O manager with per-device priority queues
///
/// Each device services one request at a time at its fixed byte rate;
/// a completing device can pick up its next request within the same tick.
pub struct IoManager {
    devices: Vec<DeviceState>,
    current_tick: Tick,
    total_requests: usize,
    completed_requests: usize,
    next_seq: u64,
    finished: Vec<IoRequest>,
}

impl Default for IoManager {
    fn default() -> Self {
        IoManager::new()
    }
}

impl IoManager {
    pub fn new() -> IoManager {
        IoManager {
            devices: IoDevice::ALL.iter().map(|&d| DeviceState::new(d)).collect(),
            current_tick: 0,
            total_requests: 0,
            completed_requests: 0,
            next_seq: 0,
            finished: Vec::new(),
        }
    }

    /// Queues a transfer of `size` bytes on `device` at the current tick
    pub fn submit_request(&mut self, pid: Pid, device: IoDevice, priority: IoPriority, size: usize) {
        let request = IoRequest {
            pid,
            device,
            priority,
            size,
            remaining: size as i64,
            arrival_tick: self.current_tick,
            start_tick: None,
            completion_tick: None,
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.devices[device.index()].queue.push(Queued { request, seq });
        self.total_requests += 1;
    }

    /// Advances every device by one tick: finish transfers first, then
    /// dispatch the most urgent queued request to each free device
    pub fn tick(&mut self) {
        self.current_tick += 1;

        for dev in self.devices.iter_mut() {
            let rate = dev.device.service_rate() as i64;

            let done = match dev.current.as_mut() {
                Some(req) => {
                    req.remaining -= rate;
                    req.remaining <= 0
                }
                None => false,
            };
            if done {
                if let Some(mut req) = dev.current.take() {
                    req.completion_tick = Some(self.current_tick);
                    dev.completed += 1;
                    dev.total_turnaround += self.current_tick - req.arrival_tick;
                    self.completed_requests += 1;
                    debug!(
                        "{} finished {} bytes for pid {} at tick {}",
                        dev.device.name(),
                        req.size,
                        req.pid,
                        self.current_tick
                    );
                    self.finished.push(req);
                }
            }

            if dev.current.is_none() {
                if let Some(queued) = dev.queue.pop() {
                    let mut req = queued.request;
                    req.start_tick = Some(self.current_tick);
                    dev.dispatched += 1;
                    dev.total_wait += self.current_tick - req.arrival_tick;
                    debug!(
                        "{} starts pid {} ({} bytes, {})",
                        dev.device.name(),
                        req.pid,
                        req.size,
                        req.priority.name()
                    );
                    dev.current = Some(req);
                }
            }
        }
    }

    pub fn run_ticks(&mut self, n: usize) {
        for _ in 0..n {
            self.tick();
        }
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    pub fn total_requests(&self) -> usize {
        self.total_requests
    }

    pub fn completed_requests(&self) -> usize {
        self.completed_requests
    }

    pub fn pending_requests(&self) -> usize {
        self.devices
            .iter()
            .map(|d| d.queue.len() + d.current.is_some() as usize)
            .sum()
    }

    /// Completed transfers in completion order
    pub fn finished(&self) -> &[IoRequest] {
        &self.finished
    }

    pub fn device_status(&self, device: IoDevice) -> IoDeviceStatus {
        let dev = &self.devices[device.index()];
        IoDeviceStatus {
            device,
            busy_with: dev.current.as_ref().map(|r| (r.pid, r.remaining)),
            queued: dev.queue.len(),
            completed: dev.completed,
        }
    }

    /// Mean ticks between submission and dispatch, over dispatched requests
    pub fn average_wait_time(&self) -> f64 {
        let dispatched: usize = self.devices.iter().map(|d| d.dispatched).sum();
        if dispatched == 0 {
            return 0.0;
        }
        let waited: usize = self.devices.iter().map(|d| d.total_wait).sum();
        waited as f64 / dispatched as f64
    }

    /// Mean ticks between submission and completion, over completed requests
    pub fn average_turnaround(&self) -> f64 {
        if self.completed_requests == 0 {
            return 0.0;
        }
        let total: usize = self.devices.iter().map(|d| d.total_turnaround).sum();
        total as f64 / self.completed_requests as f64
    }

    pub fn throughput(&self) -> f64 {
        if self.current_tick == 0 {
            0.0
        } else {
            self.completed_requests as f64 / self.current_tick as f64
        }
    }
}

impl fmt::Display for IoManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "io: {} submitted, {} completed, {} pending",
            self.total_requests,
            self.completed_requests,
            self.pending_requests()
        )?;
        for device in IoDevice::ALL {
            let status = self.device_status(device);
            match status.busy_with {
                Some((pid, remaining)) => writeln!(
                    f,
                    "  {}: pid {} ({} bytes left), {} queued",
                    device.name(),
                    pid,
                    remaining,
                    status.queued
                )?,
                None => writeln!(f, "  {}: idle, {} queued", device.name(), status.queued)?,
            }
        }
        write!(
            f,
            "  avg wait={:.2} throughput={:.3} req/tick",
            self.average_wait_time(),
            self.throughput()
        )
    }
}
