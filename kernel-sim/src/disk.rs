use std::collections::VecDeque;
use std::fmt;

use log::debug;

/// Disk arm scheduling policy
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum DiskAlgo {
    Fcfs,
    Sstf,
    Scan,
}

impl DiskAlgo {
    pub fn name(&self) -> &'static str {
        match self {
            DiskAlgo::Fcfs => "FCFS",
            DiskAlgo::Sstf => "SSTF",
            DiskAlgo::Scan => "SCAN",
        }
    }
}

/// Disk-arm scheduler over cylinders 0..max_cylinder
///
/// Requests are queued in arrival order; the policy only decides which one
/// is serviced next. SCAN keeps a sweep direction that reverses when the
/// current direction runs out of work.
pub struct DiskScheduler {
    request_queue: VecDeque<usize>,
    head_position: usize,
    total_movement: usize,
    algorithm: DiskAlgo,
    max_cylinder: usize,
    access_history: Vec<usize>,
    direction: i32,
}

impl DiskScheduler {
    pub fn new(max_cylinder: usize, algorithm: DiskAlgo) -> DiskScheduler {
        DiskScheduler {
            request_queue: VecDeque::new(),
            head_position: 0,
            total_movement: 0,
            algorithm,
            max_cylinder,
            access_history: Vec::new(),
            direction: 1,
        }
    }

    /// Queues a request; out-of-range cylinders are silently dropped
    pub fn add_request(&mut self, cylinder: usize) {
        if cylinder < self.max_cylinder {
            self.request_queue.push_back(cylinder);
        }
    }

    /// Services one request according to the active policy
    ///
    /// Returns the serviced cylinder, or `None` when nothing is pending.
    pub fn process_next(&mut self) -> Option<usize> {
        if self.request_queue.is_empty() {
            return None;
        }

        let target = match self.algorithm {
            DiskAlgo::Fcfs => self.pick_fcfs(),
            DiskAlgo::Sstf => self.pick_sstf(),
            DiskAlgo::Scan => self.pick_scan(),
        }?;

        let movement = target.abs_diff(self.head_position);
        self.total_movement += movement;
        self.head_position = target;
        self.access_history.push(target);
        debug!("disk head moved {} cylinders to {}", movement, target);
        Some(target)
    }

    fn pick_fcfs(&mut self) -> Option<usize> {
        self.request_queue.pop_front()
    }

    fn pick_sstf(&mut self) -> Option<usize> {
        let head = self.head_position;
        // seek distance first, queue position as the tie-break
        let idx = self
            .request_queue
            .iter()
            .enumerate()
            .min_by_key(|&(idx, &cyl)| (cyl.abs_diff(head), idx))
            .map(|(idx, _)| idx)?;
        self.request_queue.remove(idx)
    }

    fn pick_scan(&mut self) -> Option<usize> {
        let target = match self.nearest_in_direction(self.direction) {
            Some(cyl) => cyl,
            None => {
                self.direction = -self.direction;
                self.nearest_in_direction(self.direction)?
            }
        };

        let idx = self.request_queue.iter().position(|&cyl| cyl == target)?;
        self.request_queue.remove(idx)
    }

    /// Nearest pending cylinder in the sweep direction: smallest at or
    /// above the head going up, largest at or below it going down
    fn nearest_in_direction(&self, direction: i32) -> Option<usize> {
        let head = self.head_position;
        if direction == 1 {
            self.request_queue
                .iter()
                .copied()
                .filter(|&cyl| cyl >= head)
                .min()
        } else {
            self.request_queue
                .iter()
                .copied()
                .filter(|&cyl| cyl <= head)
                .max()
        }
    }

    /// Switches the policy; the SCAN direction restarts upward
    pub fn set_algorithm(&mut self, algorithm: DiskAlgo) {
        self.algorithm = algorithm;
        self.direction = 1;
    }

    /// Clears movement accounting and parks the head at cylinder 0;
    /// pending requests stay queued
    pub fn reset(&mut self) {
        self.total_movement = 0;
        self.head_position = 0;
        self.access_history.clear();
        self.direction = 1;
    }

    pub fn algorithm(&self) -> DiskAlgo {
        self.algorithm
    }

    pub fn head_position(&self) -> usize {
        self.head_position
    }

    pub fn total_movement(&self) -> usize {
        self.total_movement
    }

    pub fn pending(&self) -> usize {
        self.request_queue.len()
    }

    pub fn history(&self) -> &[usize] {
        &self.access_history
    }
}

impl fmt::Display for DiskScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "disk ({})", self.algorithm.name())?;
        writeln!(f, "  head at cylinder {}", self.head_position)?;
        writeln!(f, "  total movement {} cylinders", self.total_movement)?;
        write!(f, "  {} pending requests", self.request_queue.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(disk: &mut DiskScheduler, requests: &[usize]) {
        for &cyl in requests {
            disk.add_request(cyl);
        }
    }

    fn drain(disk: &mut DiskScheduler) -> Vec<usize> {
        let mut order = Vec::new();
        while let Some(cyl) = disk.process_next() {
            order.push(cyl);
        }
        order
    }

    #[test]
    fn fcfs_services_in_arrival_order() {
        let mut disk = DiskScheduler::new(200, DiskAlgo::Fcfs);
        load(&mut disk, &[55, 10, 99]);
        assert_eq!(drain(&mut disk), vec![55, 10, 99]);
        assert_eq!(disk.total_movement(), 55 + 45 + 89);
    }

    #[test]
    fn sstf_always_picks_the_closest_cylinder() {
        let mut disk = DiskScheduler::new(200, DiskAlgo::Sstf);
        load(&mut disk, &[50]);
        disk.process_next();
        assert_eq!(disk.head_position(), 50);

        load(&mut disk, &[10, 22, 20, 2, 40, 6, 38]);
        assert_eq!(drain(&mut disk), vec![40, 38, 22, 20, 10, 6, 2]);
        assert_eq!(disk.total_movement(), 50 + 48);
    }

    #[test]
    fn sstf_ties_go_to_the_earlier_request() {
        let mut disk = DiskScheduler::new(200, DiskAlgo::Sstf);
        load(&mut disk, &[10]);
        disk.process_next();

        // 14 and 6 are both 4 away; 14 arrived first
        load(&mut disk, &[14, 6]);
        assert_eq!(disk.process_next(), Some(14));
    }

    #[test]
    fn scan_sweeps_up_then_reverses() {
        let mut disk = DiskScheduler::new(200, DiskAlgo::Scan);
        load(&mut disk, &[50]);
        disk.process_next();

        load(&mut disk, &[10, 22, 20, 2, 40, 6, 38, 100, 180]);
        assert_eq!(
            drain(&mut disk),
            vec![100, 180, 40, 38, 22, 20, 10, 6, 2]
        );
    }

    #[test]
    fn scan_keeps_direction_across_calls() {
        let mut disk = DiskScheduler::new(100, DiskAlgo::Scan);
        load(&mut disk, &[60, 40]);
        assert_eq!(disk.process_next(), Some(40));
        assert_eq!(disk.process_next(), Some(60));

        // still sweeping up: 70 is serviced before the closer 30
        load(&mut disk, &[30, 70]);
        assert_eq!(disk.process_next(), Some(70));
        assert_eq!(disk.process_next(), Some(30));
    }

    #[test]
    fn out_of_range_requests_are_dropped() {
        let mut disk = DiskScheduler::new(100, DiskAlgo::Fcfs);
        disk.add_request(100);
        disk.add_request(500);
        assert_eq!(disk.pending(), 0);
        assert_eq!(disk.process_next(), None);
    }

    #[test]
    fn movement_sums_absolute_hops() {
        let mut disk = DiskScheduler::new(200, DiskAlgo::Fcfs);
        load(&mut disk, &[30, 10, 40]);
        drain(&mut disk);
        assert_eq!(disk.total_movement(), 30 + 20 + 30);
        assert_eq!(disk.history(), &[30, 10, 40]);
        assert_eq!(disk.head_position(), 40);
    }

    #[test]
    fn reset_reparks_the_head_and_clears_accounting() {
        let mut disk = DiskScheduler::new(200, DiskAlgo::Sstf);
        load(&mut disk, &[30, 10]);
        disk.process_next();
        disk.reset();

        assert_eq!(disk.head_position(), 0);
        assert_eq!(disk.total_movement(), 0);
        assert!(disk.history().is_empty());
        assert_eq!(disk.pending(), 1);
    }
}
