use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use log::debug;

use crate::common_types::{Pid, DEFAULT_NUM_FRAMES};

/// Page replacement policy
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PageAlgo {
    Fifo,
    Lru,
    /// Page-Fault-Frequency: processes faulting often steal frames from
    /// processes faulting rarely, falling back to LRU
    Pff,
}

impl PageAlgo {
    pub fn name(&self) -> &'static str {
        match self {
            PageAlgo::Fifo => "FIFO",
            PageAlgo::Lru => "LRU",
            PageAlgo::Pff => "PFF",
        }
    }
}

/// A physical frame holding at most one (pid, page) pair
#[derive(Clone, Copy, Debug, Default)]
pub struct Frame {
    occupant: Option<(Pid, usize)>,
}

impl Frame {
    pub fn occupant(&self) -> Option<(Pid, usize)> {
        self.occupant
    }

    pub fn is_free(&self) -> bool {
        self.occupant.is_none()
    }
}

/// Paged virtual memory over a fixed set of frames
///
/// Keeps the resident set in a (pid, page) -> frame map, a FIFO queue of
/// frame indices and per-key LRU stamps. Victim selection is policy driven.
pub struct MemoryManager {
    num_frames: usize,
    frames: Vec<Frame>,
    fifo_queue: VecDeque<usize>,
    mapping: BTreeMap<(Pid, usize), usize>,
    last_use: BTreeMap<(Pid, usize), usize>,
    total_accesses: usize,
    total_faults: usize,
    algorithm: PageAlgo,
    pff_threshold_high: usize,
    pff_threshold_low: usize,
    pid_frame_count: BTreeMap<Pid, usize>,
    pid_fault_count: BTreeMap<Pid, usize>,
}

impl Default for MemoryManager {
    fn default() -> Self {
        MemoryManager::new(DEFAULT_NUM_FRAMES, PageAlgo::Fifo)
    }
}

impl MemoryManager {
    pub fn new(num_frames: usize, algorithm: PageAlgo) -> MemoryManager {
        MemoryManager {
            num_frames,
            frames: vec![Frame::default(); num_frames],
            fifo_queue: VecDeque::new(),
            mapping: BTreeMap::new(),
            last_use: BTreeMap::new(),
            total_accesses: 0,
            total_faults: 0,
            algorithm,
            pff_threshold_high: 3,
            pff_threshold_low: 1,
            pid_frame_count: BTreeMap::new(),
            pid_fault_count: BTreeMap::new(),
        }
    }

    /// Touches `page` of `pid`, returning whether the access faulted
    pub fn access(&mut self, pid: Pid, page: usize) -> bool {
        self.total_accesses += 1;
        let key = (pid, page);

        if self.mapping.contains_key(&key) {
            self.last_use.insert(key, self.total_accesses);
            return false;
        }

        self.total_faults += 1;
        *self.pid_fault_count.entry(pid).or_insert(0) += 1;

        let slot = match self.frames.iter().position(Frame::is_free) {
            Some(free) => free,
            None => match self.select_victim(pid) {
                Some(victim) => {
                    self.evict(victim);
                    victim
                }
                // no frames at all: count the fault, place nothing
                None => return true,
            },
        };

        self.frames[slot].occupant = Some((pid, page));
        self.mapping.insert(key, slot);
        self.last_use.insert(key, self.total_accesses);
        self.fifo_queue.push_back(slot);
        *self.pid_frame_count.entry(pid).or_insert(0) += 1;
        true
    }

    fn evict(&mut self, slot: usize) {
        if let Some((victim_pid, victim_page)) = self.frames[slot].occupant.take() {
            debug!(
                "evicting pid {} page {} from frame {}",
                victim_pid, victim_page, slot
            );
            self.mapping.remove(&(victim_pid, victim_page));
            self.last_use.remove(&(victim_pid, victim_page));
            if let Some(count) = self.pid_frame_count.get_mut(&victim_pid) {
                *count = count.saturating_sub(1);
            }
        }
    }

    fn select_victim(&mut self, pid: Pid) -> Option<usize> {
        match self.algorithm {
            PageAlgo::Fifo => self.select_victim_fifo(),
            PageAlgo::Lru => self.select_victim_lru(),
            PageAlgo::Pff => self.select_victim_pff(pid),
        }
    }

    fn select_victim_fifo(&mut self) -> Option<usize> {
        self.fifo_queue.pop_front()
    }

    fn select_victim_lru(&mut self) -> Option<usize> {
        let slot = self
            .mapping
            .iter()
            .min_by_key(|&(key, _)| self.last_use.get(key).copied().unwrap_or(0))
            .map(|(_, &slot)| slot)?;
        // keep the FIFO queue consistent with the occupied frames
        self.fifo_queue.retain(|&idx| idx != slot);
        Some(slot)
    }

    fn select_victim_pff(&mut self, pid: Pid) -> Option<usize> {
        let fault_freq = self.pid_fault_count.get(&pid).copied().unwrap_or(0);

        if fault_freq > self.pff_threshold_high {
            for (&(owner, _), &slot) in self.mapping.iter() {
                let owner_faults = self.pid_fault_count.get(&owner).copied().unwrap_or(0);
                if owner != pid && owner_faults < self.pff_threshold_low {
                    self.fifo_queue.retain(|&idx| idx != slot);
                    return Some(slot);
                }
            }
        }

        self.select_victim_lru()
    }

    /// Releases every frame owned by `pid`
    pub fn free_frames_of(&mut self, pid: Pid) {
        for slot in 0..self.frames.len() {
            if matches!(self.frames[slot].occupant, Some((owner, _)) if owner == pid) {
                let (_, page) = self.frames[slot].occupant.take().unwrap_or((pid, 0));
                self.mapping.remove(&(pid, page));
                self.last_use.remove(&(pid, page));
                self.fifo_queue.retain(|&idx| idx != slot);
            }
        }
        self.pid_frame_count.remove(&pid);
        self.pid_fault_count.remove(&pid);
    }

    /// Resizes physical memory, discarding the whole resident set
    ///
    /// Global access/fault counters survive.
    pub fn set_num_frames(&mut self, num_frames: usize) {
        self.num_frames = num_frames;
        self.frames = vec![Frame::default(); num_frames];
        self.clear_residency();
    }

    /// Switches the replacement policy, discarding the whole resident set
    ///
    /// Global access/fault counters and per-pid fault counts (the PFF
    /// input) survive.
    pub fn set_algorithm(&mut self, algorithm: PageAlgo) {
        self.algorithm = algorithm;
        self.frames = vec![Frame::default(); self.num_frames];
        self.clear_residency();
    }

    fn clear_residency(&mut self) {
        self.mapping.clear();
        self.last_use.clear();
        self.fifo_queue.clear();
        self.pid_frame_count.clear();
    }

    pub fn set_pff_thresholds(&mut self, high: usize, low: usize) {
        self.pff_threshold_high = high;
        self.pff_threshold_low = low;
    }

    pub fn algorithm(&self) -> PageAlgo {
        self.algorithm
    }

    pub fn num_frames(&self) -> usize {
        self.num_frames
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn resident_pages(&self) -> usize {
        self.mapping.len()
    }

    pub fn frames_of(&self, pid: Pid) -> usize {
        self.pid_frame_count.get(&pid).copied().unwrap_or(0)
    }

    pub fn faults_of(&self, pid: Pid) -> usize {
        self.pid_fault_count.get(&pid).copied().unwrap_or(0)
    }

    pub fn total_accesses(&self) -> usize {
        self.total_accesses
    }

    pub fn total_faults(&self) -> usize {
        self.total_faults
    }

    pub fn hit_rate(&self) -> f64 {
        if self.total_accesses == 0 {
            0.0
        } else {
            (1.0 - self.total_faults as f64 / self.total_accesses as f64) * 100.0
        }
    }
}

impl fmt::Display for MemoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "memory ({}, {} frames)", self.algorithm.name(), self.num_frames)?;
        for (idx, frame) in self.frames.iter().enumerate() {
            match frame.occupant() {
                Some((pid, page)) => writeln!(f, "  frame {idx}: pid={pid} page={page}")?,
                None => writeln!(f, "  frame {idx}: free")?,
            }
        }
        writeln!(
            f,
            "  accesses={} faults={} hit rate={:.2}%",
            self.total_accesses,
            self.total_faults,
            self.hit_rate()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: usize) -> Pid {
        Pid::new(n)
    }

    #[test]
    fn fills_free_frames_lowest_index_first() {
        let mut mem = MemoryManager::new(3, PageAlgo::Fifo);
        assert!(mem.access(pid(1), 0));
        assert!(mem.access(pid(1), 1));
        assert_eq!(mem.frames()[0].occupant(), Some((pid(1), 0)));
        assert_eq!(mem.frames()[1].occupant(), Some((pid(1), 1)));
        assert!(mem.frames()[2].is_free());
    }

    #[test]
    fn fifo_evicts_the_oldest_frame() {
        let mut mem = MemoryManager::new(3, PageAlgo::Fifo);
        let p = pid(1);
        let pattern = [0, 1, 2, 0, 3, 0];
        let faults: usize = pattern.iter().map(|&pg| mem.access(p, pg) as usize).sum();

        // 0,1,2 fault; 0 hits; 3 evicts page 0; 0 faults again
        assert_eq!(faults, 5);
        assert_eq!(mem.total_accesses(), 6);
    }

    #[test]
    fn lru_evicts_the_stalest_page() {
        let mut mem = MemoryManager::new(3, PageAlgo::Lru);
        let p = pid(1);
        let pattern = [0, 1, 2, 0, 3, 0];
        let faults: usize = pattern.iter().map(|&pg| mem.access(p, pg) as usize).sum();

        // page 1 is the LRU victim when 3 arrives, so the final 0 still hits
        assert_eq!(faults, 4);
    }

    #[test]
    fn cyclic_overcommit_faults_on_every_access() {
        // 4 pages cycled through 3 frames defeat both FIFO and LRU
        for algo in [PageAlgo::Fifo, PageAlgo::Lru] {
            let mut mem = MemoryManager::new(3, algo);
            let mut faults = 0;
            for _round in 0..3 {
                for page in 0..4 {
                    if mem.access(pid(1), page) {
                        faults += 1;
                    }
                }
            }
            assert_eq!(faults, 12, "{:?}", algo);
        }
    }

    #[test]
    fn pff_steals_from_a_low_fault_owner() {
        let mut mem = MemoryManager::new(2, PageAlgo::Pff);
        mem.set_pff_thresholds(0, 2);

        assert!(mem.access(pid(2), 0)); // quiet owner, one fault
        assert!(mem.access(pid(1), 0));
        assert!(!mem.access(pid(2), 0)); // freshen pid 2 so LRU would spare it

        // pid 1 faults again: PFF picks pid 2's frame even though it is
        // the most recently used
        assert!(mem.access(pid(1), 1));
        assert!(!mem.access(pid(1), 0));
        assert!(mem.access(pid(2), 0));
    }

    #[test]
    fn pff_with_default_thresholds_degrades_to_lru() {
        let mut lru = MemoryManager::new(3, PageAlgo::Lru);
        let mut pff = MemoryManager::new(3, PageAlgo::Pff);
        let pattern = [(1, 0), (2, 0), (1, 1), (1, 2), (2, 1), (1, 0)];

        let run = |mem: &mut MemoryManager| -> Vec<bool> {
            pattern
                .iter()
                .map(|&(p, pg)| mem.access(pid(p), pg))
                .collect()
        };
        assert_eq!(run(&mut lru), run(&mut pff));

        let occupants = |mem: &MemoryManager| -> Vec<Option<(Pid, usize)>> {
            mem.frames().iter().map(Frame::occupant).collect()
        };
        assert_eq!(occupants(&lru), occupants(&pff));
    }

    #[test]
    fn free_frames_of_releases_and_reuses_slots() {
        let mut mem = MemoryManager::new(3, PageAlgo::Fifo);
        mem.access(pid(1), 0);
        mem.access(pid(2), 0);
        mem.access(pid(1), 1);

        mem.free_frames_of(pid(1));
        assert_eq!(mem.frames_of(pid(1)), 0);
        assert_eq!(mem.resident_pages(), 1);
        assert!(mem.frames()[0].is_free());
        assert!(mem.frames()[2].is_free());

        // freed slots are refilled lowest index first
        assert!(mem.access(pid(3), 0));
        assert_eq!(mem.frames()[0].occupant(), Some((pid(3), 0)));
    }

    #[test]
    fn resets_discard_residency_but_keep_counters() {
        let mut mem = MemoryManager::new(2, PageAlgo::Fifo);
        mem.access(pid(1), 0);
        mem.access(pid(1), 1);
        mem.access(pid(1), 0);
        let accesses = mem.total_accesses();
        let faults = mem.total_faults();

        mem.set_num_frames(2);
        assert_eq!(mem.resident_pages(), 0);
        assert_eq!(mem.total_accesses(), accesses);
        assert_eq!(mem.total_faults(), faults);

        mem.set_algorithm(PageAlgo::Lru);
        assert_eq!(mem.resident_pages(), 0);
        assert_eq!(mem.total_faults(), faults);

        // repeated reset is itself idempotent
        mem.set_num_frames(2);
        mem.set_num_frames(2);
        assert_eq!(mem.resident_pages(), 0);
        assert!(mem.frames().iter().all(Frame::is_free));
    }

    #[test]
    fn residency_map_matches_occupied_frames() {
        let mut mem = MemoryManager::new(3, PageAlgo::Lru);
        for (p, pg) in [(1, 0), (2, 0), (1, 1), (2, 1), (1, 2)] {
            mem.access(pid(p), pg);
            let occupied = mem.frames().iter().filter(|fr| !fr.is_free()).count();
            assert_eq!(occupied, mem.resident_pages());
            let by_pid: usize = [1, 2].iter().map(|&q| mem.frames_of(pid(q))).sum();
            assert_eq!(by_pid, mem.resident_pages());
        }
    }
}
