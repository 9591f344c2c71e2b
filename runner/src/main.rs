use anyhow::Result;
use log::info;

use kernel_sim::{
    round_robin, DiskAlgo, DiskScheduler, HeapAllocator, IoDevice, IoManager, IoPriority,
    MemoryManager, PageAlgo, Pid, ProcType, ProducerConsumer, DEFAULT_BUFFER_SIZE,
    DEFAULT_NUM_FRAMES, DEFAULT_QUANTUM,
};

/// Drives a sample workload through every engine and dumps the reports.
fn main() -> Result<()> {
    env_logger::init();

    let mut memory = MemoryManager::new(DEFAULT_NUM_FRAMES, PageAlgo::Lru);
    let mut buffer = ProducerConsumer::new(DEFAULT_BUFFER_SIZE);

    let mut scheduler = round_robin(&mut memory, &mut buffer, DEFAULT_QUANTUM);
    scheduler.create_process(8, 4, ProcType::Normal);
    scheduler.create_process(6, 3, ProcType::Producer);
    scheduler.create_process(6, 3, ProcType::Consumer);
    let threaded = scheduler.create_process(1, 2, ProcType::Normal);
    scheduler.create_thread(threaded, 3);
    scheduler.create_thread(threaded, 3);

    scheduler.run_ticks(40);
    info!("scheduler done after {} ticks", scheduler.current_tick());

    println!("{}", scheduler.summary());
    for proc in scheduler.processes() {
        println!(
            "pid {} {} {} burst={} waited={} faults={}/{}",
            proc.id,
            proc.role.name(),
            proc.state.name(),
            proc.burst_remaining,
            proc.waiting_time,
            proc.page_faults,
            proc.page_accesses,
        );
    }
    println!("{}", scheduler.memory());

    let mut disk = DiskScheduler::new(200, DiskAlgo::Sstf);
    for cylinder in [10, 22, 20, 2, 40, 6, 38] {
        disk.add_request(cylinder);
    }
    while disk.process_next().is_some() {}
    println!("{disk}");

    let mut io = IoManager::new();
    io.submit_request(Pid::new(1), IoDevice::Printer, IoPriority::Low, 160);
    io.submit_request(Pid::new(2), IoDevice::Disk, IoPriority::High, 2048);
    io.submit_request(Pid::new(3), IoDevice::Network, IoPriority::Medium, 512);
    io.run_ticks(8);
    println!("{io}");

    let mut heap = HeapAllocator::new(64 * 1024, 64);
    let short_lived = heap.allocate(100);
    let retained = heap.allocate(4000);
    if let Some(addr) = short_lived {
        heap.deallocate(addr);
    }
    info!("retained heap block at {:?}", retained);
    println!("{}", heap.stats());

    Ok(())
}
