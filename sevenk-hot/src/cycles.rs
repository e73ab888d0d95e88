// sevenk-hot: Cycle counter and per-operation budget accounting
// Platform-specific counters (RDTSC on x86-64, CNTVCT_EL0 on AArch64)

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;
use serde::{Deserialize, Serialize};

use crate::error::BudgetExceeded;

/// Read the CPU cycle counter.
///
/// On x86-64 this is RDTSC; on AArch64 the virtual counter register. On
/// targets without a cycle counter a strictly monotonic nanosecond clock
/// stands in, so elapsed values remain well-ordered but are not cycles.
#[inline(always)]
pub fn read_cycles() -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        unsafe { core::arch::x86_64::_rdtsc() }
    }
    #[cfg(target_arch = "aarch64")]
    {
        let val: u64;
        unsafe {
            core::arch::asm!("mrs {}, cntvct_el0", out(reg) val, options(nomem, nostack));
        }
        val
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        fallback_cycles()
    }
}

/// Read the cycle counter with serialization fences. More precise at the
/// cost of higher overhead; used for calibration, not the hot path.
#[inline(always)]
pub fn read_cycles_precise() -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        unsafe {
            let mut aux = 0u32;
            let cycles = core::arch::x86_64::__rdtscp(&mut aux);
            core::arch::x86_64::_mm_lfence();
            cycles
        }
    }
    #[cfg(target_arch = "aarch64")]
    {
        unsafe {
            core::arch::asm!("dsb sy", options(nostack, nomem));
            let val: u64;
            core::arch::asm!("mrs {}, cntvct_el0", out(reg) val, options(nomem, nostack));
            core::arch::asm!("dsb sy", options(nostack, nomem));
            val
        }
    }
    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        fallback_cycles()
    }
}

/// Whether this target reads a hardware cycle counter. When false, budget
/// thresholds are advisory (the fallback clock ticks in nanoseconds).
pub const fn counter_is_hardware() -> bool {
    cfg!(any(target_arch = "x86_64", target_arch = "aarch64"))
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn fallback_cycles() -> u64 {
    static EPOCH: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    static LAST: AtomicU64 = AtomicU64::new(0);
    let nanos = EPOCH.get_or_init(std::time::Instant::now).elapsed().as_nanos() as u64;
    // Strictly monotonic even when the clock ties between calls.
    let mut prev = LAST.load(Ordering::Relaxed);
    loop {
        let next = nanos.max(prev + 1);
        match LAST.compare_exchange_weak(prev, next, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => return next,
            Err(p) => prev = p,
        }
    }
}

/// Measured counter-read overhead, stored by [`calibrate`].
static READ_OVERHEAD: AtomicU64 = AtomicU64::new(0);

/// Calibration summary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Calibration {
    pub read_overhead_cycles: u64,
    pub hardware_counter: bool,
}

/// Measure the overhead of a counter read and cache it so timers can
/// compensate. Uses the 10th percentile over many rounds to shed outliers.
pub fn calibrate() -> Calibration {
    const ROUNDS: usize = 4096;
    for _ in 0..64 {
        let _ = read_cycles();
    }
    let mut samples = Vec::with_capacity(ROUNDS);
    for _ in 0..ROUNDS {
        let start = read_cycles_precise();
        std::hint::black_box(read_cycles());
        let end = read_cycles_precise();
        samples.push(end.saturating_sub(start));
    }
    samples.sort_unstable();
    let overhead = samples[ROUNDS / 10];
    READ_OVERHEAD.store(overhead, Ordering::Relaxed);
    tracing::debug!(
        overhead_cycles = overhead,
        hardware = counter_is_hardware(),
        "cycle counter calibrated"
    );
    Calibration {
        read_overhead_cycles: overhead,
        hardware_counter: counter_is_hardware(),
    }
}

/// Inline timer for a single operation, compensated for the calibrated
/// read overhead.
pub struct CycleTimer {
    start: u64,
    overhead: u64,
}

impl CycleTimer {
    #[inline(always)]
    pub fn start() -> Self {
        Self {
            overhead: READ_OVERHEAD.load(Ordering::Relaxed),
            start: read_cycles(),
        }
    }

    #[inline(always)]
    pub fn elapsed(&self) -> u64 {
        read_cycles()
            .saturating_sub(self.start)
            .saturating_sub(self.overhead)
    }
}

/// What to do when a budgeted operation overruns. Chosen at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BudgetPolicy {
    /// Record the overrun and return the computed result.
    #[default]
    Report,
    /// Record the overrun and fail the checked operation with
    /// [`BudgetExceeded`], even though the result was computed.
    Enforce,
}

/// Lock-free aggregate for one operation class. All counters are relaxed
/// atomics behind cache-line padding; readers may race writers and see a
/// torn-but-individually-consistent snapshot.
pub struct OpMeter {
    budget: u64,
    operations: CachePadded<AtomicU64>,
    cycles_total: CachePadded<AtomicU64>,
    cycles_min: CachePadded<AtomicU64>,
    cycles_max: CachePadded<AtomicU64>,
    overruns: CachePadded<AtomicU64>,
}

impl OpMeter {
    pub fn new(budget: u64) -> Self {
        Self {
            budget,
            operations: CachePadded::new(AtomicU64::new(0)),
            cycles_total: CachePadded::new(AtomicU64::new(0)),
            cycles_min: CachePadded::new(AtomicU64::new(u64::MAX)),
            cycles_max: CachePadded::new(AtomicU64::new(0)),
            overruns: CachePadded::new(AtomicU64::new(0)),
        }
    }

    #[inline(always)]
    pub fn budget(&self) -> u64 {
        self.budget
    }

    /// Record one elapsed measurement. Returns whether it was within
    /// budget.
    #[inline]
    pub fn record(&self, elapsed: u64) -> bool {
        self.operations.fetch_add(1, Ordering::Relaxed);
        self.cycles_total.fetch_add(elapsed, Ordering::Relaxed);

        let mut min = self.cycles_min.load(Ordering::Relaxed);
        while elapsed < min {
            match self.cycles_min.compare_exchange_weak(
                min,
                elapsed,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(m) => min = m,
            }
        }
        let mut max = self.cycles_max.load(Ordering::Relaxed);
        while elapsed > max {
            match self.cycles_max.compare_exchange_weak(
                max,
                elapsed,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(m) => max = m,
            }
        }

        if elapsed > self.budget {
            self.overruns.fetch_add(1, Ordering::Relaxed);
            false
        } else {
            true
        }
    }

    /// Record and apply `policy`: Ok(elapsed) within budget or under
    /// Report, Err under Enforce on overrun.
    #[inline]
    pub fn check(&self, elapsed: u64, policy: BudgetPolicy) -> Result<u64, BudgetExceeded> {
        let within = self.record(elapsed);
        if !within && policy == BudgetPolicy::Enforce {
            return Err(BudgetExceeded {
                elapsed,
                budget: self.budget,
            });
        }
        Ok(elapsed)
    }

    pub fn snapshot(&self) -> OpSnapshot {
        let operations = self.operations.load(Ordering::Relaxed);
        OpSnapshot {
            budget: self.budget,
            operations,
            cycles_total: self.cycles_total.load(Ordering::Relaxed),
            cycles_min: if operations == 0 {
                0
            } else {
                self.cycles_min.load(Ordering::Relaxed)
            },
            cycles_max: self.cycles_max.load(Ordering::Relaxed),
            overruns: self.overruns.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of an [`OpMeter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpSnapshot {
    pub budget: u64,
    pub operations: u64,
    pub cycles_total: u64,
    pub cycles_min: u64,
    pub cycles_max: u64,
    pub overruns: u64,
}

/// Process-wide cycle accounting for the three budgeted operation
/// classes.
pub struct CycleMeter {
    policy: BudgetPolicy,
    pub ask: OpMeter,
    pub add: OpMeter,
    pub validate: OpMeter,
}

/// Snapshot of all three operation classes.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MeterSnapshot {
    pub ask: OpSnapshot,
    pub add: OpSnapshot,
    pub validate: OpSnapshot,
}

impl CycleMeter {
    pub fn new(policy: BudgetPolicy, ask_budget: u64, add_budget: u64, validate_budget: u64) -> Self {
        Self {
            policy,
            ask: OpMeter::new(ask_budget),
            add: OpMeter::new(add_budget),
            validate: OpMeter::new(validate_budget),
        }
    }

    #[inline(always)]
    pub fn policy(&self) -> BudgetPolicy {
        self.policy
    }

    pub fn snapshot(&self) -> MeterSnapshot {
        MeterSnapshot {
            ask: self.ask.snapshot(),
            add: self.add.snapshot(),
            validate: self.validate.snapshot(),
        }
    }
}
