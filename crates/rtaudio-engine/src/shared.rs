//! State shared between a controlling thread and an engine's realtime thread.

use core::ffi::{c_int, c_void};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use crate::backend::{CallbackRegistration, CALLBACK_ABORT, CALLBACK_CONTINUE, CALLBACK_STOP};
use crate::types::StreamStatus;

const NOT_HALTED: u8 = 0;
const HALT_DRAIN: u8 = 1;
const HALT_ABORT: u8 = 2;

/// How a stream left the running state on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Halt {
    Drain,
    Abort,
}

/// Gate, clock and status bits for one open stream.
///
/// The realtime side only takes `gate` with `try_read`, so it never blocks.
/// `disable` takes the write side, which waits out an in-flight callback.
pub struct StreamShared {
    gate: RwLock<()>,
    enabled: AtomicBool,
    halted: AtomicU8,
    frames: AtomicU64,
    base_time: AtomicU64,
    sample_rate: u32,
    pending_status: AtomicU32,
    latency_frames: AtomicU32,
    invocations: AtomicU64,
}

impl StreamShared {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            gate: RwLock::new(()),
            enabled: AtomicBool::new(false),
            halted: AtomicU8::new(NOT_HALTED),
            frames: AtomicU64::new(0),
            base_time: AtomicU64::new(0f64.to_bits()),
            sample_rate: sample_rate.max(1),
            pending_status: AtomicU32::new(0),
            latency_frames: AtomicU32::new(0),
            invocations: AtomicU64::new(0),
        }
    }

    pub fn enable(&self) {
        let _barrier = self.gate.write();
        self.halted.store(NOT_HALTED, Ordering::Release);
        self.pending_status.store(0, Ordering::Relaxed);
        self.enabled.store(true, Ordering::Release);
    }

    /// Stops further callback invocations and returns once none is in flight.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
        drop(self.gate.write());
    }

    pub fn is_running(&self) -> bool {
        self.enabled.load(Ordering::Acquire) && self.halted.load(Ordering::Acquire) == NOT_HALTED
    }

    pub fn halt(&self) -> Option<Halt> {
        match self.halted.load(Ordering::Acquire) {
            HALT_DRAIN => Some(Halt::Drain),
            HALT_ABORT => Some(Halt::Abort),
            _ => None,
        }
    }

    /// Runs one callback period. Returns `None` when the callback was skipped
    /// because the stream is disabled, halted or being stopped; the caller
    /// should emit silence in that case.
    ///
    /// # Safety
    /// Same contract as [`CallbackRegistration::invoke`].
    #[inline]
    pub unsafe fn run_callback(
        &self,
        registration: &CallbackRegistration,
        output: *mut c_void,
        input: *mut c_void,
        frames: u32,
    ) -> Option<c_int> {
        let _guard = self.gate.try_read()?;
        if !self.is_running() {
            return None;
        }
        let status = StreamStatus::from_bits_truncate(self.pending_status.swap(0, Ordering::AcqRel));
        let time = self.stream_time();
        let ret = registration.invoke(output, input, frames, time, status);
        self.frames.fetch_add(u64::from(frames), Ordering::AcqRel);
        self.invocations.fetch_add(1, Ordering::Relaxed);
        match ret {
            CALLBACK_CONTINUE => {}
            CALLBACK_STOP => self.halted.store(HALT_DRAIN, Ordering::Release),
            CALLBACK_ABORT => self.halted.store(HALT_ABORT, Ordering::Release),
            // Anything else is treated as a request to abort.
            _ => self.halted.store(HALT_ABORT, Ordering::Release),
        }
        Some(ret)
    }

    /// Flags a condition to report with the next callback.
    #[inline]
    pub fn flag_status(&self, status: StreamStatus) {
        self.pending_status.fetch_or(status.bits(), Ordering::AcqRel);
    }

    pub fn stream_time(&self) -> f64 {
        let base = f64::from_bits(self.base_time.load(Ordering::Acquire));
        let frames = self.frames.load(Ordering::Acquire);
        base + frames as f64 / f64::from(self.sample_rate)
    }

    pub fn set_stream_time(&self, time: f64) {
        self.frames.store(0, Ordering::Release);
        self.base_time.store(time.to_bits(), Ordering::Release);
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn period(&self, frames: u32) -> Duration {
        Duration::from_secs_f64(f64::from(frames) / f64::from(self.sample_rate))
    }

    pub fn set_latency(&self, frames: u32) {
        self.latency_frames.store(frames, Ordering::Relaxed);
    }

    pub fn latency(&self) -> u32 {
        self.latency_frames.load(Ordering::Relaxed)
    }

    pub fn invocations(&self) -> u64 {
        self.invocations.load(Ordering::Relaxed)
    }
}
