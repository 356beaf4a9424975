use std::time::{Duration, Instant};

/// Monotonic time source for the dispatch loop.
pub trait Clock {
    type Origin: Copy;

    /// Captures a reference point all offsets are measured from.
    fn origin(&self) -> Self::Origin;

    fn elapsed(&self, origin: Self::Origin) -> Duration;

    /// Blocks until `target` has elapsed since `origin`.
    fn wait_until(&self, origin: Self::Origin, target: Duration);
}

/// Busy-waiting clock. The spin costs a core for the duration of a run;
/// that is the price of not depending on OS wake-up latency. An optional
/// coarse window trades some of that cost away: the wait sleeps until it is
/// within the window of the target and only spins the remainder.
#[derive(Debug, Clone, Default)]
pub struct SpinClock {
    coarse_window: Option<Duration>,
}

impl SpinClock {
    /// Pure busy-wait.
    pub fn new() -> Self {
        Self {
            coarse_window: None,
        }
    }

    /// Sleep to within `window` of each target, then spin the rest.
    pub fn with_coarse_sleep(window: Duration) -> Self {
        Self {
            coarse_window: Some(window),
        }
    }
}

impl Clock for SpinClock {
    type Origin = Instant;

    fn origin(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, origin: Instant) -> Duration {
        origin.elapsed()
    }

    fn wait_until(&self, origin: Instant, target: Duration) {
        if let Some(window) = self.coarse_window {
            loop {
                let elapsed = origin.elapsed();
                if elapsed + window >= target {
                    break;
                }
                coarse_sleep(target - elapsed - window);
            }
        }
        while origin.elapsed() < target {
            std::hint::spin_loop();
        }
    }
}

#[cfg(target_os = "linux")]
fn coarse_sleep(duration: Duration) {
    use libc::{clock_nanosleep, timespec, CLOCK_MONOTONIC};

    let req = timespec {
        tv_sec: duration.as_secs() as libc::time_t,
        tv_nsec: duration.subsec_nanos() as libc::c_long,
    };

    unsafe {
        clock_nanosleep(CLOCK_MONOTONIC, 0, &req, std::ptr::null_mut());
    }
}

#[cfg(not(target_os = "linux"))]
fn coarse_sleep(duration: Duration) {
    std::thread::sleep(duration);
}
