//! Run Clock - 실행 시간 측정
//!
//! 벽시계 시간은 `Instant`, CPU 시간은 `getrusage(RUSAGE_CHILDREN)` 스냅샷의 차이로 계산한다.
//! 데몬은 한 번에 자식 프로세스 하나만 실행하므로 차이값이 곧 그 태스크의 CPU 사용량이다.
//! (자식이 회수(wait)된 뒤에만 누적되므로 반드시 프로세스 종료 후 `elapsed` 를 호출할 것)

use std::time::{Duration, Instant};
use tsp_foundation::RunTiming;

/// Accumulated user/system CPU time of reaped children
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuTimes {
    pub user: Duration,
    pub sys: Duration,
}

impl CpuTimes {
    #[cfg(unix)]
    pub fn children() -> Self {
        use nix::sys::resource::{getrusage, UsageWho};
        use nix::sys::time::TimeVal;

        fn to_duration(tv: TimeVal) -> Duration {
            let secs = u64::try_from(tv.tv_sec()).unwrap_or(0);
            let micros = u64::try_from(tv.tv_usec()).unwrap_or(0);
            Duration::from_secs(secs) + Duration::from_micros(micros)
        }

        match getrusage(UsageWho::RUSAGE_CHILDREN) {
            Ok(usage) => Self {
                user: to_duration(usage.user_time()),
                sys: to_duration(usage.system_time()),
            },
            Err(e) => {
                tracing::warn!("getrusage failed: {}", e);
                Self::default()
            }
        }
    }

    #[cfg(not(unix))]
    pub fn children() -> Self {
        Self::default()
    }

    fn saturating_sub(self, earlier: CpuTimes) -> CpuTimes {
        CpuTimes {
            user: self.user.saturating_sub(earlier.user),
            sys: self.sys.saturating_sub(earlier.sys),
        }
    }
}

/// Snapshot taken before a task starts
#[derive(Debug, Clone, Copy)]
pub struct RunClock {
    started: Instant,
    cpu: CpuTimes,
}

impl RunClock {
    pub fn start() -> Self {
        Self {
            started: Instant::now(),
            cpu: CpuTimes::children(),
        }
    }

    /// Real/user/sys time since `start`; never negative
    pub fn elapsed(&self) -> RunTiming {
        let cpu = CpuTimes::children().saturating_sub(self.cpu);
        RunTiming::new(self.started.elapsed(), cpu.user, cpu.sys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elapsed_is_non_negative() {
        let clock = RunClock::start();
        std::thread::sleep(Duration::from_millis(20));
        let timing = clock.elapsed();
        assert!(timing.real >= 0.02);
        assert!(timing.user >= 0.0);
        assert!(timing.sys >= 0.0);
    }

    #[cfg(unix)]
    #[test]
    fn test_children_counter_is_monotonic() {
        let before = CpuTimes::children();
        std::process::Command::new("/bin/sh")
            .args(["-c", "i=0; while [ $i -lt 20000 ]; do i=$((i+1)); done"])
            .status()
            .unwrap();
        let after = CpuTimes::children();
        assert!(after.user + after.sys >= before.user + before.sys);
    }
}
