use embassy_time::Instant;
use embedded_hal_async::delay::DelayNs;

use crate::config::{SUSPEND_COOLDOWN_MS, SUSPEND_SETTLE_MS};
use crate::hal::{Clock, SuspendBackend, SuspendOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SuspendResult {
    Entered,
    Skipped,
}

/// Decides when the CPU may be suspended and runs the suspend sequence.
///
/// While the power key is held down the CPU would go back to sleep right after
/// each wakeup and only see the key again once it is released, so a long
/// press could never be recognized. Suspend is therefore held off for a
/// cool-down after every attempt and after the screen is turned off.
#[derive(Debug)]
pub struct SuspendScheduler {
    system_suspend: bool,
    cooldown_since: Option<Instant>,
}

impl SuspendScheduler {
    pub const fn new(system_suspend: bool) -> Self {
        Self {
            system_suspend,
            cooldown_since: None,
        }
    }

    pub fn start_cooldown(&mut self, now: Instant) {
        self.cooldown_since = Some(now);
    }

    pub fn cooling_down(&self, now: Instant) -> bool {
        self.cooldown_since.is_some_and(|since| {
            now.checked_duration_since(since)
                .is_none_or(|elapsed| elapsed.as_millis() <= SUSPEND_COOLDOWN_MS)
        })
    }

    pub async fn maybe_suspend<B, C, D>(
        &mut self,
        backend: &mut B,
        clock: &C,
        delay: &mut D,
    ) -> SuspendResult
    where
        B: SuspendBackend,
        C: Clock,
        D: DelayNs,
    {
        if self.cooling_down(clock.now()) {
            return SuspendResult::Skipped;
        }

        if self.system_suspend && backend.supports_system_suspend() {
            if system_suspend(backend).await == SuspendOutcome::Denied {
                debug!("System suspend denied, falling back to wfi");
                wait_for_interrupt(backend).await;
            }
        } else {
            wait_for_interrupt(backend).await;
        }

        self.cooldown_since = Some(clock.now());

        // A key released while suspended needs time to settle before the
        // next poll.
        delay.delay_ms(SUSPEND_SETTLE_MS).await;

        SuspendResult::Entered
    }
}

async fn system_suspend<B: SuspendBackend>(backend: &mut B) -> SuspendOutcome {
    debug!("System suspend");
    backend.prepare_regulators().await;
    backend.disable_local_irq();
    backend.suspend_irqs();

    let outcome = match backend.suspend_devices().await {
        Ok(()) => backend.try_suspend().await,
        Err(e) => {
            warn!("Device suspend failed: {:?}", e);
            SuspendOutcome::Denied
        }
    };

    backend.resume_devices().await;
    backend.resume_irqs();
    backend.enable_local_irq();
    debug!("System resumed");
    outcome
}

async fn wait_for_interrupt<B: SuspendBackend>(backend: &mut B) {
    backend.suspend_irqs();
    trace!("Wfi");
    backend.wait_for_interrupt().await;
    backend.resume_irqs();
}

#[cfg(test)]
mod tests {
    use core::cell::Cell;
    use std::rc::Rc;
    use std::vec::Vec;

    use embassy_futures::block_on;

    use super::*;
    use crate::error::SuspendError;

    #[derive(Clone, Default)]
    struct TestClock(Rc<Cell<u64>>);

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            Instant::from_millis(self.0.get())
        }
    }

    impl DelayNs for TestClock {
        async fn delay_ns(&mut self, ns: u32) {
            self.0.set(self.0.get() + (ns as u64).div_ceil(1_000_000));
        }
    }

    #[derive(Default)]
    struct Recorder {
        supported: bool,
        deny: bool,
        fail_devices: bool,
        calls: Vec<&'static str>,
    }

    impl SuspendBackend for Recorder {
        fn supports_system_suspend(&self) -> bool {
            self.supported
        }
        fn disable_local_irq(&mut self) {
            self.calls.push("irq_off");
        }
        fn enable_local_irq(&mut self) {
            self.calls.push("irq_on");
        }
        fn suspend_irqs(&mut self) {
            self.calls.push("irqs_suspend");
        }
        fn resume_irqs(&mut self) {
            self.calls.push("irqs_resume");
        }
        async fn prepare_regulators(&mut self) {
            self.calls.push("regulators");
        }
        async fn suspend_devices(&mut self) -> Result<(), SuspendError> {
            self.calls.push("devices_suspend");
            if self.fail_devices {
                Err(SuspendError::Device)
            } else {
                Ok(())
            }
        }
        async fn resume_devices(&mut self) {
            self.calls.push("devices_resume");
        }
        async fn try_suspend(&mut self) -> SuspendOutcome {
            self.calls.push("suspend");
            if self.deny {
                SuspendOutcome::Denied
            } else {
                SuspendOutcome::Suspended
            }
        }
        async fn wait_for_interrupt(&mut self) {
            self.calls.push("wfi");
        }
        fn arm_auto_wake(&mut self, _interval_s: u32) {}
        fn disarm_auto_wake(&mut self) {}
    }

    #[test]
    fn second_attempt_within_cooldown_is_skipped() {
        let clock = TestClock::default();
        let mut delay = clock.clone();
        let mut backend = Recorder::default();
        let mut scheduler = SuspendScheduler::new(false);

        let first = block_on(scheduler.maybe_suspend(&mut backend, &clock, &mut delay));
        clock.0.set(clock.0.get() + 1000);
        let second = block_on(scheduler.maybe_suspend(&mut backend, &clock, &mut delay));

        assert_eq!(first, SuspendResult::Entered);
        assert_eq!(second, SuspendResult::Skipped);
        assert_eq!(backend.calls, ["irqs_suspend", "wfi", "irqs_resume"]);
    }

    #[test]
    fn attempt_after_cooldown_is_entered() {
        let clock = TestClock::default();
        let mut delay = clock.clone();
        let mut backend = Recorder::default();
        let mut scheduler = SuspendScheduler::new(false);

        block_on(scheduler.maybe_suspend(&mut backend, &clock, &mut delay));
        clock.0.set(clock.0.get() + SUSPEND_COOLDOWN_MS + 1);
        let second = block_on(scheduler.maybe_suspend(&mut backend, &clock, &mut delay));
        assert_eq!(second, SuspendResult::Entered);
    }

    #[test]
    fn screen_off_starts_cooldown() {
        let clock = TestClock::default();
        let mut delay = clock.clone();
        let mut backend = Recorder::default();
        let mut scheduler = SuspendScheduler::new(false);

        scheduler.start_cooldown(clock.now());
        clock.0.set(4999);
        assert_eq!(
            block_on(scheduler.maybe_suspend(&mut backend, &clock, &mut delay)),
            SuspendResult::Skipped
        );
        assert!(backend.calls.is_empty());
    }

    #[test]
    fn system_suspend_resumes_in_reverse_order() {
        let clock = TestClock::default();
        let mut delay = clock.clone();
        let mut backend = Recorder {
            supported: true,
            ..Default::default()
        };
        let mut scheduler = SuspendScheduler::new(true);

        block_on(scheduler.maybe_suspend(&mut backend, &clock, &mut delay));
        assert_eq!(
            backend.calls,
            [
                "regulators",
                "irq_off",
                "irqs_suspend",
                "devices_suspend",
                "suspend",
                "devices_resume",
                "irqs_resume",
                "irq_on",
            ]
        );
        // Settle delay after resume
        assert_eq!(clock.0.get(), SUSPEND_SETTLE_MS as u64);
    }

    #[test]
    fn denied_suspend_falls_back_to_wfi() {
        let clock = TestClock::default();
        let mut delay = clock.clone();
        let mut backend = Recorder {
            supported: true,
            deny: true,
            ..Default::default()
        };
        let mut scheduler = SuspendScheduler::new(true);

        let result = block_on(scheduler.maybe_suspend(&mut backend, &clock, &mut delay));
        assert_eq!(result, SuspendResult::Entered);
        assert_eq!(&backend.calls[backend.calls.len() - 3..], ["irqs_suspend", "wfi", "irqs_resume"]);
    }

    #[test]
    fn failed_device_suspend_still_resumes() {
        let clock = TestClock::default();
        let mut delay = clock.clone();
        let mut backend = Recorder {
            supported: true,
            fail_devices: true,
            ..Default::default()
        };
        let mut scheduler = SuspendScheduler::new(true);

        block_on(scheduler.maybe_suspend(&mut backend, &clock, &mut delay));
        assert!(!backend.calls.contains(&"suspend"));
        assert!(backend.calls.contains(&"devices_resume"));
        assert!(backend.calls.contains(&"irq_on"));
        assert!(backend.calls.contains(&"wfi"));
    }

    #[test]
    fn unsupported_backend_uses_wfi_even_when_enabled() {
        let clock = TestClock::default();
        let mut delay = clock.clone();
        let mut backend = Recorder::default();
        let mut scheduler = SuspendScheduler::new(true);

        block_on(scheduler.maybe_suspend(&mut backend, &clock, &mut delay));
        assert_eq!(backend.calls, ["irqs_suspend", "wfi", "irqs_resume"]);
    }
}
