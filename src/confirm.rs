//! Hold-to-confirm gesture timer.
//!
//! A screen arms the timer on press of its confirm button, polls
//! [`ConfirmHold::progress`] every tick and clears it on early release.
//! Reaching progress 1.0 must perform the bound action exactly once and
//! clear the timer immediately so it cannot re-trigger.

use std::time::{Duration, Instant};

use crate::context::Context;

/// Graded confirmation of a sustained button hold. An absent deadline
/// means the timer is not running.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfirmHold {
    deadline: Option<Instant>,
    duration: Duration,
}

impl ConfirmHold {
    /// Arm the timer to complete after `duration`.
    pub fn start(&mut self, ctx: &Context, duration: Duration) {
        self.deadline = Some(ctx.now() + duration);
        self.duration = duration;
    }

    /// Disarm without completing.
    pub fn clear(&mut self) {
        *self = ConfirmHold::default();
    }

    pub fn running(&self) -> bool {
        self.deadline.is_some()
    }

    /// 0.0 when idle, 1.0 at or past the deadline, linear in between.
    ///
    /// While running this schedules an immediate wakeup so the owning
    /// screen observes completion promptly instead of waiting for the next
    /// unrelated frame.
    pub fn progress(&self, ctx: &Context) -> f32 {
        let Some(deadline) = self.deadline else {
            return 0.0;
        };
        let now = ctx.now();
        if now >= deadline {
            return 1.0;
        }
        ctx.wakeup_after(Duration::ZERO);
        let remaining = deadline - now;
        1.0 - remaining.as_secs_f32() / self.duration.as_secs_f32()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::context::Wakeup;
    use crate::testing::TestPlatform;
    use std::sync::Arc;

    fn ctx() -> (Context, Arc<TestPlatform>) {
        let platform = Arc::new(TestPlatform::new());
        let (wakeup, _rx) = Wakeup::channel();
        let ctx = Context::new(platform.clone(), &Config::default(), wakeup);
        (ctx, platform)
    }

    #[test]
    fn idle_timer_reports_zero() {
        let (ctx, _) = ctx();
        let hold = ConfirmHold::default();
        assert!(!hold.running());
        assert_eq!(hold.progress(&ctx), 0.0);
    }

    #[test]
    fn early_release_resets_to_zero() {
        let (ctx, platform) = ctx();
        let mut hold = ConfirmHold::default();
        hold.start(&ctx, Duration::from_millis(1000));
        platform.advance(Duration::from_millis(900));
        assert!(hold.progress(&ctx) < 1.0);
        hold.clear();
        assert!(!hold.running());
        assert_eq!(hold.progress(&ctx), 0.0);
    }

    #[test]
    fn completes_exactly_at_deadline() {
        let (ctx, platform) = ctx();
        let mut hold = ConfirmHold::default();
        hold.start(&ctx, Duration::from_millis(1000));
        platform.advance(Duration::from_millis(1000));
        assert_eq!(hold.progress(&ctx), 1.0);
    }

    #[test]
    fn progress_is_monotonic_while_held() {
        let (ctx, platform) = ctx();
        let mut hold = ConfirmHold::default();
        hold.start(&ctx, Duration::from_millis(1000));
        let mut last = 0.0;
        for _ in 0..4 {
            platform.advance(Duration::from_millis(200));
            let p = hold.progress(&ctx);
            assert!(p >= last);
            last = p;
        }
        platform.advance(Duration::from_millis(200));
        assert_eq!(hold.progress(&ctx), 1.0);
    }
}
