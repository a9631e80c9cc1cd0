//! Human-like interaction between pagination steps.
//!
//! Movements are planned up front from a bounded random distribution, then
//! replayed against the page. Every pause is cancellable.

use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::ScrapeError;
use crate::fetch::PageHandle;

const MAX_SCROLLS: usize = 4;
const SCROLL_DY: (i64, i64) = (-150, 650);
const SCROLL_PAUSE_MS: (u64, u64) = (120, 650);
const POINTER_STEPS: (usize, usize) = (12, 28);
const POINTER_PAUSE_MS: (u64, u64) = (8, 25);

#[derive(Debug, Clone, PartialEq)]
pub struct ScrollStep {
    pub dy: i64,
    pub pause: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PointerStep {
    pub x: f64,
    pub y: f64,
    pub pause: Duration,
}

/// One burst of simulated activity.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionPlan {
    pub pointer: Vec<PointerStep>,
    pub scrolls: Vec<ScrollStep>,
}

impl InteractionPlan {
    /// Upper bound on the time the plan spends pausing.
    pub fn total_pause(&self) -> Duration {
        self.pointer
            .iter()
            .map(|p| p.pause)
            .chain(self.scrolls.iter().map(|s| s.pause))
            .sum()
    }
}

/// Points along a cubic Bezier curve from `from` to `to` with randomized
/// control points, so the pointer never travels in a straight line.
pub fn bezier_path<R: Rng + ?Sized>(
    from: (f64, f64),
    to: (f64, f64),
    steps: usize,
    rng: &mut R,
) -> Vec<(f64, f64)> {
    let steps = steps.max(2);
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let spread = (dx.abs() + dy.abs()).max(40.0) * 0.35;
    let c1 = (
        from.0 + dx * 0.3 + rng.gen_range(-spread..=spread),
        from.1 + dy * 0.3 + rng.gen_range(-spread..=spread),
    );
    let c2 = (
        from.0 + dx * 0.7 + rng.gen_range(-spread..=spread),
        from.1 + dy * 0.7 + rng.gen_range(-spread..=spread),
    );

    (0..steps)
        .map(|i| {
            let t = i as f64 / (steps - 1) as f64;
            let u = 1.0 - t;
            let x = u * u * u * from.0
                + 3.0 * u * u * t * c1.0
                + 3.0 * u * t * t * c2.0
                + t * t * t * to.0;
            let y = u * u * u * from.1
                + 3.0 * u * u * t * c1.1
                + 3.0 * u * t * t * c2.1
                + t * t * t * to.1;
            (x, y)
        })
        .collect()
}

/// Plans and replays bounded-random scroll and pointer activity.
#[derive(Debug, Clone)]
pub struct Humanizer {
    enabled: bool,
}

impl Humanizer {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn disabled() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn plan<R: Rng + ?Sized>(&self, viewport: (u32, u32), rng: &mut R) -> InteractionPlan {
        let (w, h) = (viewport.0.max(200) as f64, viewport.1.max(200) as f64);
        let clamp = |p: (f64, f64)| (p.0.clamp(0.0, w - 1.0), p.1.clamp(0.0, h - 1.0));

        let from = (rng.gen_range(0.1..0.9) * w, rng.gen_range(0.1..0.9) * h);
        let to = (rng.gen_range(0.1..0.9) * w, rng.gen_range(0.1..0.9) * h);
        let steps = rng.gen_range(POINTER_STEPS.0..=POINTER_STEPS.1);
        let pointer = bezier_path(from, to, steps, rng)
            .into_iter()
            .map(clamp)
            .map(|(x, y)| PointerStep {
                x,
                y,
                pause: Duration::from_millis(rng.gen_range(POINTER_PAUSE_MS.0..=POINTER_PAUSE_MS.1)),
            })
            .collect();

        let scroll_count = rng.gen_range(1..=MAX_SCROLLS);
        let scrolls = (0..scroll_count)
            .map(|_| ScrollStep {
                dy: rng.gen_range(SCROLL_DY.0..=SCROLL_DY.1),
                pause: Duration::from_millis(rng.gen_range(SCROLL_PAUSE_MS.0..=SCROLL_PAUSE_MS.1)),
            })
            .collect();

        InteractionPlan { pointer, scrolls }
    }

    /// Replay one plan on the page.
    ///
    /// Interaction failures are logged and swallowed; only cancellation is
    /// reported back, also when there is nothing to replay.
    pub async fn perform(
        &self,
        page: &mut dyn PageHandle,
        cancel: &CancellationToken,
    ) -> Result<(), ScrapeError> {
        if cancel.is_cancelled() {
            return Err(ScrapeError::Cancelled);
        }
        if !self.enabled || !page.supports_interaction() {
            return Ok(());
        }
        let plan = {
            let mut rng = rand::thread_rng();
            self.plan(page.viewport(), &mut rng)
        };
        self.replay(page, &plan, cancel).await
    }

    pub async fn replay(
        &self,
        page: &mut dyn PageHandle,
        plan: &InteractionPlan,
        cancel: &CancellationToken,
    ) -> Result<(), ScrapeError> {
        for step in &plan.pointer {
            if let Err(e) = page.move_pointer(step.x, step.y).await {
                debug!("Pointer simulation stopped: {}", e);
                break;
            }
            pause(step.pause, cancel).await?;
        }
        for step in &plan.scrolls {
            if let Err(e) = page.scroll_by(step.dy).await {
                debug!("Scroll simulation stopped: {}", e);
                break;
            }
            pause(step.pause, cancel).await?;
        }
        Ok(())
    }
}

/// Sleep unless cancelled first.
pub(crate) async fn pause(duration: Duration, cancel: &CancellationToken) -> Result<(), ScrapeError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(ScrapeError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
