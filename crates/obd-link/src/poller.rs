//! Polling loop
//!
//! Fast plans go out every cycle, slow plans every `slow_every`th cycle.
//! Decoded samples land in the value store in request order. A partial decode
//! keeps its prefix and is only logged; a transport error ends the loop and is
//! handed back to the supervisor.

use std::sync::Arc;
use std::time::Duration;

use obd_conv::{decode, BatchPlan, BudgetWarning};
use obd_core::ValueStore;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::client::ElmLink;
use crate::config::TimingConfig;
use crate::error::{LinkError, LinkResult};

/// Fast and slow batch plans, swapped as a unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollPlans {
    pub fast: Vec<BatchPlan>,
    pub slow: Vec<BatchPlan>,
}

impl PollPlans {
    pub fn new(fast: Vec<BatchPlan>, slow: Vec<BatchPlan>) -> Self {
        Self { fast, slow }
    }

    pub fn is_empty(&self) -> bool {
        self.fast.is_empty() && self.slow.is_empty()
    }

    /// Budget advisories for every oversized plan
    pub fn warnings(&self) -> Vec<BudgetWarning> {
        self.fast
            .iter()
            .chain(&self.slow)
            .filter_map(BatchPlan::budget_warning)
            .collect()
    }

    /// Plans due on `cycle`
    pub fn for_cycle(&self, cycle: u64, slow_every: u32) -> impl Iterator<Item = &BatchPlan> {
        let slow_due = cycle % u64::from(slow_every.max(1)) == 0;
        self.fast
            .iter()
            .chain(self.slow.iter().filter(move |_| slow_due))
    }
}

/// Outcome of one polling cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub batches: usize,
    pub requested: usize,
    pub updated: usize,
}

pub struct Poller {
    plans: RwLock<Arc<PollPlans>>,
    store: Arc<ValueStore>,
    slow_every: u32,
    cycle_delay: Duration,
}

impl Poller {
    pub fn new(plans: PollPlans, store: Arc<ValueStore>, timing: &TimingConfig) -> Self {
        Self::with_cadence(plans, store, timing.slow_every, timing.cycle_delay())
    }

    pub fn with_cadence(
        plans: PollPlans,
        store: Arc<ValueStore>,
        slow_every: u32,
        cycle_delay: Duration,
    ) -> Self {
        log_warnings(&plans);
        Self {
            plans: RwLock::new(Arc::new(plans)),
            store,
            slow_every: slow_every.max(1),
            cycle_delay,
        }
    }

    pub fn store(&self) -> &Arc<ValueStore> {
        &self.store
    }

    /// Plans the next cycle will use
    pub fn plans(&self) -> Arc<PollPlans> {
        self.plans.read().clone()
    }

    /// Replace the plans; takes effect at the next cycle boundary
    pub fn swap_plans(&self, plans: PollPlans) {
        log_warnings(&plans);
        *self.plans.write() = Arc::new(plans);
        debug!("Batch plans swapped");
    }

    /// Send one batch, decode its reply and apply it
    ///
    /// Returns how many channels were updated. `on_sent` fires once the
    /// request is on the wire.
    pub async fn poll_batch<F>(
        &self,
        link: &mut ElmLink,
        plan: &BatchPlan,
        on_sent: &mut F,
    ) -> LinkResult<usize>
    where
        F: FnMut() + Send,
    {
        link.send(plan.request()).await?;
        on_sent();
        let reply = link.receive_until_prompt().await?;

        match decode(&reply, plan.channels()) {
            Ok(samples) => Ok(self.store.apply_samples(&samples)),
            Err(partial) => {
                let updated = self.store.apply_samples(&partial.decoded);
                warn!(
                    request = plan.request(),
                    updated,
                    requested = partial.requested,
                    reason = %partial.reason,
                    "Partial batch decode"
                );
                Ok(updated)
            }
        }
    }

    /// Run every plan due on `cycle` against one plans snapshot
    pub async fn run_cycle<F>(
        &self,
        link: &mut ElmLink,
        cycle: u64,
        on_sent: &mut F,
    ) -> LinkResult<CycleReport>
    where
        F: FnMut() + Send,
    {
        let plans = self.plans();
        let mut report = CycleReport::default();
        for plan in plans.for_cycle(cycle, self.slow_every) {
            report.updated += self.poll_batch(link, plan, on_sent).await?;
            report.requested += plan.len();
            report.batches += 1;
        }
        Ok(report)
    }

    /// Poll until the link fails, returning the error that stopped it
    pub async fn run<F>(&self, link: &mut ElmLink, mut on_sent: F) -> LinkError
    where
        F: FnMut() + Send,
    {
        let mut cycle: u64 = 0;
        loop {
            match self.run_cycle(link, cycle, &mut on_sent).await {
                Ok(report) => {
                    if report.updated < report.requested {
                        debug!(cycle, ?report, "Cycle incomplete");
                    }
                }
                Err(e) => return e,
            }
            cycle = cycle.wrapping_add(1);
            if !self.cycle_delay.is_zero() {
                tokio::time::sleep(self.cycle_delay).await;
            }
        }
    }
}

fn log_warnings(plans: &PollPlans) {
    for warning in plans.warnings() {
        warn!(budget = warning.budget, limit = warning.limit, "{}", warning);
    }
}
