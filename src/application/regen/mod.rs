//! Static-page regeneration cascade.
//!
//! Every mutation that can change a cached page computes a [`RegenPlan`],
//! publishes it to the in-process [`RegenQueue`], and returns without
//! waiting. A [`RegenWorker`] drains the queue in the background; tests
//! drain it synchronously instead of relying on timing.

mod plan;
mod queue;
mod worker;

pub use plan::RegenPlan;
pub use queue::{QUEUE_LEN_GAUGE, RegenQueue, RegenTask};
pub use worker::{REGEN_FAILURE_COUNTER, REGEN_SUCCESS_COUNTER, RegenWorker};
