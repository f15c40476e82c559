use thiserror::Error;

use alerter_adapters::AdapterError;
use alerter_bus::BusError;
use alerter_scheduler::SchedulerError;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Bus(#[from] BusError),
}
