//! Single-writer job execution.
//!
//! Producers on any thread hand work to a [`JobSerializer`]; one owner
//! context drains it with [`JobSerializer::flush`], so the state the jobs
//! mutate is only ever touched from that context.
//!
//! - [`Job`]: boxed closure over the owner's state
//! - [`JobTimer`]: jobs held until a due [`Tick`]
//! - [`JobSerializer`]: FIFO of immediate jobs plus an embedded timer
//! - [`Clock`]: tick source ([`SystemClock`] or [`ManualClock`])

pub mod clock;
pub mod job;
pub mod serializer;
pub mod timer;

pub use clock::{Clock, ManualClock, SystemClock, Tick};
pub use job::{Job, ScheduledJob};
pub use serializer::{FlushStats, JobSerializer};
pub use timer::JobTimer;
