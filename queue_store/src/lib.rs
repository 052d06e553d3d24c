//! Message queues with visibility timeouts and pop receipts.
//!
//! [`QueueBackend`] is the seam the queue services call into.
//! [`InMemoryQueueStore`] implements it in-process: messages become
//! invisible for a visibility timeout when received, every delivery carries
//! a fresh pop receipt that must be presented to delete the message or
//! change its visibility, and messages expire after their time-to-live.

mod config;
mod error;
mod memory;
mod traits;

pub use config::QueueStoreConfig;
pub use error::{QueueError, QueueResult};
pub use memory::InMemoryQueueStore;
pub use traits::{
    PeekedMessage,
    QueueBackend,
    ReceivedMessage,
    SendReceipt,
    MAX_BATCH_SIZE,
    MAX_MESSAGE_SIZE,
};
