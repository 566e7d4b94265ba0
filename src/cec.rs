//! Software HDMI-CEC: a bit-banged CEC line driven by one edge capture
//! timer.

pub mod config;
pub mod debounce;
pub mod engine;
pub mod error;
pub mod frame;
pub mod offline;
pub mod port;
pub mod receive;
pub mod rx_queue;
pub mod service;
pub mod timing;
pub mod transfer;
pub mod transmit;

pub use config::CecConfig;
pub use engine::{CecEngine, CecState, Completion};
pub use error::{ConfigError, OfflineError, QueueError, SendError};
pub use frame::{CecFrame, LogicalAddress, Message, MAX_CEC_MSG_LEN};
pub use offline::{CecAction, OfflineHost, OfflinePolicy, DEFAULT_OFFLINE_POLICY};
pub use port::{CaptureEdge, CecPort, EdgeCapture, NO_TIMEOUT};
pub use rx_queue::{RxQueue, CEC_RX_BUFFER_SIZE};
pub use service::{CecHost, CecService, HostEvents, Notification};
