// naari-api: Async client for LED strip controllers speaking the WLED JSON API
//
// One request, one device. Fan-out, scheduling and device identity live in
// `naari-core`; this crate only knows how to talk to a single address and
// how to retry a single logical request.

pub mod client;
pub mod error;
pub mod models;
pub mod retry;
pub mod transport;

pub use client::{DeviceClient, PRESETS_PATH, STATE_PATH, STATUS_PATH};
pub use error::Error;
pub use models::{StatePatch, StatusFields, UdpNotify};
pub use retry::{RetryPolicy, with_retry};
pub use transport::TransportConfig;
