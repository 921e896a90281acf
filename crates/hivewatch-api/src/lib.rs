// hivewatch-api: async clients for the hive sensor API and realtime event feed

pub mod client;
pub mod error;
pub mod feed;
pub mod models;
pub mod transport;

pub use client::HiveApiClient;
pub use error::Error;
pub use feed::{FeedClient, FeedHandle, ReconnectConfig};
pub use models::{FeedEvent, HiveRecord, SensorReading};
pub use transport::{TlsMode, TransportConfig};
