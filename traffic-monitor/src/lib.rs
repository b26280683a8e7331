// traffic-monitor/src/lib.rs
pub mod actors;
pub mod aggregator;
pub mod error;
pub mod fetcher;
pub mod pagination;
pub mod reconciler;
pub mod registry;
pub mod state;
pub mod subscriber;
pub mod transport;

pub use actors::monitor_actor::TrafficMonitor;
pub use actors::session_actor::SessionActor;
pub use aggregator::{aggregate_by_ip, IpAggregate};
pub use error::{AuthError, ChannelError, FetchError, MonitorError};
pub use fetcher::{HttpPageFetcher, Page, PageFetcher};
pub use reconciler::LogSet;
pub use registry::ChannelRegistry;
pub use state::{DisplayMode, MonitorState, MonitorStatus, TrafficView};
pub use subscriber::{FeedEvent, FeedSubscriber, Subscription};
pub use transport::ConnectionStatus;
