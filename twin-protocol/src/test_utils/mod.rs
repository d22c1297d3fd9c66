//! In-memory implementations for testing.
//!
//! Available behind the `test-utils` feature flag. These are minimal
//! implementations of every seam so engine tests need no real transport.

mod channel_endpoint;
mod demo_kind;
mod filters;
mod recording_publisher;

pub use channel_endpoint::{ChannelEndpoint, FailingEndpoint};
pub use demo_kind::DemoKind;
pub use filters::{AllowList, ByKind, ContentTwins, FailingEncoder, FixedTwins};
pub use recording_publisher::RecordingPublisher;
