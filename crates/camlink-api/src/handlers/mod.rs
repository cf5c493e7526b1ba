//! HTTP handlers for the viewer: live video, stats, and cursor control.

pub mod direction;
pub mod page;
pub mod status;
pub mod video;

use tokio::sync::watch;

use camlink_services::{CommandClient, CoordinateStore, LatestFrame};

#[derive(Clone)]
pub struct ApiState {
    /// Most recent good frame from the receive loop.
    pub latest: watch::Receiver<Option<LatestFrame>>,
    /// Viewer-side copy of the producer's cursor, refreshed by sync and by
    /// every forwarded direction.
    pub coords: CoordinateStore,
    /// Command channel to the producer.
    pub client: CommandClient,
}
