//! GET /video_feed: multipart MJPEG built from the latest received frame.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use bytes::{BufMut, Bytes, BytesMut};
use tokio::sync::watch;

use camlink_services::LatestFrame;

use super::ApiState;

/// Minimum gap between parts, capping the stream at about 30 fps.
const MIN_PART_GAP: Duration = Duration::from_millis(33);

pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

pub async fn handle_video_feed(State(state): State<ApiState>) -> Response {
    tracing::info!("video stream client connected");
    let parts = futures::stream::unfold((state.latest, None), next_part);
    ([(header::CONTENT_TYPE, CONTENT_TYPE)], Body::from_stream(parts)).into_response()
}

type FeedState = (watch::Receiver<Option<LatestFrame>>, Option<u64>);

/// Wait for a frame newer than the last one sent and wrap it as a part.
/// Ends when the receive loop goes away.
async fn next_part(
    (mut latest, last_sent): FeedState,
) -> Option<(Result<Bytes, Infallible>, FeedState)> {
    if last_sent.is_some() {
        tokio::time::sleep(MIN_PART_GAP).await;
    }
    loop {
        let fresh = latest
            .borrow_and_update()
            .as_ref()
            .filter(|frame| Some(frame.counter) != last_sent)
            .map(|frame| (frame.counter, frame.data.clone()));

        if let Some((counter, data)) = fresh {
            return Some((Ok(multipart_part(&data)), (latest, Some(counter))));
        }
        if latest.changed().await.is_err() {
            return None;
        }
    }
}

/// One `--frame` part carrying a JPEG.
pub fn multipart_part(jpeg: &[u8]) -> Bytes {
    const HEAD: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";
    let mut part = BytesMut::with_capacity(HEAD.len() + jpeg.len() + 2);
    part.put_slice(HEAD);
    part.put_slice(jpeg);
    part.put_slice(b"\r\n");
    part.freeze()
}
