//! camlink-services. The moving parts of a camlink link: fragmentation and
//! reassembly of video frames, the coordinate command channel, and the loops
//! that drive them.

pub mod capture;
pub mod codec;
pub mod command_client;
pub mod command_server;
pub mod coordinates;
pub mod fragmenter;
pub mod reassembler;
pub mod receiver;
pub mod socket;
pub mod stats;

pub use capture::CaptureLoop;
pub use codec::{
    source_from_config, DecodeError, DecodedFrame, DirectorySource, FrameDecoder, FrameSource,
    JpegDecoder, SourceError, TestPatternSource,
};
pub use command_client::{ClientError, CommandClient};
pub use command_server::{handle_request, CommandServer};
pub use coordinates::{Applied, CoordinateStore, Coordinates};
pub use fragmenter::{
    fragment_frame, FragmentError, FramePlan, FrameSender, SendReport, TransportError,
};
pub use reassembler::{
    CompletedFrame, Reassembler, ReassemblerConfig, ReassemblerStats, ReassemblyError,
};
pub use receiver::{FrameReceiver, LatestFrame};
pub use stats::{FpsTracker, FrameStats, StatsSnapshot};
