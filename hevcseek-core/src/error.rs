use std::path::PathBuf;

/// Result alias returned by every fallible `hevcseek-core` entry point.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error taxonomy for the reader and writer pipelines.
///
/// Every variant carries the numeric context (indices, PTS values, NAL type
/// names, observed DTS ranges) needed to diagnose the failure without
/// re-running the operation.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("could not open '{path}': {source}")]
    OpenFailed {
        path:   PathBuf,
        #[source]
        source: ffmpeg::Error,
    },

    #[error("could not read stream info for '{path}': {source}")]
    StreamInfoFailed {
        path:   PathBuf,
        #[source]
        source: ffmpeg::Error,
    },

    #[error("no video stream found in '{path}'")]
    NoVideoStream { path: PathBuf },

    #[error("no decoder available for codec '{codec}' in '{path}'")]
    NoDecoder { path: PathBuf, codec: String },

    #[error(
        "only a hardware-accelerated decoder ('{decoder}') is available for '{path}'; hardware \
         decoding is refused because it has been observed to produce non-deterministic frame \
         contents across runs"
    )]
    HardwareDecoder { path: PathBuf, decoder: String },

    #[error(
        "frame rate {frame_rate_num}/{frame_rate_den} is incompatible with time base \
         {time_base_num}/{time_base_den}: pts_increment is not an integer"
    )]
    BadFrameRate {
        frame_rate_num: i32,
        frame_rate_den: i32,
        time_base_num:  i32,
        time_base_den:  i32,
    },

    #[error(
        "open-GOP NAL unit type {nal_type} ({nal_name}) found in '{path}'; only closed-GOP HEVC \
         is supported"
    )]
    OpenGop {
        path:     PathBuf,
        nal_type: u8,
        nal_name: &'static str,
    },

    #[error(
        "packet pts {pts} in '{path}' is not a multiple of pts_increment {pts_increment} (or \
         maps outside the file's frame range)"
    )]
    MisalignedPts {
        path:          PathBuf,
        pts:           i64,
        pts_increment: i64,
    },

    #[error("frame index {index} of {frame_count} has no pts mapping in '{path}'")]
    MissingPts {
        path:        PathBuf,
        index:       usize,
        frame_count: usize,
    },

    #[error("frame index {index} of {frame_count} has {count} pts mappings in '{path}'; expected exactly one")]
    DuplicatePts {
        path:        PathBuf,
        index:       usize,
        frame_count: usize,
        count:       usize,
    },

    #[error("'{path}' contains no frames")]
    NoFrames { path: PathBuf },

    #[error("frame index {index} out of range 1..={frame_count}")]
    InvalidIndex { index: usize, frame_count: usize },

    #[error("range {start}..={end} out of range 1..={frame_count}")]
    InvalidRange {
        start:       usize,
        end:         usize,
        frame_count: usize,
    },

    #[error("decode error{} in '{path}': {source}", index.map(|i| format!(" at frame {i}")).unwrap_or_default())]
    DecodeError {
        path:   PathBuf,
        index:  Option<usize>,
        #[source]
        source: ffmpeg::Error,
    },

    #[error(
        "frame not found: target pts {target_pts} in '{path}' ({packets_read} packets read, \
         observed dts range {dts_min:?}..={dts_max:?})"
    )]
    NotFound {
        path:         PathBuf,
        target_pts:   i64,
        packets_read: usize,
        dts_min:      Option<i64>,
        dts_max:      Option<i64>,
    },

    #[error("encode error in '{path}': {source}")]
    EncodeError {
        path:   PathBuf,
        #[source]
        source: ffmpeg::Error,
    },

    #[error("failed writing packet to '{path}': {source}")]
    WriteError {
        path:   PathBuf,
        #[source]
        source: ffmpeg::Error,
    },

    #[error("failed to write trailer for '{path}': {source}")]
    TrailerError {
        path:   PathBuf,
        #[source]
        source: ffmpeg::Error,
    },

    #[error("bad dimensions for '{path}': expected {expected_w}x{expected_h}, got {got_w}x{got_h}")]
    BadDimensions {
        path:       PathBuf,
        expected_w: u32,
        expected_h: u32,
        got_w:      u32,
        got_h:      u32,
    },

    #[error("bad pixel layout for '{path}': session is {expected}, frame is {got}")]
    BadDtype {
        path:     PathBuf,
        expected: &'static str,
        got:      &'static str,
    },

    #[error("operation attempted on a null/unopened session handle")]
    NullHandle,

    #[error("session for '{path}' is already closed")]
    AlreadyClosed { path: PathBuf },
}
