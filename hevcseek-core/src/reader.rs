//! Random-access frame reader — components D and E, plus session lifecycle
//! (component G).
//!
//! A non-consuming `&mut self` close lets a caller invoke `read` again
//! after closing and observe a diagnostic [`Error::AlreadyClosed`] rather
//! than a compile error.

use std::path::{Path, PathBuf};

use ffmpeg::{decoder::Video as VideoDecoder, format::context::Input, format::Pixel, media::Type as MediaType};

use crate::{
    cache::GopCache,
    decode,
    error::{Error, Result},
    frame::Frame,
    index::VideoInfo,
};

/// Output pixel format a [`Reader`] should hand back, overriding whatever
/// autodetection (metadata hint, then native format) would otherwise pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Auto,
    Gray8,
    Rgb24,
}

/// Construction-time options for [`Reader::open`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ReaderOptions {
    pub output_format: OutputFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Open,
    Closed,
}

/// A frame-indexed random-access reader over one closed-GOP HEVC file.
///
/// Every `Reader` owns one decode-capable input context plus a single-GOP
/// cache; it is not `Send`/`Sync` and is meant to be used from one thread.
pub struct Reader {
    info:          VideoInfo,
    ictx:          Input,
    decoder:       VideoDecoder,
    scaler:        Option<ffmpeg::software::scaling::Context>,
    cache:         GopCache,
    output_is_gray: bool,
    state:         SessionState,
}

impl Reader {
    /// Builds the frame index (component A) and opens a decode session
    /// against `path`. Resolves the output pixel format once, up front:
    /// explicit option, then container metadata hint, then the stream's
    /// native format.
    #[tracing::instrument(level = "debug", skip(options), fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>, options: ReaderOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let info = VideoInfo::build(&path)?;

        let (ictx, decoder) = open_decode_session(&path, &info)?;

        let output_is_gray = match options.output_format {
            OutputFormat::Gray8 => true,
            OutputFormat::Rgb24 => false,
            OutputFormat::Auto => info.is_grayscale_hint.unwrap_or(info.native_is_gray),
        };

        Ok(Self {
            info,
            ictx,
            decoder,
            scaler: None,
            cache: GopCache::empty(),
            output_is_gray,
            state: SessionState::Open,
        })
    }

    /// Total frame count of the opened stream.
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.info.frame_count
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.info.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.info.height
    }

    #[must_use]
    pub fn is_gray(&self) -> bool {
        self.output_is_gray
    }

    /// `(numerator, denominator)` frame rate reported by the demuxer.
    #[must_use]
    pub fn frame_rate(&self) -> (i32, i32) {
        self.info.frame_rate
    }

    /// Stream duration in seconds, derived from `frame_count / frame_rate`.
    #[must_use]
    pub fn duration(&self) -> f64 {
        let (num, den) = self.info.frame_rate;
        self.info.frame_count as f64 * f64::from(den) / f64::from(num)
    }

    /// Reads a single zero-based frame. A cache hit is a pure memory copy;
    /// a miss decodes the whole containing GOP (component C) before
    /// copying out the requested frame.
    ///
    /// `index` is 1-based, `1 ≤ index ≤ frame_count()`, matching the
    /// external interface's indexing convention.
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.info.path.display(), index))]
    pub fn read(&mut self, index: usize) -> Result<Frame> {
        self.ensure_open()?;
        if index == 0 || index > self.info.frame_count {
            return Err(Error::InvalidIndex {
                index,
                frame_count: self.info.frame_count,
            });
        }
        self.read_zero_based(index - 1)
    }

    fn read_zero_based(&mut self, zero_index: usize) -> Result<Frame> {
        if !self.cache.contains(zero_index) {
            if let Err(err) = self.cache.populate(
                &mut self.ictx,
                &mut self.decoder,
                &self.info,
                &mut self.scaler,
                self.output_is_gray,
                zero_index,
            ) {
                self.cache.clear();
                return Err(err);
            }
        }

        Ok(self.cache.frame_at(zero_index))
    }

    /// Reads `[start, end]` inclusive with a single seek and one sustained
    /// decode pass. Deliberately bypasses the GOP cache: a range read's
    /// seek+drain already touches every frame in the range, so populating
    /// the cache mid-range buys nothing and would just add a second buffer
    /// the size of however many GOPs the range spans.
    ///
    /// `start`/`end` are 1-based and inclusive, `1 ≤ start ≤ end ≤ frame_count()`.
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.info.path.display(), start, end))]
    pub fn read_range(&mut self, start: usize, end: usize) -> Result<Vec<Frame>> {
        self.ensure_open()?;
        if start == 0 || start > end || end > self.info.frame_count {
            return Err(Error::InvalidRange {
                start,
                end,
                frame_count: self.info.frame_count,
            });
        }

        let zero_start = start - 1;
        let zero_end = end;
        let count = zero_end - zero_start;

        let channels = if self.output_is_gray {
            1
        } else {
            3
        };
        let frame_size = self.info.width as usize * self.info.height as usize * channels;
        let target_format = if self.output_is_gray {
            Pixel::GRAY8
        } else {
            Pixel::RGB24
        };
        let target_dts = self.info.dts[zero_start];

        let mut buf = vec![0u8; count * frame_size];
        let result = decode::decode_range_into(
            &mut self.ictx,
            &mut self.decoder,
            self.info.video_stream_index,
            self.info.pts_increment,
            target_dts,
            zero_start..zero_end,
            &mut self.scaler,
            target_format,
            self.info.width,
            self.info.height,
            &mut buf,
            frame_size,
            &self.info,
        );

        // The range reader must still issue the final decoder flush, same
        // as the cache's populate step.
        self.decoder.flush();

        if result.is_err() {
            self.cache.clear();
        }
        result?;

        Ok((0..count)
            .map(|i| {
                let s = i * frame_size;
                Frame::new(self.output_is_gray, self.info.width, self.info.height, buf[s..s + frame_size].to_vec())
            })
            .collect())
    }

    /// Releases the decode session early. Idempotent: a second call is a
    /// no-op rather than an error. Any `read`/`read_range` call after close
    /// returns [`Error::AlreadyClosed`].
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.cache.clear();
        self.state = SessionState::Closed;
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(Error::AlreadyClosed {
                path: self.info.path.clone(),
            });
        }
        Ok(())
    }
}

impl Drop for Reader {
    fn drop(&mut self) {
        self.close();
    }
}

/// Opens `path` a second time for decode (the index-building pass in
/// [`VideoInfo::build`] already closed its own handle) and constructs a
/// software decoder for the video stream.
fn open_decode_session(path: &PathBuf, info: &VideoInfo) -> Result<(Input, VideoDecoder)> {
    let mut ictx = ffmpeg::format::input(path).map_err(|source| Error::OpenFailed {
        path: path.clone(),
        source,
    })?;

    let video_stream_index = ictx
        .streams()
        .best(MediaType::Video)
        .ok_or_else(|| Error::NoVideoStream {
            path: path.clone(),
        })?
        .index();
    debug_assert_eq!(video_stream_index, info.video_stream_index);

    let params = ictx.stream(video_stream_index).expect("stream present").parameters();
    let decoder_ctx = ffmpeg::codec::context::Context::from_parameters(params).map_err(|source| {
        Error::StreamInfoFailed {
            path: path.clone(),
            source,
        }
    })?;
    let decoder = decoder_ctx.decoder().video().map_err(|source| Error::StreamInfoFailed {
        path: path.clone(),
        source,
    })?;

    Ok((ictx, decoder))
}
