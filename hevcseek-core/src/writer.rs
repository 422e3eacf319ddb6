//! Closed-GOP HEVC writer pipeline — component F, plus its half of the
//! session lifecycle (component G).

use std::path::{Path, PathBuf};

use ffmpeg::{
    codec::{self, Id as CodecId},
    encoder,
    format::{self, context::Output, Pixel},
    software::scaling::{flag::Flags as ScaleFlags, Context as SwsContext},
    util::frame::video::Video as VideoFrame,
    Dictionary, Packet, Rational,
};

use crate::{
    error::{Error, Result},
    ffmpeg_support,
    frame::Frame,
};

/// Construction-time options for [`Writer::open`]. Defaults: grayscale
/// off, a 50-frame GOP, CRF 18.
#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    pub is_gray:  bool,
    pub gop_size: u32,
    pub crf:      u8,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            is_gray:  false,
            gop_size: 50,
            crf:      18,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Open,
    Writing,
    Flushed,
    Closed,
}

/// A sequential closed-GOP HEVC writer. Every written frame gets PTS `0, 1,
/// 2, …` in the encoder's `1/fps` time base; closing flushes the encoder
/// and writes the container trailer.
pub struct Writer {
    path:          PathBuf,
    octx:          Output,
    encoder:       encoder::video::Video,
    video_stream_index: usize,
    frame_tb:      Rational,
    ost_tb:        Rational,
    scaler:        Option<SwsContext>,
    width:         u32,
    height:        u32,
    is_gray:       bool,
    next_pts:      i64,
    state:         SessionState,
}

impl Writer {
    /// Opens `path` for write, constructs and opens the HEVC encoder with
    /// the mandatory `no-open-gop=1:keyint=<gop_size>:crf=<crf>` private
    /// option, and writes the container header.
    #[tracing::instrument(level = "debug", skip(options), fields(path = %path.as_ref().display(), width, height, fps))]
    pub fn open(path: impl AsRef<Path>, width: u32, height: u32, fps: u32, options: WriterOptions) -> Result<Self> {
        ffmpeg_support::ensure_ffmpeg_initialized();
        let path = path.as_ref().to_path_buf();

        let mut octx = format::output(&path).map_err(|source| Error::EncodeError {
            path: path.clone(),
            source,
        })?;

        let codec = encoder::find(CodecId::HEVC).ok_or_else(|| Error::NoDecoder {
            path:  path.clone(),
            codec: "HEVC".to_string(),
        })?;

        let mut ost = octx.add_stream(codec).map_err(|source| Error::EncodeError {
            path: path.clone(),
            source,
        })?;

        let frame_tb = Rational::new(1, fps as i32);

        let enc_ctx = codec::context::Context::new_with_codec(codec);
        let mut video_enc = enc_ctx.encoder().video().map_err(|source| Error::EncodeError {
            path: path.clone(),
            source,
        })?;

        video_enc.set_width(width);
        video_enc.set_height(height);
        video_enc.set_format(Pixel::YUV420P);
        video_enc.set_time_base(frame_tb);
        video_enc.set_frame_rate(Some(Rational::new(fps as i32, 1)));

        if octx
            .format()
            .flags()
            .contains(format::flag::Flags::GLOBAL_HEADER)
        {
            video_enc.set_flags(codec::Flags::GLOBAL_HEADER);
        }

        let mut x265_opts = Dictionary::new();
        x265_opts.set(
            "x265-params",
            &format!("no-open-gop=1:keyint={}:crf={}", options.gop_size, options.crf),
        );

        let encoder = video_enc.open_as_with(codec, x265_opts).map_err(|source| Error::EncodeError {
            path: path.clone(),
            source,
        })?;

        ost.set_time_base(frame_tb);
        ost.set_parameters(encoder.parameters());
        let video_stream_index = ost.index();

        let mut metadata = Dictionary::new();
        metadata.set("is_grayscale", if options.is_gray { "1" } else { "0" });
        octx.set_metadata(metadata);

        // The MP4/mov muxer silently drops unrecognized metadata keys unless
        // told to keep them.
        let mut mux_opts = Dictionary::new();
        mux_opts.set("movflags", "use_metadata_tags");

        octx.write_header_with(mux_opts).map_err(|source| Error::WriteError {
            path: path.clone(),
            source,
        })?;

        let ost_tb = octx.stream(video_stream_index).expect("stream just added").time_base();

        Ok(Self {
            path,
            octx,
            encoder,
            video_stream_index,
            frame_tb,
            ost_tb,
            scaler: None,
            width,
            height,
            is_gray: options.is_gray,
            next_pts: 0,
            state: SessionState::Open,
        })
    }

    #[must_use]
    pub fn frames_written(&self) -> i64 {
        self.next_pts
    }

    #[must_use]
    pub fn duration(&self) -> i64 {
        self.next_pts
    }

    /// Validates dimensions/pixel kind, converts to YUV420P, assigns the
    /// next PTS, encodes, and muxes every packet the encoder has ready.
    #[tracing::instrument(level = "debug", skip(self, frame), fields(path = %self.path.display()))]
    pub fn write(&mut self, frame: &Frame) -> Result<()> {
        self.ensure_writable()?;

        if frame.width() != self.width || frame.height() != self.height {
            return Err(Error::BadDimensions {
                path:      self.path.clone(),
                expected_w: self.width,
                expected_h: self.height,
                got_w:     frame.width(),
                got_h:     frame.height(),
            });
        }
        if frame.is_gray() != self.is_gray {
            return Err(Error::BadDtype {
                path:     self.path.clone(),
                expected: if self.is_gray { "gray8" } else { "rgb24" },
                got:      frame.kind_name(),
            });
        }

        let source_format = if self.is_gray {
            Pixel::GRAY8
        } else {
            Pixel::RGB24
        };
        let channels = ffmpeg_support::channels_for(source_format);

        let mut source = VideoFrame::new(source_format, self.width, self.height);
        let stride = source.stride(0);
        let row_bytes = self.width as usize * channels;
        {
            let dst = source.data_mut(0);
            for row in 0..self.height as usize {
                let src_start = row * row_bytes;
                dst[row * stride..row * stride + row_bytes]
                    .copy_from_slice(&frame.data()[src_start..src_start + row_bytes]);
            }
        }

        let sc = self.scaler.get_or_insert_with(|| {
            SwsContext::get(
                source_format,
                self.width,
                self.height,
                Pixel::YUV420P,
                self.width,
                self.height,
                ScaleFlags::BILINEAR,
            )
            .expect("create swscale context")
        });

        let mut converted = VideoFrame::empty();
        sc.run(&source, &mut converted).map_err(|source| Error::EncodeError {
            path: self.path.clone(),
            source,
        })?;
        converted.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder.send_frame(&converted).map_err(|source| Error::EncodeError {
            path: self.path.clone(),
            source,
        })?;
        self.state = SessionState::Writing;
        self.drain_packets()
    }

    /// Writes each of `frames` in order, as if `write` had been called on
    /// each individually.
    pub fn write_batch(&mut self, frames: &[Frame]) -> Result<()> {
        for frame in frames {
            self.write(frame)?;
        }
        Ok(())
    }

    fn drain_packets(&mut self) -> Result<()> {
        let mut packet = Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(self.video_stream_index);
            packet.rescale_ts(self.frame_tb, self.ost_tb);
            packet.write_interleaved(&mut self.octx).map_err(|source| Error::WriteError {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Flushes the encoder with a null frame, drains and muxes the
    /// remaining packets, and writes the container trailer. Idempotent: a
    /// second call is a no-op.
    #[tracing::instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    pub fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Ok(());
        }

        if self.state != SessionState::Flushed {
            let _ = self.encoder.send_eof();
            self.drain_packets()?;
            self.state = SessionState::Flushed;

            self.octx.write_trailer().map_err(|source| Error::TrailerError {
                path: self.path.clone(),
                source,
            })?;
        }

        self.state = SessionState::Closed;
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(Error::AlreadyClosed {
                path: self.path.clone(),
            });
        }
        Ok(())
    }
}

impl Drop for Writer {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            if let Err(error) = self.close() {
                tracing::warn!(path = %self.path.display(), %error, "writer drop-time flush failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support;

    #[test]
    fn write_rejects_wrong_dimensions() {
        let path = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap().into_temp_path();
        let mut writer = Writer::open(&path, 32, 24, 25, WriterOptions::default()).expect("open writer");
        let bad = test_support::synthetic_frame(16, 16, false, 0);
        let err = writer.write(&bad).unwrap_err();
        assert!(matches!(err, Error::BadDimensions { .. }));
        writer.close().expect("close writer");
    }

    #[test]
    fn write_rejects_wrong_pixel_kind() {
        let path = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap().into_temp_path();
        let mut writer = Writer::open(
            &path,
            32,
            24,
            25,
            WriterOptions {
                is_gray: true,
                ..WriterOptions::default()
            },
        )
        .expect("open writer");
        let bad = test_support::synthetic_frame(32, 24, false, 0);
        let err = writer.write(&bad).unwrap_err();
        assert!(matches!(err, Error::BadDtype { .. }));
        writer.close().expect("close writer");
    }

    #[test]
    fn close_is_idempotent() {
        let path = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap().into_temp_path();
        let mut writer = Writer::open(&path, 32, 24, 25, WriterOptions::default()).expect("open writer");
        writer.write(&test_support::synthetic_frame(32, 24, false, 0)).expect("write frame");
        writer.close().expect("first close");
        writer.close().expect("second close is a no-op");
    }

    #[test]
    fn write_after_close_reports_already_closed() {
        let path = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap().into_temp_path();
        let mut writer = Writer::open(&path, 32, 24, 25, WriterOptions::default()).expect("open writer");
        writer.close().expect("close writer");
        let err = writer.write(&test_support::synthetic_frame(32, 24, false, 0)).unwrap_err();
        assert!(matches!(err, Error::AlreadyClosed { .. }));
    }

    #[test]
    fn pts_is_monotonic_per_write() {
        let path = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap().into_temp_path();
        let mut writer = Writer::open(&path, 32, 24, 25, WriterOptions::default()).expect("open writer");
        for i in 0..5u64 {
            writer.write(&test_support::synthetic_frame(32, 24, false, i)).expect("write frame");
        }
        assert_eq!(writer.frames_written(), 5);
        writer.close().expect("close writer");
    }
}
