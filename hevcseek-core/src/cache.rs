//! GOP frame cache — component C.
//!
//! Single-slot store: any miss replaces the current contents outright. A
//! more general LRU is deliberately not implemented: every observed access
//! pattern — batch, walk, sequential — is covered by residency in one GOP.

use ffmpeg::{decoder::Video as VideoDecoder, format::context::Input, format::Pixel};

use crate::{
    decode,
    error::Result,
    frame::Frame,
    index::VideoInfo,
};

/// The decoded-frame block for whichever GOP was last populated, plus the
/// bookkeeping needed to answer hit-tests in O(1).
pub(crate) struct GopCache {
    data:         Vec<u8>,
    /// Zero-based index of the first frame in `data`, or `-1` when empty.
    start_frame:  i64,
    num_frames:   usize,
    width:        u32,
    height:       u32,
    is_grayscale: bool,
    frame_size:   usize,
}

impl GopCache {
    pub(crate) fn empty() -> Self {
        Self {
            data:         Vec::new(),
            start_frame:  -1,
            num_frames:   0,
            width:        0,
            height:       0,
            is_grayscale: true,
            frame_size:   0,
        }
    }

    /// O(1) hit test: is zero-based `index` already decoded and resident?
    pub(crate) fn contains(&self, index: usize) -> bool {
        self.start_frame >= 0
            && (index as i64) >= self.start_frame
            && (index as i64) < self.start_frame + self.num_frames as i64
    }

    /// Copies one frame's worth of bytes out of the cache. Panics if
    /// `index` is not resident — callers must check [`Self::contains`] (or
    /// call [`Self::populate`]) first.
    pub(crate) fn frame_at(&self, index: usize) -> Frame {
        debug_assert!(self.contains(index), "frame_at called on a non-resident index");
        let local = index - self.start_frame as usize;
        let start = local * self.frame_size;
        let bytes = self.data[start..start + self.frame_size].to_vec();
        Frame::new(self.is_grayscale, self.width, self.height, bytes)
    }

    /// Drops cached contents. Called on session close and on any error path
    /// in `populate` so a failed read never leaves a half-built cache
    /// visible to a later call.
    pub(crate) fn clear(&mut self) {
        self.data.clear();
        self.start_frame = -1;
        self.num_frames = 0;
    }

    /// On miss, decodes the full GOP containing `target_index` and replaces
    /// the cache's contents atomically — the cache is left untouched if
    /// decoding fails partway through.
    #[tracing::instrument(level = "debug", skip_all, fields(target_index))]
    pub(crate) fn populate(
        &mut self,
        ictx: &mut Input,
        decoder: &mut VideoDecoder,
        info: &VideoInfo,
        scaler: &mut Option<ffmpeg::software::scaling::Context>,
        output_is_gray: bool,
        target_index: usize,
    ) -> Result<()> {
        let gop_start = info.gop_start_for(target_index);
        let gop_end = info.gop_end_for(gop_start);
        let target_dts = info.dts[gop_start];

        let channels = if output_is_gray {
            1
        } else {
            3
        };
        let frame_size = info.width as usize * info.height as usize * channels;
        let mut buf = vec![0u8; (gop_end - gop_start) * frame_size];

        let target_format = if output_is_gray {
            Pixel::GRAY8
        } else {
            Pixel::RGB24
        };

        let result = decode::decode_range_into(
            ictx,
            decoder,
            info.video_stream_index,
            info.pts_increment,
            target_dts,
            gop_start..gop_end,
            scaler,
            target_format,
            info.width,
            info.height,
            &mut buf,
            frame_size,
            info,
        );

        // Always issue the final decoder-buffer flush, whether or not the
        // populate succeeded.
        decoder.flush();

        result?;

        self.data = buf;
        self.start_frame = gop_start as i64;
        self.num_frames = gop_end - gop_start;
        self.width = info.width;
        self.height = info.height;
        self.is_grayscale = output_is_gray;
        self.frame_size = frame_size;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_cache_contains_nothing() {
        let cache = GopCache::empty();
        assert!(!cache.contains(0));
    }

    #[test]
    fn hit_test_respects_window() {
        let mut cache = GopCache::empty();
        cache.start_frame = 10;
        cache.num_frames = 5;
        cache.width = 2;
        cache.height = 2;
        cache.frame_size = 4;
        cache.data = vec![0u8; 5 * 4];
        assert!(!cache.contains(9));
        assert!(cache.contains(10));
        assert!(cache.contains(14));
        assert!(!cache.contains(15));
    }

    #[test]
    fn clear_resets_to_empty() {
        let mut cache = GopCache::empty();
        cache.start_frame = 3;
        cache.num_frames = 2;
        cache.clear();
        assert!(!cache.contains(3));
    }
}
