/// A single decoded or to-be-encoded image.
///
/// Rows are height, columns are width; RGB channels are stored interleaved as
/// R, G, B. Both variants are dense, row-major byte buffers — no stride
/// padding is ever exposed across the public API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Gray8 {
        width:  u32,
        height: u32,
        data:   Vec<u8>,
    },
    Rgb24 {
        width:  u32,
        height: u32,
        data:   Vec<u8>,
    },
}

impl Frame {
    /// Builds a frame from a dense row-major byte buffer, picking the
    /// variant from `is_gray`. Shared by the cache and the range reader so
    /// both copy-out paths construct `Frame`s the same way.
    pub(crate) fn new(is_gray: bool, width: u32, height: u32, data: Vec<u8>) -> Self {
        if is_gray {
            Self::Gray8 {
                width,
                height,
                data,
            }
        } else {
            Self::Rgb24 {
                width,
                height,
                data,
            }
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        match self {
            Self::Gray8 {
                width, ..
            }
            | Self::Rgb24 {
                width, ..
            } => *width,
        }
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        match self {
            Self::Gray8 {
                height, ..
            }
            | Self::Rgb24 {
                height, ..
            } => *height,
        }
    }

    #[must_use]
    pub fn is_gray(&self) -> bool {
        matches!(self, Self::Gray8 { .. })
    }

    #[must_use]
    pub fn channels(&self) -> usize {
        if self.is_gray() {
            1
        } else {
            3
        }
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        match self {
            Self::Gray8 {
                data, ..
            }
            | Self::Rgb24 {
                data, ..
            } => data,
        }
    }

    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        if self.is_gray() {
            "gray8"
        } else {
            "rgb24"
        }
    }
}
