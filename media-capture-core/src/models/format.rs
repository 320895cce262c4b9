use serde::{Deserialize, Serialize};

use super::error::CaptureError;

/// Container formats supported by the file sink. Only one for now; the
/// selector exists so the destination-file API has a stable shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    Avi,
}

impl ContainerFormat {
    pub fn extension(self) -> &'static str {
        match self {
            Self::Avi => "avi",
        }
    }
}

/// Negotiated video format of one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoFormat {
    pub frame_rate: f64,
    pub width: u32,
    pub height: u32,
}

/// Negotiated audio format of one endpoint.
///
/// `block_align` and `avg_bytes_per_sec` are derived from the other three
/// fields and recomputed whenever one of them changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub block_align: u16,
    pub avg_bytes_per_sec: u32,
}

impl AudioFormat {
    pub fn new(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        let mut fmt = Self {
            channels,
            sample_rate,
            bits_per_sample,
            block_align: 0,
            avg_bytes_per_sec: 0,
        };
        fmt.recompute_derived();
        fmt
    }

    /// Recompute the fields that depend on channel count, depth and rate.
    /// Values arrive here before any driver clamps them, so the products
    /// are computed widened and saturated rather than trusted to fit.
    pub fn recompute_derived(&mut self) {
        let align = u32::from(self.channels) * u32::from(self.bits_per_sample) / 8;
        self.block_align = align.min(u32::from(u16::MAX)) as u16;
        self.avg_bytes_per_sec = u32::from(self.block_align).saturating_mul(self.sample_rate);
    }
}

/// The format block negotiated on one endpoint: either a video block or a
/// wave-audio block. Unknown block types are rejected by drivers with
/// `UnsupportedCapability` before a `FormatBlock` is ever built.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatBlock {
    Video(VideoFormat),
    Audio(AudioFormat),
}

/// Named fields of a format block the negotiator can read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatField {
    FrameRate,
    FrameSize,
    ChannelCount,
    SampleRate,
    SampleDepth,
}

impl FormatField {
    fn name(self) -> &'static str {
        match self {
            Self::FrameRate => "frame rate",
            Self::FrameSize => "frame size",
            Self::ChannelCount => "channel count",
            Self::SampleRate => "sample rate",
            Self::SampleDepth => "sample depth",
        }
    }
}

/// Typed value of one format field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FormatValue {
    Rate(f64),
    Size { width: u32, height: u32 },
    Channels(u16),
    Hertz(u32),
    Bits(u16),
}

impl FormatValue {
    pub fn as_rate(self) -> Option<f64> {
        match self {
            Self::Rate(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_size(self) -> Option<(u32, u32)> {
        match self {
            Self::Size { width, height } => Some((width, height)),
            _ => None,
        }
    }

    pub fn as_channels(self) -> Option<u16> {
        match self {
            Self::Channels(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_hertz(self) -> Option<u32> {
        match self {
            Self::Hertz(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_bits(self) -> Option<u16> {
        match self {
            Self::Bits(b) => Some(b),
            _ => None,
        }
    }
}

impl FormatBlock {
    fn unsupported(field: FormatField) -> CaptureError {
        CaptureError::UnsupportedCapability(format!(
            "the {} field does not exist in this format block",
            field.name()
        ))
    }

    /// Read one field of the block.
    pub fn field(&self, field: FormatField) -> Result<FormatValue, CaptureError> {
        match (self, field) {
            (Self::Video(v), FormatField::FrameRate) => Ok(FormatValue::Rate(v.frame_rate)),
            (Self::Video(v), FormatField::FrameSize) => Ok(FormatValue::Size {
                width: v.width,
                height: v.height,
            }),
            (Self::Audio(a), FormatField::ChannelCount) => Ok(FormatValue::Channels(a.channels)),
            (Self::Audio(a), FormatField::SampleRate) => Ok(FormatValue::Hertz(a.sample_rate)),
            (Self::Audio(a), FormatField::SampleDepth) => Ok(FormatValue::Bits(a.bits_per_sample)),
            _ => Err(Self::unsupported(field)),
        }
    }

    /// Write one field of the block. Audio writes recompute the derived
    /// block-alignment and average-bytes-per-second fields before the block
    /// is committed to the device.
    pub fn set_field(&mut self, field: FormatField, value: FormatValue) -> Result<(), CaptureError> {
        match (&mut *self, field, value) {
            (Self::Video(v), FormatField::FrameRate, FormatValue::Rate(r)) => {
                v.frame_rate = r;
            }
            (Self::Video(v), FormatField::FrameSize, FormatValue::Size { width, height }) => {
                v.width = width;
                v.height = height;
            }
            (Self::Audio(a), FormatField::ChannelCount, FormatValue::Channels(c)) => {
                a.channels = c;
                a.recompute_derived();
            }
            (Self::Audio(a), FormatField::SampleRate, FormatValue::Hertz(h)) => {
                a.sample_rate = h;
                a.recompute_derived();
            }
            (Self::Audio(a), FormatField::SampleDepth, FormatValue::Bits(b)) => {
                a.bits_per_sample = b;
                a.recompute_derived();
            }
            _ => return Err(Self::unsupported(field)),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn audio_derived_fields_follow_writes() {
        let mut block = FormatBlock::Audio(AudioFormat::new(2, 44_100, 16));
        if let FormatBlock::Audio(a) = block {
            assert_eq!(a.block_align, 4);
            assert_eq!(a.avg_bytes_per_sec, 176_400);
        }

        block
            .set_field(FormatField::SampleDepth, FormatValue::Bits(8))
            .unwrap();
        if let FormatBlock::Audio(a) = block {
            assert_eq!(a.block_align, 2);
            assert_eq!(a.avg_bytes_per_sec, 88_200);
        } else {
            panic!("block changed kind");
        }
    }

    #[test]
    fn derived_fields_survive_out_of_range_writes() {
        // Unclamped requests pass through here before any driver sees
        // them; the derived products must not overflow the field types.
        let mut block = FormatBlock::Audio(AudioFormat::new(2, 44_100, 16));
        block
            .set_field(FormatField::ChannelCount, FormatValue::Channels(5_000))
            .unwrap();
        if let FormatBlock::Audio(a) = block {
            assert_eq!(a.block_align, 10_000);
            assert_eq!(a.avg_bytes_per_sec, 441_000_000);
        } else {
            panic!("block changed kind");
        }

        let extreme = AudioFormat::new(u16::MAX, u32::MAX, 16);
        assert_eq!(extreme.block_align, u16::MAX);
        assert_eq!(extreme.avg_bytes_per_sec, u32::MAX);
    }

    #[test]
    fn video_fields_round_trip() {
        let mut block = FormatBlock::Video(VideoFormat {
            frame_rate: 25.0,
            width: 640,
            height: 480,
        });
        block
            .set_field(
                FormatField::FrameSize,
                FormatValue::Size {
                    width: 320,
                    height: 240,
                },
            )
            .unwrap();
        assert_eq!(
            block.field(FormatField::FrameSize).unwrap().as_size(),
            Some((320, 240))
        );
        approx::assert_relative_eq!(
            block.field(FormatField::FrameRate).unwrap().as_rate().unwrap(),
            25.0
        );
    }

    #[test]
    fn mismatched_field_is_unsupported() {
        let block = FormatBlock::Video(VideoFormat {
            frame_rate: 25.0,
            width: 640,
            height: 480,
        });
        assert!(matches!(
            block.field(FormatField::SampleRate),
            Err(CaptureError::UnsupportedCapability(_))
        ));

        let mut block = FormatBlock::Audio(AudioFormat::new(1, 8_000, 8));
        assert!(matches!(
            block.set_field(FormatField::FrameRate, FormatValue::Rate(30.0)),
            Err(CaptureError::UnsupportedCapability(_))
        ));
    }
}
