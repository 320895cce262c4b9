//! Format negotiation against the stream-configuration endpoints.
//!
//! Formats can only be read or written while the endpoint is disconnected,
//! so every access de-renders the whole graph first and re-renders it
//! afterwards. The re-render happens unconditionally, including when the
//! format operation itself failed, so a failed negotiation never leaves
//! the graph unwired.

use crate::graph::{NodeId, OutputPin};
use crate::models::error::CaptureError;
use crate::models::format::{FormatField, FormatValue};
use crate::traits::graph_driver::GraphDriver;

use super::GraphController;

/// Which stream's configuration endpoint a format operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamTarget {
    Video,
    Audio,
}

impl StreamTarget {
    fn label(self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
        }
    }
}

impl<D: GraphDriver> GraphController<D> {
    /// Read one format field of the targeted stream. Forces a de-render
    /// and re-render cycle; not allowed while capturing.
    pub fn format_field(
        &mut self,
        target: StreamTarget,
        field: FormatField,
    ) -> Result<FormatValue, CaptureError> {
        self.assert_stopped("format_field")?;
        let (node, pin) = self.stream_endpoint(target)?;
        self.derender();
        let result = self
            .driver
            .get_format(node, pin)
            .and_then(|block| block.field(field));
        self.rerender_after_format_access(result)
    }

    /// Write one format field of the targeted stream. The driver may clamp
    /// the value to the nearest supported one; the value actually in
    /// effect is returned. Audio writes recompute the derived wave-format
    /// fields before the block is committed.
    pub fn set_format_field(
        &mut self,
        target: StreamTarget,
        field: FormatField,
        value: FormatValue,
    ) -> Result<FormatValue, CaptureError> {
        self.assert_stopped("set_format_field")?;
        let (node, pin) = self.stream_endpoint(target)?;
        self.derender();
        let result = self.apply_format_field(node, pin, field, value);
        if field == FormatField::FrameSize {
            // Frame-size dependent capabilities may have shifted.
            self.video_caps = None;
        }
        self.rerender_after_format_access(result)
    }

    fn stream_endpoint(
        &mut self,
        target: StreamTarget,
    ) -> Result<(NodeId, OutputPin), CaptureError> {
        self.ensure_created()?;
        let endpoint = match target {
            StreamTarget::Video => self.video_stream_config,
            StreamTarget::Audio => self.audio_stream_config,
        };
        endpoint.ok_or_else(|| {
            CaptureError::UnsupportedCapability(format!(
                "the {} stream exposes no configuration endpoint",
                target.label()
            ))
        })
    }

    /// Read-modify-write of one field against the disconnected endpoint.
    fn apply_format_field(
        &mut self,
        node: NodeId,
        pin: OutputPin,
        field: FormatField,
        value: FormatValue,
    ) -> Result<FormatValue, CaptureError> {
        let mut block = self.driver.get_format(node, pin)?;
        block.set_field(field, value)?;
        let accepted = self.driver.set_format(node, pin, block)?;
        accepted.field(field)
    }

    /// Restore the branches that were wanted before the format access and
    /// resume the preview clock. When the format operation already failed,
    /// its error wins and a re-render failure is only logged.
    fn rerender_after_format_access(
        &mut self,
        result: Result<FormatValue, CaptureError>,
    ) -> Result<FormatValue, CaptureError> {
        let rendered = self.render();
        self.start_preview_if_needed();
        match (result, rendered) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), rendered) => {
                if let Err(render_err) = rendered {
                    log::warn!("re-render after a failed format access also failed: {render_err}");
                }
                Err(err)
            }
        }
    }
}
