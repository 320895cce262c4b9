use serde::{Deserialize, Serialize};

/// An opaque, comparable reference to a capture source or compressor.
///
/// Obtained from a device catalog (backend-specific enumeration) and
/// immutable afterwards. The persisted form is an opaque string that stays
/// valid across process restarts as long as the device identity is stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceReference {
    /// Backend-defined stable identifier (a moniker, device path, ...).
    pub id: String,
    /// Human-readable device name for display.
    pub name: String,
}

impl DeviceReference {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Opaque string form a caller may persist externally.
    pub fn to_persisted(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.id.clone())
    }

    /// Rebuild a reference from its persisted form.
    pub fn from_persisted(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }
}

impl std::fmt::Display for DeviceReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Borrowed handle to the display surface preview video is rendered into.
///
/// The controller never owns the surface; it attaches the renderer node to
/// it while the preview branch is rendered and detaches again before the
/// renderer node is released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewSurface(u64);

impl PreviewSurface {
    pub fn from_raw(handle: u64) -> Self {
        Self(handle)
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persisted_round_trip() {
        let dev = DeviceReference::new("sim-video-0", "Front Camera");
        let raw = dev.to_persisted();
        assert_eq!(DeviceReference::from_persisted(&raw), Some(dev));
    }

    #[test]
    fn from_persisted_rejects_garbage() {
        assert_eq!(DeviceReference::from_persisted("not json"), None);
    }
}
