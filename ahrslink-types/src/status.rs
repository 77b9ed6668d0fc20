//! The published AHRS status record.

use crate::LinkStatusSnapshot;

/// Externally visible mirror of the latest [`LinkStatusSnapshot`].
///
/// Overwritten wholesale every supervisor cycle. With the `serde` feature the
/// fields serialize under their ground-station names (`LinkRunning`,
/// `AhrsKickstarts`, `OpCrcErrors`, ...).
///
/// The only way to build one is from a snapshot, so a record always mirrors
/// something the transport actually reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
#[cfg_attr(feature = "minicbor", derive(minicbor::Encode, minicbor::Decode))]
pub struct AhrsStatus {
    #[cfg_attr(feature = "minicbor", n(0))]
    pub link_running: bool,
    #[cfg_attr(feature = "minicbor", n(1))]
    pub ahrs_kickstarts: u32,
    #[cfg_attr(feature = "minicbor", n(2))]
    pub ahrs_crc_errors: u32,
    #[cfg_attr(feature = "minicbor", n(3))]
    pub ahrs_retries: u32,
    #[cfg_attr(feature = "minicbor", n(4))]
    pub ahrs_invalid_packets: u32,
    #[cfg_attr(feature = "minicbor", n(5))]
    pub op_crc_errors: u32,
    #[cfg_attr(feature = "minicbor", n(6))]
    pub op_retries: u32,
    #[cfg_attr(feature = "minicbor", n(7))]
    pub op_invalid_packets: u32,
}

impl From<&LinkStatusSnapshot> for AhrsStatus {
    fn from(snapshot: &LinkStatusSnapshot) -> Self {
        Self {
            link_running: snapshot.link_ok,
            ahrs_kickstarts: snapshot.remote.kick_starts,
            ahrs_crc_errors: snapshot.remote.crc_errors,
            ahrs_retries: snapshot.remote.retries,
            ahrs_invalid_packets: snapshot.remote.invalid_packets,
            op_crc_errors: snapshot.local.crc_errors,
            op_retries: snapshot.local.retries,
            op_invalid_packets: snapshot.local.invalid_packets,
        }
    }
}

impl From<LinkStatusSnapshot> for AhrsStatus {
    fn from(snapshot: LinkStatusSnapshot) -> Self {
        Self::from(&snapshot)
    }
}

impl AhrsStatus {
    /// Returns true if this record mirrors `snapshot` field for field.
    pub fn mirrors(&self, snapshot: &LinkStatusSnapshot) -> bool {
        *self == Self::from(snapshot)
    }
}
