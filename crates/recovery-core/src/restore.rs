use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::asset::{AssetKey, SnapshotEpoch};
use crate::image::{ExportTarget, ImageType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RestoreKind {
    Rescue,
    Export,
}

/// Bookkeeping entry for a restore that exists on the appliance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreRecord {
    pub asset: AssetKey,
    pub snapshot: SnapshotEpoch,
    pub kind: RestoreKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_type: Option<ImageType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<ExportTarget>,
    pub created_at: DateTime<Utc>,
}

impl RestoreRecord {
    #[must_use]
    pub fn export(
        asset: AssetKey,
        snapshot: SnapshotEpoch,
        image_type: ImageType,
        target: ExportTarget,
    ) -> Self {
        Self {
            asset,
            snapshot,
            kind: RestoreKind::Export,
            image_type: Some(image_type),
            target: Some(target),
            created_at: Utc::now(),
        }
    }

    /// Whether `other` describes the same restore slot.
    #[must_use]
    pub fn same_restore(&self, other: &Self) -> bool {
        self.asset == other.asset && self.snapshot == other.snapshot && self.kind == other.kind
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RestoreRecord {
        RestoreRecord::export(
            AssetKey::new("web01").expect("valid key"),
            SnapshotEpoch::new(1_700_000_000).expect("valid epoch"),
            ImageType::Vhdx,
            ExportTarget::Usb,
        )
    }

    #[test]
    fn export_record_carries_image_and_target() {
        let record = record();

        assert_eq!(record.kind, RestoreKind::Export);
        assert_eq!(record.image_type, Some(ImageType::Vhdx));
        assert_eq!(record.target, Some(ExportTarget::Usb));
    }

    #[test]
    fn same_restore_ignores_creation_time() {
        let a = record();
        let mut b = record();
        b.created_at = DateTime::from_timestamp(0, 0).expect("valid timestamp");

        assert!(a.same_restore(&b));
    }

    #[test]
    fn serializes_to_toml() -> anyhow::Result<()> {
        let text = toml::to_string(&record())?;

        assert!(text.contains("asset = \"web01\""));
        assert!(text.contains("kind = \"export\""));
        assert!(text.contains("image_type = \"vhdx\""));
        Ok(())
    }
}
