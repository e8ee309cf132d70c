// SPDX-License-Identifier: GPL-3.0-only

//! LVM2 logical-volume metadata parsing.
//!
//! The daemon embeds one metadata string per logical volume on every
//! physical volume of a group: semicolon-delimited `key=value` tokens, of
//! which `name`, `uuid` and `size` matter here.

use serde::{Deserialize, Serialize};

/// One logical volume as described by PV group metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalVolumeSpec {
    pub name: String,
    pub uuid: String,

    /// Size in bytes.
    pub size: u64,
}

impl LogicalVolumeSpec {
    /// Parse a `name=a;uuid=u;size=100` metadata string. Returns `None`
    /// when any of the three required tokens is missing, empty or (for
    /// `size`) zero or unparsable.
    pub fn parse(desc: &str) -> Option<Self> {
        let mut name = None;
        let mut uuid = None;
        let mut size = 0u64;

        for token in desc.split(';') {
            if let Some(v) = token.strip_prefix("name=") {
                name = Some(v.to_string());
            } else if let Some(v) = token.strip_prefix("uuid=") {
                uuid = Some(v.to_string());
            } else if let Some(v) = token.strip_prefix("size=") {
                size = v.parse().unwrap_or(0);
            }
        }

        match (name, uuid) {
            (Some(name), Some(uuid)) if !name.is_empty() && !uuid.is_empty() && size > 0 => {
                Some(Self { name, uuid, size })
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_descriptor() {
        let lv = LogicalVolumeSpec::parse("name=a;uuid=u1;size=100").unwrap();
        assert_eq!(lv.name, "a");
        assert_eq!(lv.uuid, "u1");
        assert_eq!(lv.size, 100);
    }

    #[test]
    fn token_order_does_not_matter() {
        let lv = LogicalVolumeSpec::parse("size=200;name=b;uuid=u2").unwrap();
        assert_eq!(lv.name, "b");
        assert_eq!(lv.size, 200);
    }

    #[test]
    fn unknown_tokens_are_ignored() {
        let lv = LogicalVolumeSpec::parse("name=c;uuid=u3;size=1;flags=rw").unwrap();
        assert_eq!(lv.uuid, "u3");
    }

    #[test]
    fn rejects_missing_or_zero_fields() {
        assert!(LogicalVolumeSpec::parse("name=a;size=100").is_none());
        assert!(LogicalVolumeSpec::parse("name=a;uuid=u1;size=0").is_none());
        assert!(LogicalVolumeSpec::parse("name=;uuid=u1;size=5").is_none());
        assert!(LogicalVolumeSpec::parse("").is_none());
    }
}
