// Copyright (c) 2025 The netcell authors
//
// SPDX-License-Identifier: Apache-2.0
//

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Named deployment profiles. Each profile fixes the host-address offset at
/// which endpoint addresses start inside the cell subnet, so different
/// deployments of the same subnet never hand out overlapping ranges.
#[derive(Clone, Copy, Debug, Display, EnumString, PartialEq, Eq, Serialize, Deserialize)]
#[strum(serialize_all = "lowercase")]
pub enum Profile {
    Default,
    Lab,
    Staging,
    Prod,
}

impl Profile {
    /// First host offset handed to endpoint ordinal 1.
    pub fn host_offset(&self) -> u8 {
        match self {
            Profile::Default => 10,
            Profile::Lab => 100,
            Profile::Staging => 150,
            Profile::Prod => 200,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_profile_offsets() {
        assert_eq!(Profile::Default.host_offset(), 10);
        assert_eq!(Profile::Lab.host_offset(), 100);
        assert_eq!(Profile::Staging.host_offset(), 150);
        assert_eq!(Profile::Prod.host_offset(), 200);
    }

    #[test]
    fn test_profile_parsing() {
        assert_eq!(Profile::from_str("lab").unwrap(), Profile::Lab);
        assert_eq!(Profile::from_str("prod").unwrap(), Profile::Prod);
        assert!(Profile::from_str("qa").is_err());
    }
}
