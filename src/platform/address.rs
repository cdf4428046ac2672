//! Platform addresses: bech32m strings with an `HRP` of `dash` (mainnet)
//! or `tdash` (testnet). The bridge only ever validates and forwards them;
//! enforcement happens before any keys are derived or deposits polled.

use bech32::Bech32m;
use bech32::primitives::decode::CheckedHrpstring;

use crate::config::NetworkParams;
use crate::platform::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformAddress {
    encoded: String,
    hrp: String,
}

impl PlatformAddress {
    /// Parses and validates `address` against the session network. The
    /// checksum must be bech32m (not bech32) and the HRP must match the
    /// network's.
    pub fn parse(address: &str, params: &NetworkParams) -> Result<Self, ValidationError> {
        let checked = CheckedHrpstring::new::<Bech32m>(address)
            .map_err(|e| ValidationError::InvalidPlatformAddress(e.to_string()))?;
        let hrp = checked.hrp().to_lowercase();
        if hrp != params.platform_hrp {
            return Err(ValidationError::InvalidPlatformAddress(format!(
                "address is for '{hrp}', session network expects '{}'",
                params.platform_hrp
            )));
        }
        Ok(PlatformAddress {
            encoded: address.to_string(),
            hrp,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn hrp(&self) -> &str {
        &self.hrp
    }
}

impl std::fmt::Display for PlatformAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encoded)
    }
}
