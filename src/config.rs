use serde::Deserialize;
use std::fmt;

/// The two chains the bridge can run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Network {
    Testnet,
    Mainnet,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Testnet => "testnet",
            Network::Mainnet => "mainnet",
        }
    }

    /// `mainnet` selects mainnet; anything else falls back to testnet.
    pub fn from_selector(s: &str) -> Self {
        if s.eq_ignore_ascii_case("mainnet") {
            Network::Mainnet
        } else {
            Network::Testnet
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable per-session parameters of one network.
#[derive(Debug, Clone)]
pub struct NetworkParams {
    pub network: Network,
    pub insight_base_url: String,
    pub islock_rpc_url: String,
    pub address_version: u8,
    pub wif_prefix: u8,
    pub min_fee: u64,
    pub dust_threshold: u64,
    pub platform_hrp: &'static str,
    pub faucet_base_url: Option<String>,
    pub coin_type: u32,
}

impl NetworkParams {
    pub fn mainnet() -> Self {
        NetworkParams {
            network: Network::Mainnet,
            insight_base_url: "https://insight.dash.org/insight-api".to_string(),
            islock_rpc_url: "https://rpc.digitalcash.dev".to_string(),
            address_version: 76,
            wif_prefix: 204,
            min_fee: 1000,
            dust_threshold: 546,
            platform_hrp: "dash",
            faucet_base_url: None,
            coin_type: 5,
        }
    }

    pub fn testnet() -> Self {
        NetworkParams {
            network: Network::Testnet,
            insight_base_url: "https://insight.testnet.networks.dash.org/insight-api".to_string(),
            islock_rpc_url: "https://trpc.digitalcash.dev".to_string(),
            address_version: 140,
            wif_prefix: 239,
            min_fee: 1000,
            dust_threshold: 546,
            platform_hrp: "tdash",
            faucet_base_url: None,
            coin_type: 1,
        }
    }

    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Mainnet => Self::mainnet(),
            Network::Testnet => Self::testnet(),
        }
    }
}

/// Optional per-network endpoint overrides, loaded from `MAINNET_` /
/// `TESTNET_` prefixed environment variables.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct NetworkOverrides {
    pub insight_url: Option<String>,
    pub islock_rpc_url: Option<String>,
    pub faucet_url: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Config {
    pub mainnet_overrides: NetworkOverrides,
    pub testnet_overrides: NetworkOverrides,
}

impl Config {
    /// Loads endpoint overrides from environment variables and `.env`.
    /// Missing values are fine; the built-in defaults cover them.
    pub fn load() -> Self {
        if let Err(err) = dotenvy::from_path(".env") {
            tracing::debug!(
                ?err,
                "No .env file loaded. Continuing with environment variables."
            );
        } else {
            tracing::info!("Successfully loaded .env file");
        }

        let mainnet_overrides = match envy::prefixed("MAINNET_").from_env::<NetworkOverrides>() {
            Ok(overrides) => overrides,
            Err(err) => {
                tracing::warn!(?err, "Failed to parse mainnet overrides, using defaults");
                NetworkOverrides::default()
            }
        };

        let testnet_overrides = match envy::prefixed("TESTNET_").from_env::<NetworkOverrides>() {
            Ok(overrides) => overrides,
            Err(err) => {
                tracing::warn!(?err, "Failed to parse testnet overrides, using defaults");
                NetworkOverrides::default()
            }
        };

        Config {
            mainnet_overrides,
            testnet_overrides,
        }
    }

    /// Built-in parameters for `network` with any overrides applied.
    pub fn params_for_network(&self, network: Network) -> NetworkParams {
        let mut params = NetworkParams::for_network(network);
        let overrides = match network {
            Network::Mainnet => &self.mainnet_overrides,
            Network::Testnet => &self.testnet_overrides,
        };
        if let Some(url) = &overrides.insight_url {
            params.insight_base_url = url.clone();
        }
        if let Some(url) = &overrides.islock_rpc_url {
            params.islock_rpc_url = url.clone();
        }
        if let Some(url) = &overrides.faucet_url {
            params.faucet_base_url = Some(url.clone());
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn selector_defaults_to_testnet() {
        assert_eq!(Network::from_selector("mainnet"), Network::Mainnet);
        assert_eq!(Network::from_selector("Mainnet"), Network::Mainnet);
        assert_eq!(Network::from_selector("testnet"), Network::Testnet);
        assert_eq!(Network::from_selector("anything"), Network::Testnet);
    }

    #[test]
    fn builtin_params_match_network_table() {
        let mainnet = NetworkParams::mainnet();
        assert_eq!(mainnet.address_version, 0x4c);
        assert_eq!(mainnet.wif_prefix, 0xcc);
        assert_eq!(mainnet.coin_type, 5);
        assert_eq!(mainnet.platform_hrp, "dash");

        let testnet = NetworkParams::testnet();
        assert_eq!(testnet.address_version, 0x8c);
        assert_eq!(testnet.wif_prefix, 0xef);
        assert_eq!(testnet.coin_type, 1);
        assert_eq!(testnet.platform_hrp, "tdash");
        assert_eq!(testnet.min_fee, 1000);
        assert_eq!(testnet.dust_threshold, 546);
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let config = Config {
            testnet_overrides: NetworkOverrides {
                insight_url: Some("http://localhost:3001/insight-api".into()),
                islock_rpc_url: None,
                faucet_url: Some("http://localhost:3002".into()),
            },
            ..Default::default()
        };
        let params = config.params_for_network(Network::Testnet);
        assert_eq!(params.insight_base_url, "http://localhost:3001/insight-api");
        assert_eq!(params.islock_rpc_url, "https://trpc.digitalcash.dev");
        assert_eq!(
            params.faucet_base_url.as_deref(),
            Some("http://localhost:3002")
        );
    }
}
