//! Network selection
//!
//! The network flag only selects address prefixes and the lookup endpoint handed
//! to external collaborators; it never changes curve or script arithmetic.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Bitcoin network a transaction belongs to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    #[default]
    Mainnet,
    Testnet,
}

impl Network {
    /// Version byte of a pay-to-public-key-hash address
    pub fn p2pkh_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x00,
            Network::Testnet => 0x6f,
        }
    }

    /// Version byte of a pay-to-script-hash address
    pub fn p2sh_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x05,
            Network::Testnet => 0xc4,
        }
    }

    /// Version byte of a wallet-import-format private key
    pub fn wif_prefix(self) -> u8 {
        match self {
            Network::Mainnet => 0x80,
            Network::Testnet => 0xef,
        }
    }

    /// Base URL a transaction-fetching collaborator uses by default
    pub fn default_lookup_endpoint(self) -> &'static str {
        match self {
            Network::Mainnet => "http://mainnet.programmingbitcoin.com",
            Network::Testnet => "http://testnet.programmingbitcoin.com",
        }
    }

    pub fn is_testnet(self) -> bool {
        self == Network::Testnet
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Network::Mainnet => write!(f, "mainnet"),
            Network::Testnet => write!(f, "testnet"),
        }
    }
}
