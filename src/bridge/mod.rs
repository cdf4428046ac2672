//! The bridge state machine: one session converting a layer-1 deposit into
//! layer-2 credits. The state is an immutable value advanced only by named
//! transition functions; the driver awaits one collaborator per processing
//! step and emits progress events over an mpsc channel.

pub mod backup;
pub mod driver;
pub mod fund_address;
pub mod manage_identity;
pub mod register_dpns_name;
pub mod register_identity;
pub mod send_to_address;
pub mod state;
pub mod top_up_identity;

use std::path::PathBuf;
use std::time::Duration;

use crate::clients::ClientError;
use crate::clients::retry::RetryStatus;
use crate::codec::CodecError;
use crate::model::qualified_identity::{KeyValidationError, Purpose, SecurityLevel};
use crate::model::qualified_identity::qualified_identity_public_key::KeyMatchError;
use crate::model::wallet::WalletError;
use crate::platform::{PlatformError, ValidationError};
use crate::transaction::TxError;

/// Smallest deposit the bridge will lock, in duffs.
pub const MIN_DEPOSIT_DUFFS: u64 = 300_000;

/// What the session is bridging toward. Each variant owns its own inputs;
/// the common pipeline prefix is identical across the four funding modes.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeMode {
    /// Create a new identity from an HD mnemonic.
    Create,
    /// Credit an existing identity via a one-time key.
    TopUp { target_identity_id: String },
    /// Fund a platform address the operator controls. The WIF, when given,
    /// lets the signer prove ownership of that address.
    FundAddress {
        address: String,
        address_wif: Option<String>,
    },
    /// Send credits to a third-party platform address; the recipient does
    /// not sign to receive.
    SendToAddress { recipient_address: String },
    /// Register a DPNS name for an existing identity.
    Dpns {
        label: String,
        identity_id: String,
        private_key_wif: String,
    },
    /// Add or disable keys on an existing identity.
    Manage {
        identity_id: String,
        master_key_wif: String,
        add_keys: Vec<NewKeyRequest>,
        disable_key_ids: Vec<u32>,
    },
}

impl BridgeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeMode::Create => "create",
            BridgeMode::TopUp { .. } => "topup",
            BridgeMode::FundAddress { .. } => "fundAddress",
            BridgeMode::SendToAddress { .. } => "sendToAddress",
            BridgeMode::Dpns { .. } => "dpns",
            BridgeMode::Manage { .. } => "manage",
        }
    }

    /// The funding modes run the deposit/lock/proof pipeline; DPNS and
    /// manage go straight to Platform.
    pub fn is_funding_mode(&self) -> bool {
        matches!(
            self,
            BridgeMode::Create
                | BridgeMode::TopUp { .. }
                | BridgeMode::FundAddress { .. }
                | BridgeMode::SendToAddress { .. }
        )
    }
}

/// Specification of a key to add in manage mode. The private half is
/// generated fresh and lands in the key backup.
#[derive(Debug, Clone, PartialEq)]
pub struct NewKeyRequest {
    pub purpose: Purpose,
    pub security_level: SecurityLevel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeStep {
    Init,
    GeneratingKeys,
    DetectingDeposit,
    BuildingTransaction,
    SigningTransaction,
    Broadcasting,
    WaitingIslock,
    RegisteringIdentity,
    ToppingUp,
    FundingAddress,
    SendingToAddress,
    RegisteringName,
    UpdatingIdentity,
    Complete,
    Error,
}

impl BridgeStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            BridgeStep::Init => "init",
            BridgeStep::GeneratingKeys => "generating_keys",
            BridgeStep::DetectingDeposit => "detecting_deposit",
            BridgeStep::BuildingTransaction => "building_transaction",
            BridgeStep::SigningTransaction => "signing_transaction",
            BridgeStep::Broadcasting => "broadcasting",
            BridgeStep::WaitingIslock => "waiting_islock",
            BridgeStep::RegisteringIdentity => "registering_identity",
            BridgeStep::ToppingUp => "topping_up",
            BridgeStep::FundingAddress => "funding_address",
            BridgeStep::SendingToAddress => "sending_to_address",
            BridgeStep::RegisteringName => "registering_name",
            BridgeStep::UpdatingIdentity => "updating_identity",
            BridgeStep::Complete => "complete",
            BridgeStep::Error => "error",
        }
    }
}

/// Progress events for whatever presenter is attached to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum BridgeEvent {
    StepChanged(BridgeStep),
    DepositAddress {
        address: String,
        minimum_duffs: u64,
    },
    DepositProgress {
        remaining: Duration,
        total_amount: u64,
    },
    DepositTimedOut {
        total_amount: u64,
        minimum_duffs: u64,
    },
    FaucetDripped {
        txid: String,
        amount: u64,
    },
    Broadcast {
        txid: String,
    },
    Retry(RetryStatus),
    BackupWritten {
        path: PathBuf,
    },
    NameContested {
        label: String,
    },
    Completed {
        identity_id: Option<String>,
        txid: Option<String>,
    },
    Failed {
        message: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Wallet(#[from] WalletError),
    #[error(transparent)]
    KeyValidation(#[from] KeyValidationError),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Tx(#[from] TxError),
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("failed to write key backup: {0}")]
    Backup(#[from] std::io::Error),
    #[error("session cancelled")]
    UserCancelled,
}

impl From<KeyMatchError> for BridgeError {
    fn from(err: KeyMatchError) -> Self {
        match err {
            KeyMatchError::InvalidWif(e) => BridgeError::Wallet(e),
            KeyMatchError::Validation(e) => BridgeError::KeyValidation(e),
        }
    }
}
