//! The cooperative task that advances a bridge session. Exactly one
//! asynchronous operation is outstanding per processing step; every await
//! is a suspension point and dropping the returned future aborts whatever
//! request is in flight.

use std::time::Duration;

use crate::bridge::backup;
use crate::bridge::state::BridgeState;
use crate::bridge::{BridgeError, BridgeEvent, BridgeMode, BridgeStep, MIN_DEPOSIT_DUFFS};
use crate::clients::insight::{
    DEFAULT_DEPOSIT_POLL_INTERVAL, DEFAULT_DEPOSIT_TIMEOUT, wait_for_confirmation, wait_for_utxo,
};
use crate::clients::islock::{
    DEFAULT_ISLOCK_POLL_INTERVAL, DEFAULT_ISLOCK_TIMEOUT, wait_for_instant_send_lock,
};
use crate::clients::retry::{RetryStatus, with_retry};
use crate::codec;
use crate::context::BridgeContext;
use crate::model::wallet::key_pair::KeyPair;
use crate::model::wallet::{Wallet, WordCount};
use crate::platform::address::PlatformAddress;
use crate::platform::{PlatformError, validate_identity_id};
use crate::platform::dpns;
use crate::transaction::builder::build_asset_lock_transaction;
use crate::transaction::proof::{AssetLockProof, BURN_OUTPUT_INDEX};
use crate::transaction::signer::sign_transaction;

#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Resume key material for create mode; a fresh mnemonic is generated
    /// when absent.
    pub mnemonic: Option<String>,
    pub word_count: WordCount,
    pub min_deposit: u64,
    pub deposit_timeout: Duration,
    pub deposit_poll_interval: Duration,
    pub islock_timeout: Duration,
    pub islock_poll_interval: Duration,
    /// Ask the configured faucet to fund the deposit address (testnet).
    pub use_faucet: bool,
    pub faucet_amount: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        SessionOptions {
            mnemonic: None,
            word_count: WordCount::Twelve,
            min_deposit: MIN_DEPOSIT_DUFFS,
            deposit_timeout: DEFAULT_DEPOSIT_TIMEOUT,
            deposit_poll_interval: DEFAULT_DEPOSIT_POLL_INTERVAL,
            islock_timeout: DEFAULT_ISLOCK_TIMEOUT,
            islock_poll_interval: DEFAULT_ISLOCK_POLL_INTERVAL,
            use_faucet: false,
            faucet_amount: 2 * MIN_DEPOSIT_DUFFS,
        }
    }
}

impl BridgeContext {
    /// Runs a session to a terminal state: `complete`, `error`, or
    /// `detecting_deposit` with `deposit_timed_out` set (resume with
    /// [`BridgeContext::recheck_deposit`]).
    pub async fn run_bridge(&self, mode: BridgeMode, options: &SessionOptions) -> BridgeState {
        let state = BridgeState::new(self.params.network, mode);
        match self.drive(state.clone(), options).await {
            Ok(next) => next,
            Err(err) => self.fail(state, err),
        }
    }

    /// Re-enters the deposit wait after a timeout, with the same keypair
    /// and deposit address, and continues the pipeline on success. Fund
    /// safety depends on the key never changing across rechecks.
    pub async fn recheck_deposit(
        &self,
        state: BridgeState,
        options: &SessionOptions,
    ) -> BridgeState {
        let state = state.recheck();
        let snapshot = state.clone();
        let result = async {
            let state = self.await_deposit(state, options).await?;
            if state.deposit_timed_out {
                return Ok(state);
            }
            self.continue_from_deposit(state, options).await
        }
        .await;
        match result {
            Ok(next) => next,
            Err(err) => self.fail(snapshot, err),
        }
    }

    fn fail(&self, state: BridgeState, err: BridgeError) -> BridgeState {
        let message = err.to_string();
        tracing::error!(error = %message, "bridge session failed");
        self.emit_lossy(BridgeEvent::Failed {
            message: message.clone(),
        });
        state.failed(message)
    }

    async fn drive(
        &self,
        state: BridgeState,
        options: &SessionOptions,
    ) -> Result<BridgeState, BridgeError> {
        // Mode inputs are checked before any key is derived or deposit
        // polled; a mistyped recipient must not cost the user a deposit.
        self.validate_mode_inputs(&state.mode)?;

        if !state.mode.is_funding_mode() {
            let state = match &state.mode {
                BridgeMode::Dpns { .. } => self.register_dpns_name(state).await?,
                BridgeMode::Manage { .. } => self.update_identity_keys(state).await?,
                _ => unreachable!("funding modes are handled by the pipeline"),
            };
            self.emit(BridgeEvent::Completed {
                identity_id: state.identity_id.clone(),
                txid: None,
            })?;
            return Ok(state);
        }

        let state = self.generate_keys(state, options)?;

        // Auto-backup: a crash between here and `complete` would otherwise
        // strand whatever the user deposits.
        let path = backup::write_backup(&state, &self.params, &self.backup_dir)?;
        self.emit(BridgeEvent::BackupWritten { path })?;

        let deposit_address = state
            .deposit_address
            .clone()
            .expect("keys_generated sets the deposit address");
        self.emit(BridgeEvent::DepositAddress {
            address: deposit_address.clone(),
            minimum_duffs: options.min_deposit,
        })?;

        if options.use_faucet {
            self.request_faucet_funding(&deposit_address, options).await;
        }

        let state = self.await_deposit(state, options).await?;
        if state.deposit_timed_out {
            return Ok(state);
        }
        self.continue_from_deposit(state, options).await
    }

    fn validate_mode_inputs(&self, mode: &BridgeMode) -> Result<(), BridgeError> {
        match mode {
            BridgeMode::Create => {}
            BridgeMode::TopUp { target_identity_id } => {
                validate_identity_id(target_identity_id)?;
            }
            BridgeMode::FundAddress { address, .. } => {
                PlatformAddress::parse(address, &self.params)?;
            }
            BridgeMode::SendToAddress { recipient_address } => {
                PlatformAddress::parse(recipient_address, &self.params)?;
            }
            BridgeMode::Dpns {
                label, identity_id, ..
            } => {
                if !dpns::is_valid_label(label) {
                    return Err(crate::platform::ValidationError::InvalidDpnsLabel(
                        label.clone(),
                    )
                    .into());
                }
                validate_identity_id(identity_id)?;
            }
            BridgeMode::Manage { identity_id, .. } => {
                validate_identity_id(identity_id)?;
            }
        }
        Ok(())
    }

    fn generate_keys(
        &self,
        state: BridgeState,
        options: &SessionOptions,
    ) -> Result<BridgeState, BridgeError> {
        let state = state.with_step(BridgeStep::GeneratingKeys);
        self.emit(BridgeEvent::StepChanged(BridgeStep::GeneratingKeys))?;

        match &state.mode {
            BridgeMode::Create => {
                let wallet = match &options.mnemonic {
                    Some(phrase) => Wallet::from_phrase(phrase, "")?,
                    None => Wallet::generate(options.word_count)?,
                };
                let coin_type = self.params.coin_type;
                let asset_lock_key = wallet.asset_lock_key_pair(coin_type)?;
                let identity_keys =
                    crate::bridge::register_identity::default_identity_key_set(&wallet, coin_type)?;
                crate::model::qualified_identity::validate_key_ids(&identity_keys)?;

                let deposit_address = asset_lock_key.address(&self.params);
                Ok(state.keys_generated(
                    Some(wallet.mnemonic_phrase()),
                    asset_lock_key,
                    Some(Wallet::asset_lock_derivation_path(coin_type)),
                    identity_keys,
                    deposit_address,
                ))
            }
            // Top-up and address funding deliberately use one-time random
            // keys: single-use, and not linkable to any mnemonic.
            BridgeMode::TopUp { .. }
            | BridgeMode::FundAddress { .. }
            | BridgeMode::SendToAddress { .. } => {
                let asset_lock_key = KeyPair::generate();
                let deposit_address = asset_lock_key.address(&self.params);
                Ok(state.keys_generated(None, asset_lock_key, None, Vec::new(), deposit_address))
            }
            BridgeMode::Dpns { .. } | BridgeMode::Manage { .. } => {
                unreachable!("non-funding modes never generate asset-lock keys")
            }
        }
    }

    /// Fires a faucet drip at the deposit address and waits briefly for
    /// the drip transaction to lock. Failures are logged, not fatal; the
    /// deposit watch below will see whatever arrives.
    async fn request_faucet_funding(&self, address: &str, options: &SessionOptions) {
        let Some(faucet) = &self.faucet else {
            tracing::warn!("faucet requested but no faucet is configured for this network");
            return;
        };
        match faucet.drip(address, options.faucet_amount).await {
            Ok(drip) => {
                self.emit_lossy(BridgeEvent::FaucetDripped {
                    txid: drip.txid.clone(),
                    amount: drip.amount,
                });
                if let Err(err) = wait_for_confirmation(
                    self.chain.as_ref(),
                    &drip.txid,
                    1,
                    Duration::from_millis(60_000),
                    Duration::from_millis(2_000),
                )
                .await
                {
                    tracing::warn!(error = %err, "faucet transaction not locked yet, continuing");
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "faucet drip failed, awaiting a manual deposit");
            }
        }
    }

    async fn await_deposit(
        &self,
        state: BridgeState,
        options: &SessionOptions,
    ) -> Result<BridgeState, BridgeError> {
        let state = state.with_step(BridgeStep::DetectingDeposit);
        self.emit(BridgeEvent::StepChanged(BridgeStep::DetectingDeposit))?;

        let address = state
            .deposit_address
            .clone()
            .expect("deposit address is set before the deposit wait");

        let watch = wait_for_utxo(
            self.chain.as_ref(),
            &address,
            options.min_deposit,
            options.deposit_timeout,
            options.deposit_poll_interval,
            |remaining, total_amount| {
                self.emit_lossy(BridgeEvent::DepositProgress {
                    remaining,
                    total_amount,
                });
            },
        )
        .await;

        match watch.utxo {
            Some(utxo) => {
                tracing::info!(
                    txid = %utxo.txid,
                    vout = utxo.vout,
                    value = utxo.satoshis,
                    "deposit detected"
                );
                Ok(state.deposit_detected(utxo, watch.total_amount))
            }
            None => {
                self.emit(BridgeEvent::DepositTimedOut {
                    total_amount: watch.total_amount,
                    minimum_duffs: options.min_deposit,
                })?;
                Ok(state.deposit_wait_timed_out(watch.total_amount))
            }
        }
    }

    async fn continue_from_deposit(
        &self,
        state: BridgeState,
        options: &SessionOptions,
    ) -> Result<BridgeState, BridgeError> {
        let state = state.with_step(BridgeStep::BuildingTransaction);
        self.emit(BridgeEvent::StepChanged(BridgeStep::BuildingTransaction))?;

        let utxo = state
            .detected_utxo
            .clone()
            .expect("deposit_detected sets the utxo");
        let asset_lock_key = state
            .asset_lock_key
            .clone()
            .expect("keys_generated sets the asset lock key");

        let mut tx = build_asset_lock_transaction(
            &utxo,
            &asset_lock_key.public_key_bytes(),
            self.params.min_fee,
        )?;

        self.emit(BridgeEvent::StepChanged(BridgeStep::SigningTransaction))?;
        sign_transaction(&mut tx, std::slice::from_ref(&utxo), &asset_lock_key)?;
        let tx_bytes = tx.serialize();
        let signed_hex = codec::encode_hex(&tx_bytes);
        let state = state
            .with_step(BridgeStep::SigningTransaction)
            .transaction_signed(signed_hex.clone());

        self.emit(BridgeEvent::StepChanged(BridgeStep::Broadcasting))?;
        let chain = self.chain.clone();
        let txid = self
            .with_client_retry(|| {
                let chain = chain.clone();
                let hex = signed_hex.clone();
                async move { chain.broadcast_transaction(&hex).await }
            })
            .await?;
        tracing::info!(%txid, "asset lock transaction broadcast");
        self.emit(BridgeEvent::Broadcast { txid: txid.clone() })?;
        let state = state.broadcast_accepted(txid.clone());

        self.emit(BridgeEvent::StepChanged(BridgeStep::WaitingIslock))?;
        let islock_bytes = wait_for_instant_send_lock(
            self.islocks.as_ref(),
            &txid,
            options.islock_timeout,
            options.islock_poll_interval,
        )
        .await?;

        let proof = AssetLockProof::new(tx_bytes, islock_bytes.clone(), BURN_OUTPUT_INDEX);
        let state = state.islock_received(islock_bytes, proof);

        let state = match &state.mode {
            BridgeMode::Create => self.register_identity(state).await?,
            BridgeMode::TopUp { .. } => self.top_up_identity(state).await?,
            BridgeMode::FundAddress { .. } => self.fund_address(state).await?,
            BridgeMode::SendToAddress { .. } => self.send_to_address(state).await?,
            BridgeMode::Dpns { .. } | BridgeMode::Manage { .. } => {
                unreachable!("non-funding modes never reach the pipeline")
            }
        };

        // Refresh the backup now that the txid and identity id are known.
        let path = backup::write_backup(&state, &self.params, &self.backup_dir)?;
        self.emit(BridgeEvent::BackupWritten { path })?;
        self.emit(BridgeEvent::Completed {
            identity_id: state.identity_id.clone(),
            txid: state.broadcast_txid.clone(),
        })?;
        Ok(state)
    }

    /// Retry wrapper for chain HTTP calls, publishing attempt counters.
    pub(super) async fn with_client_retry<T, F, Fut>(
        &self,
        op: F,
    ) -> Result<T, crate::clients::ClientError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, crate::clients::ClientError>>,
    {
        with_retry(
            op,
            &self.retry_options,
            crate::clients::ClientError::is_retryable,
            |attempt, max_attempts, err| {
                self.emit_lossy(BridgeEvent::Retry(RetryStatus {
                    is_retrying: true,
                    attempt,
                    max_attempts,
                    last_error: err.to_string(),
                }));
            },
        )
        .await
    }

    /// Retry wrapper for the best-effort Platform transports.
    pub(super) async fn with_platform_retry<T, F, Fut>(&self, op: F) -> Result<T, PlatformError>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, PlatformError>>,
    {
        with_retry(
            op,
            &self.retry_options,
            PlatformError::is_retryable,
            |attempt, max_attempts, err| {
                self.emit_lossy(BridgeEvent::Retry(RetryStatus {
                    is_retrying: true,
                    attempt,
                    max_attempts,
                    last_error: err.to_string(),
                }));
            },
        )
        .await
    }
}
