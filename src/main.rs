use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use dash_bridge::bridge::driver::SessionOptions;
use dash_bridge::bridge::{BridgeEvent, BridgeMode, BridgeStep, NewKeyRequest};
use dash_bridge::config::{Config, Network};
use dash_bridge::context::BridgeContext;
use dash_bridge::logging::initialize_logger;
use dash_bridge::model::qualified_identity::{Purpose, SecurityLevel};
use dash_bridge::platform::mock::MockPlatformDriver;

#[derive(Parser, Debug)]
#[command(
    name = "dash-bridge",
    version,
    about = "Bridge layer-1 Dash into layer-2 Platform credits"
)]
struct Args {
    /// `mainnet` selects mainnet; anything else runs on testnet.
    #[arg(long, global = true, default_value = "testnet")]
    network: String,

    /// Directory the key-backup JSON is written into.
    #[arg(long, global = true, default_value = ".")]
    backup_dir: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a new identity funded by a deposit.
    Create {
        /// Reuse an existing mnemonic instead of generating one.
        #[arg(long)]
        mnemonic: Option<String>,
        /// Ask the configured testnet faucet to fund the deposit address.
        #[arg(long)]
        use_faucet: bool,
    },
    /// Top up an existing identity.
    Topup {
        #[arg(long)]
        identity: String,
    },
    /// Fund a platform address you control.
    FundAddress {
        #[arg(long)]
        address: String,
        /// WIF of the address key, to prove ownership.
        #[arg(long)]
        wif: Option<String>,
    },
    /// Send credits to a third-party platform address.
    SendToAddress {
        #[arg(long)]
        recipient: String,
    },
    /// Register a DPNS name for an existing identity.
    Dpns {
        #[arg(long)]
        label: String,
        #[arg(long)]
        identity: String,
        /// WIF of an authentication key of the identity.
        #[arg(long)]
        wif: String,
    },
    /// Add or disable identity keys.
    Manage {
        #[arg(long)]
        identity: String,
        /// WIF of a MASTER key of the identity.
        #[arg(long)]
        master_wif: String,
        /// Keys to add, as `purpose:security-level` (e.g. `transfer:critical`).
        #[arg(long = "add-key")]
        add_keys: Vec<String>,
        /// Key ids to disable.
        #[arg(long = "disable-key")]
        disable_keys: Vec<u32>,
    },
}

fn parse_new_key(spec: &str) -> Result<NewKeyRequest, String> {
    let (purpose, level) = spec
        .split_once(':')
        .ok_or_else(|| format!("expected purpose:security-level, got '{spec}'"))?;
    let purpose = match purpose.to_ascii_lowercase().as_str() {
        "authentication" => Purpose::AUTHENTICATION,
        "encryption" => Purpose::ENCRYPTION,
        "decryption" => Purpose::DECRYPTION,
        "transfer" => Purpose::TRANSFER,
        "voting" => Purpose::VOTING,
        "owner" => Purpose::OWNER,
        other => return Err(format!("unknown purpose '{other}'")),
    };
    let security_level = match level.to_ascii_lowercase().as_str() {
        "master" => SecurityLevel::MASTER,
        "critical" => SecurityLevel::CRITICAL,
        "high" => SecurityLevel::HIGH,
        "medium" => SecurityLevel::MEDIUM,
        other => return Err(format!("unknown security level '{other}'")),
    };
    Ok(NewKeyRequest {
        purpose,
        security_level,
    })
}

fn main() -> Result<(), String> {
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("multi-threading runtime cannot be initialized");

    runtime.block_on(async {
        initialize_logger();

        let network = Network::from_selector(&args.network);
        let config = Config::load();
        let params = config.params_for_network(network);

        let (mode, options) = match args.command {
            Command::Create {
                mnemonic,
                use_faucet,
            } => (
                BridgeMode::Create,
                SessionOptions {
                    mnemonic,
                    use_faucet,
                    ..SessionOptions::default()
                },
            ),
            Command::Topup { identity } => (
                BridgeMode::TopUp {
                    target_identity_id: identity,
                },
                SessionOptions::default(),
            ),
            Command::FundAddress { address, wif } => (
                BridgeMode::FundAddress {
                    address,
                    address_wif: wif,
                },
                SessionOptions::default(),
            ),
            Command::SendToAddress { recipient } => (
                BridgeMode::SendToAddress {
                    recipient_address: recipient,
                },
                SessionOptions::default(),
            ),
            Command::Dpns {
                label,
                identity,
                wif,
            } => (
                BridgeMode::Dpns {
                    label,
                    identity_id: identity,
                    private_key_wif: wif,
                },
                SessionOptions::default(),
            ),
            Command::Manage {
                identity,
                master_wif,
                add_keys,
                disable_keys,
            } => {
                let add_keys = add_keys
                    .iter()
                    .map(|spec| parse_new_key(spec))
                    .collect::<Result<Vec<_>, _>>()?;
                (
                    BridgeMode::Manage {
                        identity_id: identity,
                        master_key_wif: master_wif,
                        add_keys,
                        disable_key_ids: disable_keys,
                    },
                    SessionOptions::default(),
                )
            }
        };

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(print_events(events_rx));

        // The production SDK plugs in behind the PlatformDriver trait; this
        // binary runs against the in-memory driver.
        let platform = Arc::new(MockPlatformDriver::new());
        let context = BridgeContext::new(params, platform, events_tx)
            .with_backup_dir(args.backup_dir);

        let mut state = context.run_bridge(mode, &options).await;

        // A deposit timeout is recoverable: keep rechecking with the same
        // keys until the funds arrive or the operator gives up.
        while state.deposit_timed_out {
            tracing::info!(
                seen = state.detected_deposit_amount,
                minimum = options.min_deposit,
                "deposit not sufficient yet, rechecking"
            );
            state = context.recheck_deposit(state, &options).await;
        }

        drop(context);
        let _ = printer.await;

        match state.step {
            BridgeStep::Complete => Ok(()),
            _ => Err(state
                .last_error
                .unwrap_or_else(|| "bridge did not complete".to_string())),
        }
    })
}

async fn print_events(mut events: mpsc::UnboundedReceiver<BridgeEvent>) {
    while let Some(event) = events.recv().await {
        match event {
            BridgeEvent::StepChanged(step) => println!("==> {}", step.as_str()),
            BridgeEvent::DepositAddress {
                address,
                minimum_duffs,
            } => {
                println!("Send at least {minimum_duffs} duffs to {address}");
            }
            BridgeEvent::DepositProgress {
                remaining,
                total_amount,
            } => {
                println!(
                    "    waiting for deposit ({total_amount} duffs seen, {}s left)",
                    remaining.as_secs()
                );
            }
            BridgeEvent::DepositTimedOut {
                total_amount,
                minimum_duffs,
            } => {
                if total_amount > 0 {
                    println!(
                        "Deposit received: {total_amount} duffs; minimum {minimum_duffs} — send more"
                    );
                } else {
                    println!("No deposit detected yet");
                }
            }
            BridgeEvent::FaucetDripped { txid, amount } => {
                println!("Faucet sent {amount} duffs ({txid})");
            }
            BridgeEvent::Broadcast { txid } => println!("Broadcast: {txid}"),
            BridgeEvent::Retry(status) => {
                println!(
                    "    retry {}/{} after: {}",
                    status.attempt, status.max_attempts, status.last_error
                );
            }
            BridgeEvent::BackupWritten { path } => {
                println!("Key backup written to {}", path.display());
            }
            BridgeEvent::NameContested { label } => {
                println!("Note: '{label}' is a contested name and goes to a vote");
            }
            BridgeEvent::Completed { identity_id, txid } => {
                println!("Done.");
                if let Some(id) = identity_id {
                    println!("Identity: {id}");
                }
                if let Some(txid) = txid {
                    println!("Asset lock txid: {txid}");
                }
            }
            BridgeEvent::Failed { message } => println!("Failed: {message}"),
        }
    }
}
