//! Durin CLI.
//!
//! Walks the ENS L2 registry workflow from a terminal: list chains, search
//! the names an address owns, deploy a registry, then point a name at it.
//!
//! # Usage
//!
//! ```bash
//! # Names owned by an address on Sepolia
//! durin domains --address 0x... --network Sepolia --filter alice
//!
//! # Deploy a registry on Base for alice.eth (signs with $PRIVATE_KEY)
//! durin deploy --chain Base --name alice.eth
//!
//! # Wire the name to it
//! durin update-resolver --network Sepolia --name alice.eth
//! durin add-record --network Sepolia --name alice.eth --chain Base --registry 0x...
//! durin set-registry --network Sepolia --name alice.eth --chain Base --registry 0x...
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use durin::chains::{self, short_address};
use durin::{
    ActionEngine, ActionRequest, ChainRegistry, Domain, DomainLookup, DomainSelector, ExplorerLink,
    HistoryLog, HttpDomainLookup, L1Contracts, L1Network, actions,
};
use durin_cli::config::Config;
use durin_cli::gateway::RpcGateway;

/// ENS L2 subname registry workflow.
#[derive(Debug, Parser)]
#[command(name = "durin", version, about)]
struct Cli {
    /// Path to the configuration file.
    #[arg(long, global = true, default_value = "durin.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// List all supported chains.
    Chains,

    /// List the ENS names an address owns or controls.
    Domains {
        /// Account to look up.
        #[arg(long)]
        address: Address,

        /// L1 network the names live on.
        #[arg(long, default_value = "Sepolia")]
        network: L1Network,

        /// Case-insensitive substring filter.
        #[arg(long)]
        filter: Option<String>,
    },

    /// Deploy a new L2 registry through the factory.
    Deploy {
        /// L2 chain to deploy on, e.g. `Base`.
        #[arg(long)]
        chain: String,

        /// ENS name the registry will issue subnames for.
        #[arg(long)]
        name: String,
    },

    /// Point an ENS name at the L2-aware resolver.
    UpdateResolver {
        /// L1 network the name lives on.
        #[arg(long, default_value = "Sepolia")]
        network: L1Network,

        /// ENS name to update.
        #[arg(long)]
        name: String,
    },

    /// Write the `registry` text record on an ENS name.
    AddRecord {
        #[command(flatten)]
        target: RegistryTarget,
    },

    /// Link an ENS name to its L2 registry on the resolver.
    SetRegistry {
        #[command(flatten)]
        target: RegistryTarget,
    },
}

/// Name and registry arguments shared by the resolver writes.
#[derive(Debug, clap::Args)]
struct RegistryTarget {
    /// L1 network the name lives on.
    #[arg(long, default_value = "Sepolia")]
    network: L1Network,

    /// ENS name to configure.
    #[arg(long)]
    name: String,

    /// L2 chain the registry is deployed on.
    #[arg(long)]
    chain: String,

    /// Registry contract address.
    #[arg(long)]
    registry: Address,
}

/// Everything an action subcommand needs.
struct Session {
    config: Config,
    registry: Arc<ChainRegistry>,
    gateway: Arc<RpcGateway>,
    history: HistoryLog,
    lookup: HttpDomainLookup,
}

impl Session {
    fn open(config: Config, registry: Arc<ChainRegistry>) -> Result<Self> {
        // Load signer from environment.
        let signer: PrivateKeySigner = std::env::var("PRIVATE_KEY")
            .context("PRIVATE_KEY is not set")?
            .parse()
            .context("PRIVATE_KEY is not a valid private key")?;

        let endpoints: HashMap<u64, Vec<String>> = registry
            .iter()
            .map(|c| (c.chain_id, config.rpcs_for(c.chain_id, c.default_rpc)))
            .collect();
        let gateway = Arc::new(RpcGateway::new(signer, endpoints));
        let lookup = HttpDomainLookup::new(config.domains_api.clone())?;

        Ok(Self {
            config,
            registry,
            gateway,
            history: HistoryLog::new(),
            lookup,
        })
    }

    fn account(&self) -> Address {
        use durin::WalletSession as _;
        self.gateway.current_address().unwrap_or_default()
    }

    /// Find `name` among the names the signing account controls.
    async fn owned_domain(&self, network: L1Network, name: &str) -> Result<Domain> {
        find_owned_domain(&self.lookup, self.account(), network, name).await
    }

    async fn run(&self, request: ActionRequest) -> Result<durin::ActionOutcome> {
        let engine = ActionEngine::new(
            Arc::clone(&self.gateway),
            Arc::clone(&self.registry),
            self.history.clone(),
        )
        .with_config(self.config.engine);
        Ok(engine.run(request).await?)
    }

    #[allow(clippy::print_stdout, reason = "CLI output")]
    fn print_history(&self) {
        for record in self.history.list() {
            let link = self
                .registry
                .explorer_url(
                    &record.chain_name,
                    ExplorerLink::Transaction(record.transaction_hash),
                )
                .unwrap_or_default();
            println!(
                "{:<20} {:<18} {}  {link}",
                record.label,
                record.chain_name,
                record.recorded_at.format("%Y-%m-%d %H:%M:%S"),
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load(&cli.config)?;

    let registry = Arc::new(ChainRegistry::builtin());
    registry
        .require(["Mainnet", "Sepolia"])
        .context("chain table is missing an L1 network")?;

    match cli.command {
        Command::Chains => {
            cmd_chains(&registry);
            Ok(())
        }
        Command::Domains {
            address,
            network,
            filter,
        } => cmd_domains(&config, address, network, filter.as_deref()).await,
        Command::Deploy { chain, name } => {
            let session = Session::open(config, registry)?;
            cmd_deploy(&session, &chain, &name).await
        }
        Command::UpdateResolver { network, name } => {
            let session = Session::open(config, registry)?;
            cmd_update_resolver(&session, network, &name).await
        }
        Command::AddRecord { target } => {
            let session = Session::open(config, registry)?;
            cmd_registry_write(&session, &target, actions::add_record).await
        }
        Command::SetRegistry { target } => {
            let session = Session::open(config, registry)?;
            cmd_registry_write(&session, &target, actions::set_registry).await
        }
    }
}

/// Find `name` among the names `account` controls on `network`.
///
/// Lookup failures are reported as such, not as a missing name.
async fn find_owned_domain<L: DomainLookup>(
    lookup: &L,
    account: Address,
    network: L1Network,
    name: &str,
) -> Result<Domain> {
    let domains = lookup
        .domains_for(account, network)
        .await
        .with_context(|| format!("looking up names of {account} on {network}"))?;
    domains
        .into_iter()
        .find(|d| d.name == name)
        .with_context(|| format!("{name} is not owned by {account} on {network}"))
}

/// Warn when `domain` is not yet pointed at the L2 resolver.
///
/// Returns whether a warning was logged. The lookup service may lag behind
/// a resolver update that just confirmed, so this never blocks the write.
fn warn_if_not_l2_resolver(domain: &Domain, ens: &L1Contracts) -> bool {
    if domain.resolver == ens.l2_resolver {
        return false;
    }
    tracing::warn!(
        name = %domain.name,
        resolver = %domain.resolver,
        expected = %ens.l2_resolver,
        "name does not use the L2 resolver yet; run `durin update-resolver` if the write reverts"
    );
    true
}

/// Execute the `chains` subcommand.
#[allow(clippy::print_stdout, reason = "CLI output")]
fn cmd_chains(registry: &ChainRegistry) {
    println!(
        "{:<12} {:<22} {:<6} {:<4} Explorer",
        "Chain ID", "Name", "Type", "ENS"
    );
    println!("{}", "-".repeat(90));

    for chain in registry.iter() {
        let net_type = if chain.is_testnet { "test" } else { "main" };
        let ens = if chain.l1.is_some() { "yes" } else { "" };
        println!(
            "{:<12} {:<22} {:<6} {:<4} {}",
            chain.chain_id, chain.name, net_type, ens, chain.explorer_base_url,
        );
    }
}

/// Execute the `domains` subcommand.
#[allow(clippy::print_stdout, reason = "CLI output")]
async fn cmd_domains(
    config: &Config,
    address: Address,
    network: L1Network,
    filter: Option<&str>,
) -> Result<()> {
    let selector = DomainSelector::new(HttpDomainLookup::new(config.domains_api.clone())?);
    selector.refresh(Some(address), network).await;
    if let Some(filter) = filter {
        selector.set_input(filter);
    }

    let domains = selector.filtered();
    if domains.is_empty() {
        println!("{}", selector.empty_hint());
        return Ok(());
    }

    let ens = chains::by_name(network.chain_name())?.ens()?;
    for domain in domains {
        let resolver = if domain.has_resolver() {
            short_address(&domain.resolver.to_string())
        } else {
            "-".to_owned()
        };
        let wrapped = if domain.is_wrapped(ens) { "wrapped" } else { "" };
        println!("{:<40} resolver {:<14} {wrapped}", domain.name, resolver);
    }
    Ok(())
}

/// Execute the `deploy` subcommand.
#[allow(clippy::print_stdout, reason = "CLI output")]
async fn cmd_deploy(session: &Session, chain: &str, name: &str) -> Result<()> {
    let l2 = session.registry.by_name(chain)?;
    if l2.l1.is_some() {
        bail!("{chain} is an L1 network; registries are deployed on L2 chains");
    }
    let factory = session.config.factory.unwrap_or_default();
    let request = actions::deploy_registry(l2, factory, name)?;

    let outcome = session.run(request).await?;
    session.print_history();

    match actions::registry_address_from_receipt(&outcome.receipt) {
        Some(registry) => {
            println!("registry: {registry}");
            println!("          {}", l2.explorer_url(ExplorerLink::Address(registry)));
        }
        None => tracing::warn!(hash = %outcome.record.transaction_hash, "no RegistryDeployed event in receipt"),
    }
    println!();
    println!("Next: configure a registrar for {name} (see the durin README).");
    Ok(())
}

/// Execute the `update-resolver` subcommand.
async fn cmd_update_resolver(session: &Session, network: L1Network, name: &str) -> Result<()> {
    let l1 = session.registry.by_name(network.chain_name())?;
    let domain = session.owned_domain(network, name).await?;
    let ens = l1.ens()?;
    if domain.resolver == ens.l2_resolver {
        tracing::info!(name, resolver = %domain.resolver, "resolver already set");
    }

    session.run(actions::update_resolver(l1, &domain)?).await?;
    session.print_history();
    Ok(())
}

/// Builder shared by `add-record` and `set-registry`.
type RegistryWrite = fn(
    &durin::ChainTarget,
    &Domain,
    &durin::ChainTarget,
    Address,
) -> Result<ActionRequest, durin::ValidationError>;

/// Execute the `add-record` or `set-registry` subcommand.
async fn cmd_registry_write(
    session: &Session,
    target: &RegistryTarget,
    build: RegistryWrite,
) -> Result<()> {
    let l1 = session.registry.by_name(target.network.chain_name())?;
    let l2 = session.registry.by_name(&target.chain)?;
    let domain = session.owned_domain(target.network, &target.name).await?;
    warn_if_not_l2_resolver(&domain, l1.ens()?);

    session.run(build(l1, &domain, l2, target.registry)?).await?;
    session.print_history();
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use alloy::primitives::address;
    use durin::LookupError;

    use super::*;

    const ACCOUNT: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");

    /// Lookup answering with a fixed list, or with a server error.
    struct StaticLookup(Option<Vec<&'static str>>);

    impl DomainLookup for StaticLookup {
        async fn domains_for(
            &self,
            address: Address,
            _network: L1Network,
        ) -> Result<Vec<Domain>, LookupError> {
            match &self.0 {
                Some(names) => Ok(names
                    .iter()
                    .map(|n| Domain::new(*n, address, Address::ZERO))
                    .collect()),
                None => Err(LookupError::Status {
                    status: 500,
                    body: r#"{"error":"Failed to fetch names"}"#.to_owned(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn find_owned_domain_finds_listed_name() {
        let lookup = StaticLookup(Some(vec!["alice.eth", "bob.eth"]));
        let domain = find_owned_domain(&lookup, ACCOUNT, L1Network::Sepolia, "bob.eth")
            .await
            .unwrap();
        assert_eq!(domain.name, "bob.eth");
        assert_eq!(domain.owner, ACCOUNT);
    }

    #[tokio::test]
    async fn find_owned_domain_reports_unlisted_name() {
        let lookup = StaticLookup(Some(vec!["alice.eth"]));
        let err = find_owned_domain(&lookup, ACCOUNT, L1Network::Sepolia, "carol.eth")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("is not owned by"), "{err:#}");
    }

    #[tokio::test]
    async fn find_owned_domain_propagates_lookup_failure() {
        let lookup = StaticLookup(None);
        let err = find_owned_domain(&lookup, ACCOUNT, L1Network::Sepolia, "alice.eth")
            .await
            .unwrap_err();
        let chain = format!("{err:#}");
        assert!(chain.contains("lookup service returned 500"), "{chain}");
        assert!(!chain.contains("is not owned by"), "{chain}");
    }

    #[test]
    fn other_resolver_only_warns() {
        let ens = chains::by_name("Sepolia").unwrap().ens().unwrap();
        let unset = Domain::new("alice.eth", ACCOUNT, Address::ZERO);
        let ready = Domain::new("alice.eth", ACCOUNT, ens.l2_resolver);
        assert!(warn_if_not_l2_resolver(&unset, ens));
        assert!(!warn_if_not_l2_resolver(&ready, ens));
    }

    #[test]
    fn cli_parses_registry_write() {
        let cli = Cli::try_parse_from([
            "durin",
            "set-registry",
            "--network",
            "Mainnet",
            "--name",
            "alice.eth",
            "--chain",
            "Base",
            "--registry",
            "0x5555555555555555555555555555555555555555",
        ])
        .unwrap();
        let Command::SetRegistry { target } = cli.command else {
            panic!("wrong subcommand: {:?}", cli.command);
        };
        assert_eq!(target.network, L1Network::Mainnet);
        assert_eq!(target.chain, "Base");
        assert_eq!(cli.config, Path::new("durin.toml"));
    }

    #[test]
    fn cli_rejects_unknown_network() {
        assert!(
            Cli::try_parse_from(["durin", "update-resolver", "--network", "Goerli", "--name", "a.eth"])
                .is_err(),
            "only Mainnet and Sepolia carry ENS"
        );
    }
}
