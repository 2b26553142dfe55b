//! Builders for the four writes of the registry workflow.
//!
//! Each builder validates its inputs and returns an [`ActionRequest`] ready
//! for [`crate::engine::ActionEngine::run`]:
//!
//! | builder              | chain | contract                  |
//! |----------------------|-------|---------------------------|
//! | [`deploy_registry`]  | L2    | registry factory          |
//! | [`update_resolver`]  | L1    | ENS registry / NameWrapper |
//! | [`add_record`]       | L1    | L2 resolver (`setText`)   |
//! | [`set_registry`]     | L1    | L2 resolver (`setL2Registry`) |

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::{SolCall, SolEvent};

use crate::chains::ChainTarget;
use crate::error::ValidationError;
use crate::types::{ActionRequest, ButtonLabels, Domain, Receipt, WriteCall};

/// Contract name passed to the factory for every deployed registry.
pub const REGISTRY_CONTRACT_NAME: &str = "L2Registry";

/// Text record key pointing an L1 name at its L2 registry.
pub const REGISTRY_TEXT_KEY: &str = "registry";

/// ABI fragments used by the workflow.
mod abi {
    alloy::sol! {
        function deployRegistry(string name, string symbol, string baseURI) external returns (address);
        event RegistryDeployed(address indexed registry, string name, string symbol, string baseURI);
        function setResolver(bytes32 node, address resolver) external;
        function setText(bytes32 node, string key, string value) external;
        function setL2Registry(bytes32 node, uint64 targetChainId, address targetRegistryAddress) external;
    }
}

/// Deploy a new L2 registry for `base_name` through the factory.
///
/// # Errors
///
/// Returns [`ValidationError::MissingDomain`] for an empty base name and
/// [`ValidationError::MissingFactory`] for a zero factory address.
pub fn deploy_registry(
    l2: &ChainTarget,
    factory: Address,
    base_name: &str,
) -> Result<ActionRequest, ValidationError> {
    if base_name.is_empty() {
        return Err(ValidationError::MissingDomain);
    }
    if factory.is_zero() {
        return Err(ValidationError::MissingFactory);
    }
    let input = abi::deployRegistryCall {
        name: REGISTRY_CONTRACT_NAME.to_owned(),
        symbol: base_name.to_owned(),
        baseURI: String::new(),
    }
    .abi_encode();

    Ok(ActionRequest {
        target_chain_id: l2.chain_id,
        call: WriteCall {
            to: factory,
            signature: "deployRegistry(string,string,string)",
            input: Bytes::from(input),
            chain_id: l2.chain_id,
        },
        label: "Deployed Registry",
        buttons: ButtonLabels {
            idle: "Deploy",
            success: "Deployed!",
        },
    })
}

/// Point `domain` at the L2-aware resolver on its L1 network.
///
/// Wrapped names are updated through the NameWrapper, others through the
/// ENS registry.
///
/// # Errors
///
/// Returns a validation error for an empty name or a chain without ENS.
pub fn update_resolver(l1: &ChainTarget, domain: &Domain) -> Result<ActionRequest, ValidationError> {
    let ens = l1.ens()?;
    if domain.name.is_empty() {
        return Err(ValidationError::MissingDomain);
    }
    let to = if domain.is_wrapped(ens) {
        ens.name_wrapper
    } else {
        ens.ens_registry
    };
    let input = abi::setResolverCall {
        node: domain.node(),
        resolver: ens.l2_resolver,
    }
    .abi_encode();

    Ok(ActionRequest {
        target_chain_id: l1.chain_id,
        call: WriteCall {
            to,
            signature: "setResolver(bytes32,address)",
            input: Bytes::from(input),
            chain_id: l1.chain_id,
        },
        label: "Updated Resolver",
        buttons: ButtonLabels {
            idle: "Update Resolver",
            success: "Success!",
        },
    })
}

/// Write the `registry` text record `"{l2ChainId}:{registry}"` on `domain`.
///
/// # Errors
///
/// Returns a validation error for an empty name, a zero registry or a chain
/// without ENS.
pub fn add_record(
    l1: &ChainTarget,
    domain: &Domain,
    l2: &ChainTarget,
    registry: Address,
) -> Result<ActionRequest, ValidationError> {
    let ens = l1.ens()?;
    validate_target(domain, registry)?;
    let input = abi::setTextCall {
        node: domain.node(),
        key: REGISTRY_TEXT_KEY.to_owned(),
        value: registry_record_value(l2, registry),
    }
    .abi_encode();

    Ok(ActionRequest {
        target_chain_id: l1.chain_id,
        call: WriteCall {
            to: ens.l2_resolver,
            signature: "setText(bytes32,string,string)",
            input: Bytes::from(input),
            chain_id: l1.chain_id,
        },
        label: "Added Record",
        buttons: ButtonLabels {
            idle: "Add Record",
            success: "Success!",
        },
    })
}

/// Point the L1 resolver entry of `domain` at the registry on `l2`.
///
/// # Errors
///
/// Returns a validation error for an empty name, a zero registry or a chain
/// without ENS.
pub fn set_registry(
    l1: &ChainTarget,
    domain: &Domain,
    l2: &ChainTarget,
    registry: Address,
) -> Result<ActionRequest, ValidationError> {
    let ens = l1.ens()?;
    validate_target(domain, registry)?;
    let input = abi::setL2RegistryCall {
        node: domain.node(),
        targetChainId: l2.chain_id,
        targetRegistryAddress: registry,
    }
    .abi_encode();

    Ok(ActionRequest {
        target_chain_id: l1.chain_id,
        call: WriteCall {
            to: ens.l2_resolver,
            signature: "setL2Registry(bytes32,uint64,address)",
            input: Bytes::from(input),
            chain_id: l1.chain_id,
        },
        label: "Set Registry",
        buttons: ButtonLabels {
            idle: "Set Registry",
            success: "Success!",
        },
    })
}

/// Value of the `registry` text record.
#[must_use]
pub fn registry_record_value(l2: &ChainTarget, registry: Address) -> String {
    format!("{}:{registry}", l2.chain_id)
}

/// Address of the registry announced by the factory's `RegistryDeployed`
/// event, if the receipt carries one.
#[must_use]
pub fn registry_address_from_receipt(receipt: &Receipt) -> Option<Address> {
    receipt.logs.iter().find_map(|log| {
        let topics = log.data.topics();
        match topics {
            [sig, registry, ..] if *sig == abi::RegistryDeployed::SIGNATURE_HASH => {
                Some(Address::from_word(*registry))
            }
            _ => None,
        }
    })
}

fn validate_target(domain: &Domain, registry: Address) -> Result<(), ValidationError> {
    if domain.name.is_empty() {
        return Err(ValidationError::MissingDomain);
    }
    if registry.is_zero() {
        return Err(ValidationError::MissingRegistry);
    }
    Ok(())
}
