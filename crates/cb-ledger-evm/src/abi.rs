//! ABI codec for the deployed CarbonNFT contract.
//!
//! Every call the application makes is encoded and decoded here, so both the
//! native JSON-RPC client and the browser provider ledger share one source of
//! truth for the contract interface.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{SolCall, sol};
use cb_api_types::AccountAddress;
use cb_ledger::{LedgerError, ProjectData};

sol! {
    function projectCounter() external view returns (uint256 count);
    function tokenCounter() external view returns (uint256 count);
    function getProjectData(uint256 projectId) external view returns (string registryProjectId, string ipfsCID, string location, string projectName);
    function ownerOf(uint256 tokenId) external view returns (address owner);
    function isRetired(uint256 tokenId) external view returns (bool retired);
    function tokenToProject(uint256 tokenId) external view returns (uint256 projectId);
    function bridgedProjectIds(string registryProjectId) external view returns (bool bridged);
    function tokenURI(uint256 tokenId) external view returns (string uri);
    function createProject(string registryProjectId, string ipfsCID, string location, string projectName) external;
    function mintNFT(address to, string ipfsCID, string location, string projectName) external;
    function mintBatch(address to, uint256 projectId, uint256 amount) external;
    function retire(uint256 tokenId) external;
    function transferFrom(address from, address to, uint256 tokenId) external;
}

fn decode_err(err: alloy_sol_types::Error) -> LedgerError {
    LedgerError::Decode(err.to_string())
}

fn u256_to_u64(value: U256) -> Result<u64, LedgerError> {
    u64::try_from(value).map_err(|_| LedgerError::Decode("uint256 exceeds u64".to_string()))
}

/// Parse an [`AccountAddress`] into a 20-byte EVM address.
pub fn parse_address(account: &AccountAddress) -> Result<Address, LedgerError> {
    account
        .as_str()
        .parse::<Address>()
        .map_err(|e| LedgerError::Decode(format!("bad address {account}: {e}")))
}

/// Render an EVM address in the lowercase `0x` form used on the wire.
pub fn format_address(address: Address) -> String {
    format!("{address:#x}")
}

// ── Reads ──

pub fn encode_project_counter() -> Vec<u8> {
    projectCounterCall {}.abi_encode()
}

pub fn decode_project_counter(data: &[u8]) -> Result<u64, LedgerError> {
    u256_to_u64(projectCounterCall::abi_decode_returns(data).map_err(decode_err)?)
}

pub fn encode_token_counter() -> Vec<u8> {
    tokenCounterCall {}.abi_encode()
}

pub fn decode_token_counter(data: &[u8]) -> Result<u64, LedgerError> {
    u256_to_u64(tokenCounterCall::abi_decode_returns(data).map_err(decode_err)?)
}

pub fn encode_get_project_data(project_id: u64) -> Vec<u8> {
    getProjectDataCall {
        projectId: U256::from(project_id),
    }
    .abi_encode()
}

pub fn decode_get_project_data(data: &[u8]) -> Result<ProjectData, LedgerError> {
    let ret = getProjectDataCall::abi_decode_returns(data).map_err(decode_err)?;
    Ok(ProjectData {
        registry_project_id: ret.registryProjectId,
        content_pointer: ret.ipfsCID,
        location: ret.location,
        name: ret.projectName,
    })
}

pub fn encode_owner_of(token_id: u64) -> Vec<u8> {
    ownerOfCall {
        tokenId: U256::from(token_id),
    }
    .abi_encode()
}

pub fn decode_owner_of(data: &[u8]) -> Result<AccountAddress, LedgerError> {
    let owner = ownerOfCall::abi_decode_returns(data).map_err(decode_err)?;
    Ok(AccountAddress::new(&format_address(owner)))
}

pub fn encode_is_retired(token_id: u64) -> Vec<u8> {
    isRetiredCall {
        tokenId: U256::from(token_id),
    }
    .abi_encode()
}

pub fn decode_is_retired(data: &[u8]) -> Result<bool, LedgerError> {
    isRetiredCall::abi_decode_returns(data).map_err(decode_err)
}

pub fn encode_token_to_project(token_id: u64) -> Vec<u8> {
    tokenToProjectCall {
        tokenId: U256::from(token_id),
    }
    .abi_encode()
}

pub fn decode_token_to_project(data: &[u8]) -> Result<u64, LedgerError> {
    u256_to_u64(tokenToProjectCall::abi_decode_returns(data).map_err(decode_err)?)
}

pub fn encode_bridged_project_ids(registry_project_id: &str) -> Vec<u8> {
    bridgedProjectIdsCall {
        registryProjectId: registry_project_id.to_string(),
    }
    .abi_encode()
}

pub fn decode_bridged_project_ids(data: &[u8]) -> Result<bool, LedgerError> {
    bridgedProjectIdsCall::abi_decode_returns(data).map_err(decode_err)
}

pub fn encode_token_uri(token_id: u64) -> Vec<u8> {
    tokenURICall {
        tokenId: U256::from(token_id),
    }
    .abi_encode()
}

pub fn decode_token_uri(data: &[u8]) -> Result<String, LedgerError> {
    tokenURICall::abi_decode_returns(data).map_err(decode_err)
}

// ── Mutations ──

pub fn encode_create_project(data: &ProjectData) -> Vec<u8> {
    createProjectCall {
        registryProjectId: data.registry_project_id.clone(),
        ipfsCID: data.content_pointer.clone(),
        location: data.location.clone(),
        projectName: data.name.clone(),
    }
    .abi_encode()
}

pub fn encode_mint_nft(
    to: Address,
    content_pointer: &str,
    location: &str,
    name: &str,
) -> Vec<u8> {
    mintNFTCall {
        to,
        ipfsCID: content_pointer.to_string(),
        location: location.to_string(),
        projectName: name.to_string(),
    }
    .abi_encode()
}

pub fn encode_mint_batch(to: Address, project_id: u64, amount: u32) -> Vec<u8> {
    mintBatchCall {
        to,
        projectId: U256::from(project_id),
        amount: U256::from(amount),
    }
    .abi_encode()
}

pub fn encode_retire(token_id: u64) -> Vec<u8> {
    retireCall {
        tokenId: U256::from(token_id),
    }
    .abi_encode()
}

pub fn encode_transfer_from(from: Address, to: Address, token_id: u64) -> Vec<u8> {
    transferFromCall {
        from,
        to,
        tokenId: U256::from(token_id),
    }
    .abi_encode()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ERC-721 selectors are standardized; if these match, the sol!
    // declarations are well-formed.
    #[test]
    fn erc721_selectors_match_the_standard() {
        assert_eq!(ownerOfCall::SELECTOR, [0x63, 0x52, 0x21, 0x1e]);
        assert_eq!(transferFromCall::SELECTOR, [0x23, 0xb8, 0x72, 0xdd]);
        assert_eq!(tokenURICall::SELECTOR, [0xc8, 0x7b, 0x56, 0xdd]);
    }

    #[test]
    fn owner_of_encoding_is_selector_plus_word() {
        let data = encode_owner_of(1);
        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], &[0x63, 0x52, 0x21, 0x1e]);
        assert_eq!(data[4 + 31], 1);
        assert!(data[4..4 + 31].iter().all(|b| *b == 0));
    }

    #[test]
    fn address_parsing_round_trips() {
        let account = AccountAddress::new("0x00000000000000000000000000000000000000ff");
        let parsed = parse_address(&account).unwrap();
        assert_eq!(format_address(parsed), account.as_str());
    }

    #[test]
    fn bad_address_is_a_decode_error() {
        let err = parse_address(&AccountAddress::new("not-an-address")).unwrap_err();
        assert!(matches!(err, LedgerError::Decode(_)));
    }
}
