//! Well-known addresses and constants on Base mainnet.

use alloy_primitives::{address, Address};

/// Base mainnet chain id.
pub const BASE_CHAIN_ID: u64 = 8453;

/// ERC-4337 EntryPoint v0.6.
pub const ENTRY_POINT_V06: Address =
    address!("5ff137d4b0fdcd49dca30c7cf57e578a026d2789");

/// SimpleAccountFactory paired with EntryPoint v0.6.
pub const SIMPLE_ACCOUNT_FACTORY: Address =
    address!("9406cc6185a346906296840746125a0e44976454");

/// Wrapped ether on Base.
pub const WETH: Address = address!("4200000000000000000000000000000000000006");

/// Native USDC on Base.
pub const USDC: Address = address!("833589fcd6edb6e08f4c7c32d4f71b54bda02913");

/// USDC decimals.
pub const USDC_DECIMALS: u8 = 6;

/// Sentinel the aggregator uses for native ETH.
pub const NATIVE_TOKEN: Address =
    address!("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");

/// Default recipient of the swap integrator fee.
pub const DEFAULT_FEE_RECIPIENT: Address =
    address!("4fba95e4772be6d37a0c931d00570fe2c9675524");

/// Salt used for every Vault created through the factory.
pub const ACCOUNT_SALT: u64 = 0;

/// Signature-shaped placeholder accepted by SimpleAccount during gas
/// estimation. It recovers to a random address but has a valid length and
/// `v` byte, so validation gas is representative.
pub const SIMPLE_ACCOUNT_DUMMY_SIGNATURE: &str =
    "0xfffffffffffffffffffffffffffffff0000000000000000000000000000000007aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa1c";
