use alloy_primitives::{Address, U256, uint};
use alloy_sol_types::sol;

sol! {
    /// Emitted by the pool configurator when a reserve is initialized.
    event ReserveInitialized(
        address indexed asset,
        address indexed aToken,
        address stableDebtToken,
        address variableDebtToken,
        address interestRateStrategyAddress
    );

    /// Emitted by the pool whenever a reserve's rates and indexes are updated.
    event ReserveDataUpdated(
        address indexed reserve,
        uint256 liquidityRate,
        uint256 stableBorrowRate,
        uint256 variableBorrowRate,
        uint256 liquidityIndex,
        uint256 variableBorrowIndex
    );

    event Transfer(address indexed from, address indexed to, uint256 value);

    /// Subset of the market-token (aToken) interface read by the monitor.
    interface IMarketToken {
        function scaledTotalSupply() external view returns (uint256);
        function totalSupply() external view returns (uint256);
        function symbol() external view returns (string);
        function decimals() external view returns (uint8);
    }
}

/// Liquidity index fixed point scale (27 decimals).
pub const RAY: U256 = uint!(1_000_000_000_000_000_000_000_000_000_U256);

/// Number of 32-byte words in a `ReserveDataUpdated` payload.
pub const RESERVE_DATA_WORDS: usize = 5;

/// Position of `liquidityIndex` in the `ReserveDataUpdated` payload.
pub const LIQUIDITY_INDEX_WORD: usize = 3;

/// Sender of a mint in the `Transfer` event.
pub const MINT_SENDER: Address = Address::ZERO;

pub const DEFAULT_SYMBOL: &str = "UNKNOWN";

pub const DEFAULT_DECIMALS: u8 = 18;

/// 10^77 is the largest power of ten that fits in 256 bits.
pub const MAX_DECIMALS: u8 = 77;

/// Selector of `initReserves` as observed on deployed configurators.
pub const INIT_RESERVES_SELECTOR: [u8; 4] = [0x02, 0xfb, 0x45, 0xe6];
