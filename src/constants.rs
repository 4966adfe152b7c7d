/// Application constants

// API version
pub const API_VERSION: &str = "v1";

// Query key namespaces
pub const QUERY_NAMESPACE_NAME_TRADE: &str = "nameTrade";
pub const QUERY_NAMESPACE_NFT: &str = "nft";

// Chains (Base)
pub const BASE_MAINNET_CHAIN_ID: u64 = 8453;
pub const BASE_SEPOLIA_CHAIN_ID: u64 = 84532;
pub const BASE_MAINNET_CHAIN_NAME: &str = "Base";
pub const BASE_SEPOLIA_CHAIN_NAME: &str = "Base Sepolia";
pub const BASE_MAINNET_EXPLORER_URL: &str = "https://basescan.org";
pub const BASE_SEPOLIA_EXPLORER_URL: &str = "https://sepolia.basescan.org";
pub const DEFAULT_BASE_MAINNET_RPC_URL: &str = "https://mainnet.base.org";
pub const DEFAULT_BASE_SEPOLIA_RPC_URL: &str = "https://sepolia.base.org";

// Native currency
pub const NATIVE_CURRENCY_NAME: &str = "Ether";
pub const NATIVE_CURRENCY_SYMBOL: &str = "ETH";
pub const NATIVE_CURRENCY_DECIMALS: u8 = 18;

// Contract addresses
pub const DEFAULT_TESTNET_CONTRACT_ADDRESS: &str = "0x2A6f460129DBAeB66Fda5FcbD5b3b0CCf7791Bfd";

// Marketplace fee (basis points), mirrors PLATFORM_FEE_BPS on-chain
pub const PLATFORM_FEE_BPS: u64 = 500;

// EIP-1193 provider error codes
pub const EIP1193_USER_REJECTED: i64 = 4001;
pub const EIP1193_UNRECOGNIZED_CHAIN: i64 = 4902;

// Chain switch recovery
pub const CHAIN_SWITCH_POLL_ATTEMPTS_DEFAULT: usize = 10;
pub const CHAIN_SWITCH_POLL_INTERVAL_MS_DEFAULT: u64 = 250;

// Receipt polling
pub const RECEIPT_POLL_ATTEMPTS_DEFAULT: usize = 60;
pub const RECEIPT_POLL_INTERVAL_MS_DEFAULT: u64 = 2_000;

// Read cache
pub const QUERY_CACHE_TTL_SECS_DEFAULT: u64 = 30;

// Display-name lookup (GraphQL indexing API)
pub const DEFAULT_COLLECTION_ITEMS_ENDPOINT: &str = "https://gql.opensea.io/graphql";
pub const DEFAULT_COLLECTION_SLUG: &str = "basenames";
pub const NAME_LOOKUP_TIMEOUT_SECS: u64 = 5;
