// External providers: chain RPC, wallet endpoint, collection indexing API
pub mod name_lookup;
pub mod rpc;
pub mod wallet;

pub use name_lookup::NameLookup;
pub use rpc::{EthersReadClient, ReadClient, ReceiptPolicy};
pub use wallet::{ContractCall, JsonRpcWallet, WalletClient, WalletError};
