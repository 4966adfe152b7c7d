use ethers::abi::Token;

use crate::error::{AppError, Result};

use super::contract_config::ResolveOptions;
use super::decoder::decode_bool;
use super::mutations::{self, ApprovalForAllVariables, ListVariables, StartAuctionVariables};
use super::normalizer::{checksum, normalize_address};
use super::write_pipeline::{resolve_account, WritePipeline, WriteResult};

impl WritePipeline {
    /// Grants the marketplace operator rights over `nft` for the connected
    /// account when it does not hold them yet, and waits for that receipt.
    ///
    /// Returns the approval write when one was needed.
    pub async fn ensure_marketplace_approval(
        &self,
        nft: &str,
        options: &ResolveOptions,
    ) -> Result<Option<WriteResult>> {
        let collection = normalize_address(nft)?;
        let config = self.registry().contract_config(options);
        let reader = self.registry().read_client(options)?;
        let wallet = self
            .registry()
            .wallet_client(options)
            .ok_or(AppError::WalletUnavailable)?;
        let owner = resolve_account(wallet.as_ref()).await?;

        let output = reader
            .read_contract(
                collection,
                &config.collection_abi,
                "isApprovedForAll",
                vec![Token::Address(owner), Token::Address(config.contract_address)],
            )
            .await?;
        if decode_bool(output, "isApprovedForAll")? {
            tracing::debug!("{} already approved for {}", checksum(&config.contract_address), checksum(&owner));
            return Ok(None);
        }

        tracing::info!("Approving marketplace on collection {}", checksum(&collection));
        let approval = self
            .execute_with_chain_retry(
                &mutations::set_approval_for_all(),
                ApprovalForAllVariables {
                    nft: nft.to_string(),
                    operator: checksum(&config.contract_address),
                    approved: true,
                },
                options,
            )
            .await?;
        approval.wait_for_receipt().await?;
        Ok(Some(approval))
    }

    pub async fn list_with_approval(
        &self,
        variables: ListVariables,
        options: &ResolveOptions,
    ) -> Result<WriteResult> {
        self.ensure_marketplace_approval(&variables.nft, options).await?;
        self.execute_with_chain_retry(&mutations::list(), variables, options)
            .await
    }

    pub async fn start_auction_with_approval(
        &self,
        variables: StartAuctionVariables,
        options: &ResolveOptions,
    ) -> Result<WriteResult> {
        self.ensure_marketplace_approval(&variables.nft, options).await?;
        self.execute_with_chain_retry(&mutations::start_auction(), variables, options)
            .await
    }
}
