//! Call message types for the auction module.

use auction_types::{BidIndex, EncryptedInput, InputProof};
use borsh::{BorshDeserialize, BorshSerialize};

/// Call messages for the auction module.
#[derive(Clone, Debug, BorshSerialize, BorshDeserialize)]
pub enum AuctionCall {
    // === Auction Lifecycle ===
    /// Open a new auction (administrator only).
    CreateAuction {
        duration: u64,
        metadata_reference: String,
    },

    /// Submit an encrypted bid: amount and bidder identity, each with the
    /// proof binding it to this contract and the sender.
    SubmitBid {
        encrypted_amount: EncryptedInput,
        encrypted_identity: EncryptedInput,
        amount_proof: InputProof,
        identity_proof: InputProof,
    },

    // === Finalization ===
    /// Finalize the ended auction in a single call.
    SmartFinalize,

    /// Fold as many bids as the compute ceiling allows; repeat until done.
    FinalizeBatch,

    // === Post-finalization ===
    /// Publish the decrypted winner index (decryption oracle only).
    PublishWinner {
        generation: u64,
        winner_index: BidIndex,
    },

    /// Acknowledge that the prize was minted (minter only).
    RecordMint { generation: u64 },
}

impl AuctionCall {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::CreateAuction { .. } => "create_auction",
            Self::SubmitBid { .. } => "submit_bid",
            Self::SmartFinalize => "smart_finalize",
            Self::FinalizeBatch => "finalize_batch",
            Self::PublishWinner { .. } => "publish_winner",
            Self::RecordMint { .. } => "record_mint",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auction_types::ValueKind;

    #[test]
    fn test_call_borsh_encoding() {
        let call = AuctionCall::SubmitBid {
            encrypted_amount: EncryptedInput {
                kind: ValueKind::Uint64,
                envelope: vec![1; 36],
            },
            encrypted_identity: EncryptedInput {
                kind: ValueKind::Address,
                envelope: vec![2; 60],
            },
            amount_proof: InputProof(vec![3; 33]),
            identity_proof: InputProof(vec![4; 33]),
        };

        let bytes = borsh::to_vec(&call).unwrap();
        let decoded: AuctionCall = borsh::from_slice(&bytes).unwrap();
        let AuctionCall::SubmitBid { encrypted_identity, identity_proof, .. } = decoded else {
            panic!("wrong variant");
        };
        assert_eq!(encrypted_identity.kind, ValueKind::Address);
        assert_eq!(identity_proof.0, vec![4; 33]);
    }

    #[test]
    fn test_call_names() {
        assert_eq!(AuctionCall::SmartFinalize.name(), "smart_finalize");
        assert_eq!(AuctionCall::RecordMint { generation: 1 }.name(), "record_mint");
    }
}
