// Here's a visual aid for the incremental algorithm used by `DepositTree::push`:
// ```text
// height 2           0                   1
//               ┌────┴────┐         ┌────┴────┐
// height 1      0         1         2         3
//             ┌─┴─┐     ┌─┴─┐     ┌─┴─┐     ┌─┴─┐
// height 0    0   1     2   3     4   5     6   7
// ```
// After leaf 5 is pushed, node 2 at height 1 is complete and is the only one still needed to
// compute node 1 at height 2. Node 4 at height 0 was folded into it. One hash per height suffices.

use anyhow::{ensure, Result};
use itertools::Itertools as _;
use thiserror::Error;
use tracing::trace;
use tree_hash::TreeHash as _;
use typenum::Unsigned as _;
use types::phase0::{
    consts::{DepositProofLength, DEPOSIT_CONTRACT_TREE_DEPTH},
    containers::{DepositData, Eth1Data},
    primitives::{DepositIndex, ExecutionBlockHash, H256},
};

const MAX_DEPOSITS: DepositIndex = 1 << DEPOSIT_CONTRACT_TREE_DEPTH;

/// Deposit Merkle tree that can be extended one deposit at a time.
///
/// Roots and proofs always include the deposit count as the last level, matching the
/// `deposit_root` stored in `Eth1Data`.
#[derive(Clone, Default, Debug)]
pub struct DepositTree {
    // `branch[height]` is the left sibling that the next complete subtree of that height will be
    // hashed with. Elements past the highest complete subtree are meaningless.
    branch: [H256; DEPOSIT_CONTRACT_TREE_DEPTH],
    leaves: Vec<H256>,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("deposit tree is full ({MAX_DEPOSITS} deposits)")]
    Full,
    #[error("deposit index mismatch (expected: {expected}, actual: {actual})")]
    IndexMismatch {
        expected: DepositIndex,
        actual: DepositIndex,
    },
    #[error("no deposit with index {index} (deposit count: {deposit_count})")]
    IndexOutOfBounds {
        index: DepositIndex,
        deposit_count: DepositIndex,
    },
}

impl DepositTree {
    #[must_use]
    pub fn deposit_count(&self) -> DepositIndex {
        self.leaves
            .len()
            .try_into()
            .expect("number of deposits is bounded by MAX_DEPOSITS")
    }

    /// Appends `deposit_data` as the deposit with index `index`.
    ///
    /// Deposits must be pushed in order.
    pub fn push(&mut self, index: DepositIndex, deposit_data: DepositData) -> Result<()> {
        let expected = self.deposit_count();

        ensure!(
            index == expected,
            Error::IndexMismatch {
                expected,
                actual: index,
            },
        );

        self.push_leaf(deposit_data.tree_hash_root())
    }

    pub fn push_leaf(&mut self, leaf: H256) -> Result<()> {
        let index = self.deposit_count();

        ensure!(index < MAX_DEPOSITS, Error::Full);

        // The number of trailing ones is the number of subtrees completed by this leaf.
        let completed_subtrees = index
            .trailing_ones()
            .try_into()
            .expect("number of bits in u64 should fit in usize");
        let mut hash = leaf;

        for height in 0..completed_subtrees {
            hash = hashing::hash_256_256(self.branch[height], hash);
        }

        if completed_subtrees < DEPOSIT_CONTRACT_TREE_DEPTH {
            self.branch[completed_subtrees] = hash;
        }

        self.leaves.push(leaf);

        trace!("pushed deposit {index} into deposit tree");

        Ok(())
    }

    /// Returns the root of the tree with the deposit count mixed in.
    #[must_use]
    pub fn root(&self) -> H256 {
        let deposit_count = self.deposit_count();
        let mut size = deposit_count;
        let mut hash = H256::ZERO;

        for height in 0..DEPOSIT_CONTRACT_TREE_DEPTH {
            hash = if size % 2 == 1 {
                hashing::hash_256_256(self.branch[height], hash)
            } else {
                hashing::hash_256_256(hash, hashing::ZERO_HASHES[height])
            };

            size /= 2;
        }

        mix_in_length(hash, deposit_count)
    }

    #[must_use]
    pub fn eth1_data(&self, block_hash: ExecutionBlockHash) -> Eth1Data {
        Eth1Data {
            deposit_root: self.root(),
            deposit_count: self.deposit_count(),
            block_hash,
        }
    }

    /// Constructs a proof of the deposit with index `index` against [`DepositTree::root`].
    ///
    /// The proof lists sibling hashes from the bottom up, followed by the mixed in length.
    pub fn proof(&self, index: DepositIndex) -> Result<[H256; DepositProofLength::USIZE]> {
        let deposit_count = self.deposit_count();

        ensure!(
            index < deposit_count,
            Error::IndexOutOfBounds {
                index,
                deposit_count,
            },
        );

        let mut proof = [H256::ZERO; DepositProofLength::USIZE];
        let mut layer = self.leaves.clone();
        let mut position = usize::try_from(index)?;

        for (height, sibling) in proof.iter_mut().take(DEPOSIT_CONTRACT_TREE_DEPTH).enumerate() {
            *sibling = layer
                .get(position ^ 1)
                .copied()
                .unwrap_or(hashing::ZERO_HASHES[height]);

            layer = layer
                .into_iter()
                .chunks(2)
                .into_iter()
                .map(|mut pair| {
                    let left = pair.next().unwrap_or(hashing::ZERO_HASHES[height]);
                    let right = pair.next().unwrap_or(hashing::ZERO_HASHES[height]);
                    hashing::hash_256_256(left, right)
                })
                .collect();

            position /= 2;
        }

        proof[DEPOSIT_CONTRACT_TREE_DEPTH] = length_chunk(deposit_count);

        Ok(proof)
    }
}

fn mix_in_length(root: H256, length: DepositIndex) -> H256 {
    hashing::hash_256_256(root, length_chunk(length))
}

fn length_chunk(length: DepositIndex) -> H256 {
    let mut chunk = H256::ZERO;
    chunk[..size_of::<DepositIndex>()].copy_from_slice(&length.to_le_bytes());
    chunk
}
