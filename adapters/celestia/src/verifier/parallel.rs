use rayon::prelude::{IntoParallelRefIterator, ParallelIterator};
use tracing::{info, warn};

use super::{check_tx, verify_placed_tx, ChainParams, CheckedTx, PlacedBlobTx, ValidationError};
use crate::config::BlobVerifierConfig;

#[derive(Debug, thiserror::Error)]
pub enum BlockValidationError {
    #[error("transaction {index} of the block is invalid: {source}")]
    InvalidTx {
        index: usize,
        #[source]
        source: ValidationError,
    },

    #[error("invalid chain parameters: {0}")]
    InvalidParams(#[source] ValidationError),

    #[error("failed to start the verification pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Verifies the blob transactions of a block on a dedicated thread pool.
///
/// Transactions are independent of each other, so they are checked concurrently. The block
/// is rejected as a whole, reporting the first transaction, in block order, that failed.
pub struct BlockVerifier {
    params: ChainParams,
    pool: rayon::ThreadPool,
}

impl BlockVerifier {
    /// Creates a verifier with `num_threads` workers. Zero lets rayon pick one per core.
    pub fn new(params: ChainParams, num_threads: usize) -> Result<Self, BlockValidationError> {
        params
            .validate()
            .map_err(BlockValidationError::InvalidParams)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .thread_name(|index| format!("blob-verifier-{}", index))
            .build()?;
        info!(
            threads = pool.current_num_threads(),
            max_square_size = params.max_square_size,
            "Started blob verification pool"
        );
        Ok(Self { params, pool })
    }

    pub fn from_config(config: &BlobVerifierConfig) -> Result<Self, BlockValidationError> {
        Self::new(config.chain.clone(), config.num_threads)
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    /// Checks every blob of every transaction against its placement in a square of width
    /// `square_size`
    pub fn verify_block(
        &self,
        square_size: usize,
        txs: &[PlacedBlobTx],
    ) -> Result<(), BlockValidationError> {
        let params = &self.params;
        let results: Vec<Result<(), ValidationError>> = self.pool.install(|| {
            txs.par_iter()
                .map(|tx| verify_placed_tx(tx, square_size, params))
                .collect()
        });

        for (index, result) in results.into_iter().enumerate() {
            if let Err(source) = result {
                warn!(index, error = %source, "Rejected block");
                return Err(BlockValidationError::InvalidTx { index, source });
            }
        }
        Ok(())
    }

    /// Runs the admission check on a batch of raw transactions. Results are in input order.
    pub fn check_txs(&self, raw_txs: &[Vec<u8>]) -> Vec<Result<CheckedTx, ValidationError>> {
        let params = &self.params;
        self.pool.install(|| {
            raw_txs
                .par_iter()
                .map(|raw| check_tx(raw, params))
                .collect()
        })
    }
}
