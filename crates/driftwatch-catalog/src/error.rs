use driftwatch_evidence::EvidenceError;

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Evidence(#[from] EvidenceError),

    #[error("sanity check failed: no tool blocks found")]
    NoToolBlocks,
}
