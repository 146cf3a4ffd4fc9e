use mirror_domain::MirrorError;

/// The mirror has no view of pending transactions, so both mempool endpoints
/// are permanent `NotImplemented`.
pub struct MempoolApiService;

impl MempoolApiService {
    pub fn mempool(&self) -> Result<(), MirrorError> {
        Err(MirrorError::NotImplemented)
    }

    pub fn mempool_transaction(&self) -> Result<(), MirrorError> {
        Err(MirrorError::NotImplemented)
    }
}
