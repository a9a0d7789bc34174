use crate::model::FileLocation;
use anyhow::Result;

pub const DEFAULT_CHUNK_SIZE: u32 = 512 * 1024;
pub const MAX_CHUNK_SIZE: u32 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkResponse {
    Bytes(Vec<u8>),
    /// The object lives behind a CDN data center this client cannot talk to.
    Redirect { dc_id: i32 },
}

/// One bounded range read against a remote document.
///
/// Implementations are stateless per call and must not retry: a failed request
/// is returned as-is and the caller decides what happens to the file.
pub trait ChunkTransport {
    fn fetch_range(&self, location: &FileLocation, offset: u64, limit: u32)
    -> Result<ChunkResponse>;
}

impl<T: ChunkTransport + ?Sized> ChunkTransport for &T {
    fn fetch_range(
        &self,
        location: &FileLocation,
        offset: u64,
        limit: u32,
    ) -> Result<ChunkResponse> {
        (**self).fetch_range(location, offset, limit)
    }
}
