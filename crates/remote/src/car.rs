//! CAR packing: raw bytes to a single-block CARv1 archive.

use crate::error::{RemoteError, RemoteResult};
use bytes::{BufMut, Bytes, BytesMut};
use cid::Cid;
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

/// Multicodec code for raw block data.
const RAW_CODEC: u64 = 0x55;

/// Multicodec code for the SHA2-256 multihash.
const SHA2_256: u64 = 0x12;

/// CARv1 header: dag-cbor `{roots, version}`.
#[derive(Serialize, Deserialize)]
struct CarHeader {
    roots: Vec<Cid>,
    version: u64,
}

/// Wrap raw bytes as a single-block CARv1 archive rooted at their CIDv1.
///
/// The content id is the SHA-256 of the raw bytes wrapped as a v1 raw-codec
/// CID, so the backend and any IPFS gateway derive the same id from the same
/// bytes. Pure and synchronous; errors here are programmer errors.
pub fn pack(data: &[u8]) -> RemoteResult<(Bytes, String)> {
    let digest = Sha256::digest(data);
    let multihash = cid::multihash::Multihash::<64>::wrap(SHA2_256, digest.as_slice())
        .map_err(|e| RemoteError::Pack(e.to_string()))?;
    let root = Cid::new_v1(RAW_CODEC, multihash);

    let header = serde_ipld_dagcbor::to_vec(&CarHeader {
        roots: vec![root],
        version: 1,
    })
    .map_err(|e| RemoteError::Pack(e.to_string()))?;

    let cid_bytes = root.to_bytes();
    let mut payload = BytesMut::with_capacity(header.len() + cid_bytes.len() + data.len() + 16);
    put_varint(&mut payload, header.len() as u64);
    payload.put_slice(&header);
    put_varint(&mut payload, (cid_bytes.len() + data.len()) as u64);
    payload.put_slice(&cid_bytes);
    payload.put_slice(data);

    Ok((payload.freeze(), root.to_string()))
}

fn put_varint(buf: &mut BytesMut, value: u64) {
    let mut varint = unsigned_varint::encode::u64_buffer();
    buf.put_slice(unsigned_varint::encode::u64(value, &mut varint));
}
