//! Content hashing for data objects: BLAKE3 digests wrapped as base-58 multihashes.

use std::path::Path;
use tokio::io::AsyncReadExt;

/// Multihash function code for BLAKE3.
const BLAKE3_CODE: u64 = 0x1e;

const CHUNK_SIZE: usize = 64 * 1024;

/// Streams `path` through BLAKE3 and returns the base-58 encoded multihash.
/// Memory use is bounded by the chunk buffer regardless of file size.
pub async fn hash_file(path: &Path) -> std::io::Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = vec![0u8; CHUNK_SIZE];

    loop {
        let read = file.read(&mut buf).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }

    Ok(encode_multihash(hasher.finalize().as_bytes()))
}

pub fn hash_bytes(bytes: &[u8]) -> String {
    encode_multihash(blake3::hash(bytes).as_bytes())
}

fn encode_multihash(digest: &[u8]) -> String {
    let mut out = Vec::with_capacity(digest.len() + 4);
    write_varint(&mut out, BLAKE3_CODE);
    write_varint(&mut out, digest.len() as u64);
    out.extend_from_slice(digest);
    bs58::encode(out).into_string()
}

/// Unsigned LEB128, as used by multihash headers.
fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn varint_encoding() {
        let mut out = Vec::new();
        write_varint(&mut out, 0x1e);
        assert_eq!(out, vec![0x1e]);

        out.clear();
        write_varint(&mut out, 300);
        assert_eq!(out, vec![0xac, 0x02]);
    }

    #[test]
    fn multihash_header_and_digest() {
        let encoded = hash_bytes(b"hello world");
        let raw = bs58::decode(&encoded).into_vec().unwrap();
        assert_eq!(raw[0], 0x1e);
        assert_eq!(raw[1], 32);
        assert_eq!(&raw[2..], blake3::hash(b"hello world").as_bytes());
    }

    #[test]
    fn same_content_same_hash() {
        assert_eq!(hash_bytes(b"abc"), hash_bytes(b"abc"));
        assert_ne!(hash_bytes(b"abc"), hash_bytes(b"abd"));
    }

    #[tokio::test]
    async fn streamed_file_matches_in_memory_hash() {
        // Spans several chunks with a ragged tail.
        let data: Vec<u8> = (0..(CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&data).unwrap();

        let streamed = hash_file(file.path()).await.unwrap();
        assert_eq!(streamed, hash_bytes(&data));
        assert_eq!(hash_file(file.path()).await.unwrap(), streamed);
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        assert!(hash_file(Path::new("/no/such/file.bin")).await.is_err());
    }
}
