use sha2::{Digest, Sha256};
use std::io::{self, Read, Write};

/// Upper bound on a decoded length prefix; bodies are small and this keeps a
/// corrupt prefix from allocating gigabytes.
pub const MAX_SEQUENCE_LEN: u32 = 16 * 1024 * 1024;

/// Trait for objects that have a canonical binary representation for Hashing/Signing.
/// careful: This must be deterministic across platforms/versions.
pub trait CanonicalSerialize {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()>;

    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.canonical_serialize(&mut buf).expect("memory write failed");
        buf
    }

    /// SHA-256 of the canonical bytes.
    fn digest(&self) -> [u8; 32] {
        Sha256::digest(self.to_bytes()).into()
    }
}

pub trait CanonicalDeserialize: Sized {
    fn canonical_deserialize<R: Read>(reader: &mut R) -> io::Result<Self>;

    /// Decode and require that every byte was consumed.
    fn from_canonical_bytes(bytes: &[u8]) -> io::Result<Self> {
        let mut cursor = bytes;
        let value = Self::canonical_deserialize(&mut cursor)?;
        if !cursor.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("{} trailing bytes", cursor.len()),
            ));
        }
        Ok(value)
    }
}

// --- Primitives ---

impl CanonicalSerialize for u8 {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&[*self])
    }
}

impl CanonicalSerialize for u32 {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_le_bytes())
    }
}

impl CanonicalSerialize for u64 {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.to_le_bytes())
    }
}

impl<T: CanonicalSerialize> CanonicalSerialize for Vec<T> {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let len = u32::try_from(self.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "sequence too long"))?;
        writer.write_all(&len.to_le_bytes())?;
        for item in self {
            item.canonical_serialize(writer)?;
        }
        Ok(())
    }
}

impl<const N: usize> CanonicalSerialize for [u8; N] {
    fn canonical_serialize<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(self)
    }
}

impl CanonicalDeserialize for u8 {
    fn canonical_deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; 1];
        reader.read_exact(&mut buf)?;
        Ok(buf[0])
    }
}

impl CanonicalDeserialize for u32 {
    fn canonical_deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }
}

impl CanonicalDeserialize for u64 {
    fn canonical_deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; 8];
        reader.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

impl<T: CanonicalDeserialize> CanonicalDeserialize for Vec<T> {
    fn canonical_deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        let len = u32::canonical_deserialize(reader)?;
        if len > MAX_SEQUENCE_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("sequence length {} exceeds limit", len),
            ));
        }
        let mut items = Vec::with_capacity(len.min(4096) as usize);
        for _ in 0..len {
            items.push(T::canonical_deserialize(reader)?);
        }
        Ok(items)
    }
}

impl<const N: usize> CanonicalDeserialize for [u8; N] {
    fn canonical_deserialize<R: Read>(reader: &mut R) -> io::Result<Self> {
        let mut buf = [0u8; N];
        reader.read_exact(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        assert_eq!(0x0102_0304u32.to_bytes(), vec![4, 3, 2, 1]);
        assert_eq!(1u64.to_bytes(), vec![1, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(vec![0xaau8, 0xbb].to_bytes(), vec![2, 0, 0, 0, 0xaa, 0xbb]);
        assert_eq!([9u8; 3].to_bytes(), vec![9, 9, 9]);
    }

    #[test]
    fn test_decode_rejects_short_and_trailing_input() {
        assert!(u64::from_canonical_bytes(&[1, 2, 3]).is_err());
        assert!(u32::from_canonical_bytes(&[1, 0, 0, 0, 0]).is_err());
        // length prefix says 5, only 1 byte follows
        assert!(Vec::<u8>::from_canonical_bytes(&[5, 0, 0, 0, 1]).is_err());
        assert!(Vec::<u8>::from_canonical_bytes(&[0xff, 0xff, 0xff, 0xff]).is_err());
        assert_eq!(Vec::<u8>::from_canonical_bytes(&[0, 0, 0, 0]).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn test_digest_is_sha256_of_bytes() {
        let value = vec![1u8, 2, 3];
        let expected: [u8; 32] = Sha256::digest(value.to_bytes()).into();
        assert_eq!(value.digest(), expected);
    }
}
