// SPDX-License-Identifier: MPL-2.0

//! On-disk binary format for the identity index
//!
//! Layout:
//!
//! ```text
//! header: magic(4) version(u16) dimension(u32) count(u32)
//! record[count]: id_len(u16) id_bytes(id_len) vector(dimension * f32 LE)
//! ```
//!
//! All integers are little-endian. This is a bespoke format rather than a
//! general-purpose serialization crate because the index is a flat array
//! of fixed-width float vectors keyed by a short string id — a format
//! that reads back as a single buffered pass with no intermediate
//! allocation per record.

use crate::errors::IdentityError;
use std::io::{Read, Write};

const MAGIC: &[u8; 4] = b"FTSI";
const VERSION: u16 = 1;

pub struct IndexRecord {
    pub id: String,
    pub vector: Vec<f32>,
}

pub fn write_index<W: Write>(writer: &mut W, dimension: usize, records: &[IndexRecord]) -> Result<(), IdentityError> {
    writer.write_all(MAGIC)?;
    writer.write_all(&VERSION.to_le_bytes())?;
    writer.write_all(&(dimension as u32).to_le_bytes())?;
    writer.write_all(&(records.len() as u32).to_le_bytes())?;

    for record in records {
        if record.vector.len() != dimension {
            return Err(IdentityError::DimensionMismatch {
                expected: dimension,
                actual: record.vector.len(),
            });
        }
        let id_bytes = record.id.as_bytes();
        writer.write_all(&(id_bytes.len() as u16).to_le_bytes())?;
        writer.write_all(id_bytes)?;
        for value in &record.vector {
            writer.write_all(&value.to_le_bytes())?;
        }
    }
    Ok(())
}

pub fn read_index<R: Read>(reader: &mut R) -> Result<(usize, Vec<IndexRecord>), IdentityError> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(IdentityError::Corrupt("bad magic".to_string()));
    }

    let mut u16_buf = [0u8; 2];
    reader.read_exact(&mut u16_buf)?;
    let version = u16::from_le_bytes(u16_buf);
    if version != VERSION {
        return Err(IdentityError::Corrupt(format!("unsupported version {version}")));
    }

    let mut u32_buf = [0u8; 4];
    reader.read_exact(&mut u32_buf)?;
    let dimension = u32::from_le_bytes(u32_buf) as usize;
    reader.read_exact(&mut u32_buf)?;
    let count = u32::from_le_bytes(u32_buf) as usize;

    let mut records = Vec::with_capacity(count);
    for _ in 0..count {
        reader.read_exact(&mut u16_buf)?;
        let id_len = u16::from_le_bytes(u16_buf) as usize;
        let mut id_bytes = vec![0u8; id_len];
        reader.read_exact(&mut id_bytes)?;
        let id = String::from_utf8(id_bytes)
            .map_err(|e| IdentityError::Corrupt(format!("invalid id utf-8: {e}")))?;

        let mut vector = Vec::with_capacity(dimension);
        let mut f32_buf = [0u8; 4];
        for _ in 0..dimension {
            reader.read_exact(&mut f32_buf)?;
            vector.push(f32::from_le_bytes(f32_buf));
        }
        records.push(IndexRecord { id, vector });
    }

    Ok((dimension, records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_round_trip() {
        let records = vec![
            IndexRecord { id: "alice".to_string(), vector: vec![0.1, 0.2, 0.3] },
            IndexRecord { id: "bob".to_string(), vector: vec![0.4, 0.5, 0.6] },
        ];
        let mut buf = Vec::new();
        write_index(&mut buf, 3, &records).unwrap();

        let (dimension, read_back) = read_index(&mut Cursor::new(buf)).unwrap();
        assert_eq!(dimension, 3);
        assert_eq!(read_back.len(), 2);
        assert_eq!(read_back[0].id, "alice");
        assert_eq!(read_back[1].vector, vec![0.4, 0.5, 0.6]);
    }

    #[test]
    fn test_write_rejects_dimension_mismatch() {
        let records = vec![IndexRecord { id: "alice".to_string(), vector: vec![0.1, 0.2] }];
        let mut buf = Vec::new();
        assert!(write_index(&mut buf, 3, &records).is_err());
    }

    #[test]
    fn test_read_rejects_bad_magic() {
        let mut buf = Cursor::new(vec![0u8; 20]);
        assert!(read_index(&mut buf).is_err());
    }
}
