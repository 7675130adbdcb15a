//! Minimal reader/writer for NumPy `.npy` files holding 2-D float arrays.
//!
//! Precomputed feature files are produced by Python tooling, so the cache
//! layer speaks the same format. Only little-endian `f4`/`f8` arrays in C
//! order are supported.

use thiserror::Error;

const MAGIC: &[u8] = b"\x93NUMPY";
const HEADER_ALIGNMENT: usize = 64;

#[derive(Debug, Error)]
pub enum NpyError {
    #[error("Not an npy file")]
    BadMagic,

    #[error("Unsupported npy version {0}.{1}")]
    UnsupportedVersion(u8, u8),

    #[error("Truncated npy data")]
    Truncated,

    #[error("Malformed npy header: {0}")]
    Header(String),

    #[error("Unsupported array layout: {0}")]
    Unsupported(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dtype {
    Float32,
    Float64,
}

impl Dtype {
    /// NumPy's name for the type, as reported by `str(array.dtype)`.
    pub fn name(&self) -> &'static str {
        match self {
            Dtype::Float32 => "float32",
            Dtype::Float64 => "float64",
        }
    }

    fn descr(&self) -> &'static str {
        match self {
            Dtype::Float32 => "<f4",
            Dtype::Float64 => "<f8",
        }
    }

    fn width(&self) -> usize {
        match self {
            Dtype::Float32 => 4,
            Dtype::Float64 => 8,
        }
    }

    fn from_descr(descr: &str) -> Result<Dtype, NpyError> {
        match descr {
            "<f4" | "f4" | "float32" => Ok(Dtype::Float32),
            "<f8" | "f8" | "float64" => Ok(Dtype::Float64),
            other => Err(NpyError::Unsupported(format!("dtype {}", other))),
        }
    }
}

/// A decoded 2-D array. Values are widened to f64 regardless of dtype.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyMatrix {
    pub shape: (usize, usize),
    pub dtype: Dtype,
    pub values: Vec<f64>,
}

struct Header {
    descr: String,
    fortran_order: bool,
    shape: Vec<usize>,
}

fn quoted_value_after<'a>(header: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let rest = value_after(header, key)?;
    let quote = rest
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| NpyError::Header(format!("{} is not a string", key)))?;
    let rest = &rest[1..];
    let end = rest
        .find(quote)
        .ok_or_else(|| NpyError::Header(format!("unterminated {}", key)))?;
    Ok(&rest[..end])
}

fn value_after<'a>(header: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let needle = format!("'{}'", key);
    let start = header
        .find(&needle)
        .ok_or_else(|| NpyError::Header(format!("missing {}", key)))?;
    let rest = header[start + needle.len()..].trim_start();
    let rest = rest
        .strip_prefix(':')
        .ok_or_else(|| NpyError::Header(format!("expected ':' after {}", key)))?;
    Ok(rest.trim_start())
}

fn parse_header(header: &str) -> Result<Header, NpyError> {
    let descr = quoted_value_after(header, "descr")?.to_string();

    let fortran = value_after(header, "fortran_order")?;
    let fortran_order = if fortran.starts_with("True") {
        true
    } else if fortran.starts_with("False") {
        false
    } else {
        return Err(NpyError::Header("fortran_order is not a bool".to_string()));
    };

    let shape_src = value_after(header, "shape")?;
    let shape_src = shape_src
        .strip_prefix('(')
        .ok_or_else(|| NpyError::Header("shape is not a tuple".to_string()))?;
    let end = shape_src
        .find(')')
        .ok_or_else(|| NpyError::Header("unterminated shape".to_string()))?;
    let shape = shape_src[..end]
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| NpyError::Header(format!("bad dimension {:?}", s)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Header {
        descr,
        fortran_order,
        shape,
    })
}

pub fn read_matrix(bytes: &[u8]) -> Result<NpyMatrix, NpyError> {
    if bytes.len() < MAGIC.len() + 2 || &bytes[..MAGIC.len()] != MAGIC {
        return Err(NpyError::BadMagic);
    }
    let (major, minor) = (bytes[6], bytes[7]);
    let (header_len, header_start) = match major {
        1 => {
            let raw = bytes.get(8..10).ok_or(NpyError::Truncated)?;
            (u16::from_le_bytes([raw[0], raw[1]]) as usize, 10)
        }
        2 | 3 => {
            let raw = bytes.get(8..12).ok_or(NpyError::Truncated)?;
            (
                u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize,
                12,
            )
        }
        _ => return Err(NpyError::UnsupportedVersion(major, minor)),
    };

    let header_bytes = bytes
        .get(header_start..header_start + header_len)
        .ok_or(NpyError::Truncated)?;
    let header_text = std::str::from_utf8(header_bytes)
        .map_err(|_| NpyError::Header("header is not text".to_string()))?;
    let header = parse_header(header_text)?;

    if header.fortran_order {
        return Err(NpyError::Unsupported("fortran order".to_string()));
    }
    let shape = match header.shape.as_slice() {
        [rows, cols] => (*rows, *cols),
        other => return Err(NpyError::Unsupported(format!("{} dimensions", other.len()))),
    };
    let dtype = Dtype::from_descr(&header.descr)?;

    if shape.1 == 0 && shape.0 > 0 {
        return Err(NpyError::Unsupported("zero-width rows".to_string()));
    }
    let data_len = shape
        .0
        .checked_mul(shape.1)
        .and_then(|count| count.checked_mul(dtype.width()))
        .ok_or_else(|| NpyError::Header(format!("shape {:?} is too large", shape)))?;
    let data_start = header_start + header_len;
    let remaining = bytes.len().saturating_sub(data_start);
    if remaining < data_len {
        return Err(NpyError::Truncated);
    }
    if remaining > data_len {
        return Err(NpyError::Header(format!(
            "shape {:?} does not cover {} data bytes",
            shape, remaining
        )));
    }
    let data = &bytes[data_start..];

    let values = match dtype {
        Dtype::Float32 => data
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]) as f64)
            .collect(),
        Dtype::Float64 => data
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
            .collect(),
    };

    Ok(NpyMatrix {
        shape,
        dtype,
        values,
    })
}

/// Serialize a row-major f32 matrix as an npy v1.0 file.
pub fn write_f32_matrix(shape: (usize, usize), values: &[f32]) -> Vec<u8> {
    let dtype = Dtype::Float32;
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': ({}, {}), }}",
        dtype.descr(),
        shape.0,
        shape.1
    );
    // magic + version + u16 length + header + '\n' is padded to the alignment.
    let unpadded = MAGIC.len() + 2 + 2 + header.len() + 1;
    let padding = (HEADER_ALIGNMENT - unpadded % HEADER_ALIGNMENT) % HEADER_ALIGNMENT;
    header.push_str(&" ".repeat(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(MAGIC.len() + 4 + header.len() + values.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for value in values {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn npy_bytes(header: &str, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&[1, 0]);
        out.extend_from_slice(&(header.len() as u16).to_le_bytes());
        out.extend_from_slice(header.as_bytes());
        out.extend_from_slice(data);
        out
    }

    #[test]
    fn written_header_is_aligned() {
        let bytes = write_f32_matrix((3, 2), &[0.0; 6]);
        let header_len = u16::from_le_bytes([bytes[8], bytes[9]]) as usize;
        assert_eq!((10 + header_len) % HEADER_ALIGNMENT, 0);
        assert_eq!(bytes[10 + header_len - 1], b'\n');
        assert_eq!(bytes.len(), 10 + header_len + 6 * 4);
    }

    #[test]
    fn reads_back_written_matrix() {
        let values = [1.5f32, -2.0, 0.25, 8.0];
        let matrix = read_matrix(&write_f32_matrix((2, 2), &values)).unwrap();
        assert_eq!(matrix.shape, (2, 2));
        assert_eq!(matrix.dtype, Dtype::Float32);
        assert_eq!(matrix.values, vec![1.5, -2.0, 0.25, 8.0]);
    }

    #[test]
    fn reads_float64_files() {
        let mut data = Vec::new();
        for v in [1.0f64, 2.0] {
            data.extend_from_slice(&v.to_le_bytes());
        }
        let bytes = npy_bytes(
            "{'descr': '<f8', 'fortran_order': False, 'shape': (1, 2), }\n",
            &data,
        );
        let matrix = read_matrix(&bytes).unwrap();
        assert_eq!(matrix.dtype.name(), "float64");
        assert_eq!(matrix.values, vec![1.0, 2.0]);
    }

    #[test]
    fn rejects_unsupported_layouts() {
        let fortran = npy_bytes(
            "{'descr': '<f4', 'fortran_order': True, 'shape': (1, 1), }\n",
            &[0; 4],
        );
        assert!(matches!(read_matrix(&fortran), Err(NpyError::Unsupported(_))));

        let one_dim = npy_bytes(
            "{'descr': '<f4', 'fortran_order': False, 'shape': (4,), }\n",
            &[0; 16],
        );
        assert!(matches!(read_matrix(&one_dim), Err(NpyError::Unsupported(_))));

        let ints = npy_bytes(
            "{'descr': '<i8', 'fortran_order': False, 'shape': (1, 1), }\n",
            &[0; 8],
        );
        assert!(matches!(read_matrix(&ints), Err(NpyError::Unsupported(_))));
    }

    #[test]
    fn rejects_garbage_and_truncation() {
        assert!(matches!(read_matrix(b"RIFF...."), Err(NpyError::BadMagic)));

        let mut bytes = write_f32_matrix((2, 2), &[1.0; 4]);
        bytes.truncate(bytes.len() - 3);
        assert!(matches!(read_matrix(&bytes), Err(NpyError::Truncated)));
    }

    #[test]
    fn rejects_shapes_that_do_not_match_the_data() {
        let overflowing = npy_bytes(
            "{'descr': '<f4', 'fortran_order': False, 'shape': (8589934592, 8589934592), }\n",
            &[0; 16],
        );
        assert!(matches!(read_matrix(&overflowing), Err(NpyError::Header(_))));

        let huge = npy_bytes(
            "{'descr': '<f8', 'fortran_order': False, 'shape': (4294967296, 2), }\n",
            &[0; 16],
        );
        assert!(matches!(read_matrix(&huge), Err(NpyError::Truncated)));

        let trailing = npy_bytes(
            "{'descr': '<f4', 'fortran_order': False, 'shape': (1, 2), }\n",
            &[0; 12],
        );
        assert!(matches!(read_matrix(&trailing), Err(NpyError::Header(_))));

        let zero_width = npy_bytes(
            "{'descr': '<f4', 'fortran_order': False, 'shape': (1000000000000, 0), }\n",
            &[],
        );
        assert!(matches!(read_matrix(&zero_width), Err(NpyError::Unsupported(_))));

        let empty = npy_bytes(
            "{'descr': '<f4', 'fortran_order': False, 'shape': (0, 2), }\n",
            &[],
        );
        assert_eq!(read_matrix(&empty).unwrap().values, Vec::<f64>::new());
    }
}
