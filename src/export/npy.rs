//! NPY file encoding and decoding
//!
//! Writes NumPy `.npy` version 1.0 files in C order and reads them back for
//! inspection and tests.

use anyhow::{Context, Result};
use half::f16;
use ndarray::{Array, Dimension};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 6] = b"\x93NUMPY";

/// Header + preamble length is padded to a multiple of this
const HEADER_ALIGN: usize = 64;

/// Element types that can be written to an NPY file
pub trait NpyElement: Copy {
    /// NumPy type string, little-endian
    const DESCR: &'static str;

    /// Append the little-endian bytes of `self`
    fn put_le(&self, out: &mut Vec<u8>);
}

impl NpyElement for f32 {
    const DESCR: &'static str = "<f4";

    fn put_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

impl NpyElement for f16 {
    const DESCR: &'static str = "<f2";

    fn put_le(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.to_le_bytes());
    }
}

/// Decoded `.npy` contents, kept as raw little-endian bytes
#[derive(Debug, Clone)]
pub struct NpyArray {
    /// Dimensions, C order
    pub shape: Vec<usize>,
    /// NumPy type string (`<f4` or `<f2`)
    pub dtype: String,
    /// Element bytes, row-major
    pub data: Vec<u8>,
}

impl NpyArray {
    /// Element count
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    /// True when any dimension is zero
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values widened to f32
    pub fn as_f32(&self) -> Result<Vec<f32>> {
        let values = match self.dtype.as_str() {
            "<f4" => self
                .data
                .chunks_exact(4)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            "<f2" => self
                .data
                .chunks_exact(2)
                .map(|b| f16::from_le_bytes([b[0], b[1]]).to_f32())
                .collect(),
            other => anyhow::bail!("Cannot widen {} to f32", other),
        };
        Ok(values)
    }
}

/// Bytes per element for the type strings this crate writes
fn element_size(descr: &str) -> Option<usize> {
    match descr {
        "<f2" => Some(2),
        "<f4" => Some(4),
        _ => None,
    }
}

/// Encode an array as NPY into any writer
pub fn write_npy_to<W, T, D>(mut writer: W, array: &Array<T, D>) -> Result<()>
where
    W: Write,
    T: NpyElement,
    D: Dimension,
{
    let header = npy_header(T::DESCR, array.shape());
    writer.write_all(MAGIC)?;
    writer.write_all(&[1, 0])?;
    writer.write_all(&(header.len() as u16).to_le_bytes())?;
    writer.write_all(header.as_bytes())?;

    // Logical iteration order is row-major regardless of memory layout
    let mut data = Vec::with_capacity(array.len() * std::mem::size_of::<T>());
    for value in array.iter() {
        value.put_le(&mut data);
    }
    writer.write_all(&data)?;
    writer.flush()?;
    Ok(())
}

/// Write an array to an NPY file
pub fn write_npy<P, T, D>(path: P, array: &Array<T, D>) -> Result<()>
where
    P: AsRef<Path>,
    T: NpyElement,
    D: Dimension,
{
    let path = path.as_ref();
    let file = File::create(path)
        .with_context(|| format!("Failed to create NPY file: {:?}", path))?;
    write_npy_to(BufWriter::new(file), array)
        .with_context(|| format!("Failed to write NPY file: {:?}", path))
}

/// Header dict, space-padded and newline-terminated so the data is 64-byte aligned
fn npy_header(descr: &str, shape: &[usize]) -> String {
    let shape_str = match shape {
        [] => "()".to_string(),
        [n] => format!("({},)", n),
        dims => format!(
            "({})",
            dims.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    };
    let mut header = format!(
        "{{'descr': '{}', 'fortran_order': False, 'shape': {}, }}",
        descr, shape_str
    );

    // magic(6) + version(2) + length(2) + header + '\n'
    let unpadded = MAGIC.len() + 4 + header.len() + 1;
    let padding = (HEADER_ALIGN - unpadded % HEADER_ALIGN) % HEADER_ALIGN;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');
    header
}

/// Open and decode an NPY file
pub fn load_npy<P: AsRef<Path>>(path: P) -> Result<NpyArray> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open NPY file: {:?}", path))?;
    read_npy(BufReader::new(file)).with_context(|| format!("Failed to read NPY file: {:?}", path))
}

/// Open an NPY file and widen its values to f32, returning `(values, shape)`
pub fn load_npy_f32<P: AsRef<Path>>(path: P) -> Result<(Vec<f32>, Vec<usize>)> {
    let npy = load_npy(path)?;
    Ok((npy.as_f32()?, npy.shape))
}

/// Decode a float16/float32 NPY stream (format 1.x or 2.x)
pub fn read_npy<R: Read>(mut reader: R) -> Result<NpyArray> {
    let mut preamble = [0u8; 8];
    reader.read_exact(&mut preamble).context("Truncated NPY preamble")?;
    if &preamble[..6] != MAGIC {
        anyhow::bail!("Not an NPY stream (bad magic)");
    }

    // Format 1.x stores the header length in 2 bytes, later versions in 4
    let header_len = match preamble[6] {
        1 => {
            let mut len = [0u8; 2];
            reader.read_exact(&mut len)?;
            u16::from_le_bytes(len) as usize
        }
        2 | 3 => {
            let mut len = [0u8; 4];
            reader.read_exact(&mut len)?;
            u32::from_le_bytes(len) as usize
        }
        major => anyhow::bail!("Unsupported NPY format version {}", major),
    };

    let mut raw = vec![0u8; header_len];
    reader.read_exact(&mut raw).context("Truncated NPY header")?;
    let header = String::from_utf8_lossy(&raw);

    if header_field(&header, "fortran_order")?.starts_with("True") {
        anyhow::bail!("Fortran-ordered arrays are not supported");
    }
    let dtype = parse_dtype(&header)?;
    let shape = parse_shape(&header)?;
    let size = element_size(&dtype).ok_or_else(|| anyhow::anyhow!("Unsupported dtype: {}", dtype))?;

    let mut data = vec![0u8; shape.iter().product::<usize>() * size];
    reader.read_exact(&mut data).context("Truncated NPY data")?;
    Ok(NpyArray { shape, dtype, data })
}

/// Text following `'key':` in the header dict, leading whitespace trimmed
fn header_field<'a>(header: &'a str, key: &str) -> Result<&'a str> {
    let pos = header
        .find(&format!("'{}'", key))
        .or_else(|| header.find(&format!("\"{}\"", key)))
        .ok_or_else(|| anyhow::anyhow!("NPY header has no '{}' entry", key))?;
    let rest = &header[pos + key.len() + 2..];
    let colon = rest
        .find(':')
        .ok_or_else(|| anyhow::anyhow!("NPY header entry '{}' has no value", key))?;
    Ok(rest[colon + 1..].trim_start())
}

fn parse_dtype(header: &str) -> Result<String> {
    let value = header_field(header, "descr")?;
    let quote = value
        .chars()
        .next()
        .filter(|c| *c == '\'' || *c == '"')
        .ok_or_else(|| anyhow::anyhow!("descr is not a string"))?;
    let body = &value[1..];
    let close = body
        .find(quote)
        .ok_or_else(|| anyhow::anyhow!("descr string is not terminated"))?;
    Ok(body[..close].to_string())
}

fn parse_shape(header: &str) -> Result<Vec<usize>> {
    let value = header_field(header, "shape")?;
    let tuple = value
        .strip_prefix('(')
        .and_then(|v| v.split_once(')'))
        .map(|(inner, _)| inner)
        .ok_or_else(|| anyhow::anyhow!("shape is not a tuple"))?;

    tuple
        .split(',')
        .map(str::trim)
        .filter(|dim| !dim.is_empty())
        .map(|dim| {
            dim.parse::<usize>()
                .with_context(|| format!("Bad shape dimension {:?}", dim))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr2, Array3};

    #[test]
    fn test_header_fields() {
        let header = "{'descr': '<f2', 'fortran_order': False, 'shape': (64, 172), }";
        assert_eq!(parse_dtype(header).unwrap(), "<f2");
        assert_eq!(parse_shape(header).unwrap(), vec![64, 172]);

        let scalar_like = "{\"descr\": \"<f4\", \"fortran_order\": False, \"shape\": (9,)}";
        assert_eq!(parse_dtype(scalar_like).unwrap(), "<f4");
        assert_eq!(parse_shape(scalar_like).unwrap(), vec![9]);
        assert_eq!(parse_shape("{'shape': ()}").unwrap(), Vec::<usize>::new());
    }

    #[test]
    fn test_malformed_headers() {
        assert!(parse_dtype("{'shape': (1,)}").is_err());
        assert!(parse_dtype("{'descr': <f4}").is_err());
        assert!(parse_shape("{'shape': 3}").is_err());
        assert!(parse_shape("{'shape': (a, 2)}").is_err());
    }

    #[test]
    fn test_header_alignment() {
        for shape in [vec![], vec![7], vec![3, 64, 172], vec![123456, 2]] {
            let header = npy_header("<f4", &shape);
            assert_eq!((10 + header.len()) % HEADER_ALIGN, 0);
            assert!(header.ends_with('\n'));
        }
    }

    #[test]
    fn test_f32_bytes() {
        let array = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]);
        let mut buf = Vec::new();
        write_npy_to(&mut buf, &array).unwrap();

        assert_eq!(&buf[..6], MAGIC);
        let data_start = buf.len() - 4 * 4;
        assert_eq!(data_start % HEADER_ALIGN, 0);
        let header_len = u16::from_le_bytes([buf[8], buf[9]]) as usize;
        assert_eq!(10 + header_len, data_start);

        let header = String::from_utf8_lossy(&buf[10..data_start]);
        assert!(header.contains("'descr': '<f4'"));
        assert!(header.contains("'shape': (2, 2)"));
        assert_eq!(&buf[data_start..data_start + 4], &1.0f32.to_le_bytes());
        assert_eq!(&buf[data_start + 12..], &4.0f32.to_le_bytes());
    }

    #[test]
    fn test_transposed_view_written_in_logical_order() {
        let array = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]).reversed_axes();
        let mut buf = Vec::new();
        write_npy_to(&mut buf, &array).unwrap();
        let back = read_npy(buf.as_slice()).unwrap();
        assert_eq!(back.as_f32().unwrap(), vec![1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn test_f16_read_back() {
        let array = Array3::from_shape_fn((2, 3, 4), |(i, j, k)| f16::from_f32((i * 12 + j * 4 + k) as f32));
        let mut buf = Vec::new();
        write_npy_to(&mut buf, &array).unwrap();

        let back = read_npy(buf.as_slice()).unwrap();
        assert_eq!(back.dtype, "<f2");
        assert_eq!(back.shape, vec![2, 3, 4]);
        let values = back.as_f32().unwrap();
        assert_eq!(values[23], 23.0);
    }

    #[test]
    fn test_bad_magic() {
        let buf = vec![0u8; 16];
        assert!(read_npy(buf.as_slice()).is_err());
    }

    #[test]
    fn test_truncated_data() {
        let array = arr2(&[[1.0f32, 2.0], [3.0, 4.0]]);
        let mut buf = Vec::new();
        write_npy_to(&mut buf, &array).unwrap();
        buf.truncate(buf.len() - 1);
        assert!(read_npy(buf.as_slice()).is_err());
    }

    #[test]
    fn test_unsupported_dtype() {
        let array = NpyArray {
            shape: vec![2],
            dtype: "<i8".to_string(),
            data: vec![0; 16],
        };
        assert_eq!(array.len(), 2);
        assert!(array.as_f32().is_err());
    }
}
