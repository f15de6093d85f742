//! Parameter Checkpoints
//!
//! Saves trained weights so another process can run inference or resume
//! inspection without retraining.
//!
//! ## File Layout
//!
//! ```text
//! b"HANDPROP_CKPT"            magic
//! u8                          version (1)
//! u32 + bytes                 JSON metadata ({"layer_sizes": [...]})
//! per linear layer:
//!     tensor (weights)        u32 rank, u32 dims..., u32 len, f64 values
//!     tensor (bias)
//! ```
//!
//! All integers and floats are little-endian.

use crate::error::Result;
use crate::layers::LinearLayer;
use crate::mlp::Mlp;
use crate::tensor::Tensor;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 13] = b"HANDPROP_CKPT";
const VERSION: u8 = 1;
const MAX_METADATA_BYTES: usize = 1 << 20;

#[derive(Serialize, Deserialize)]
struct CheckpointMetadata {
    layer_sizes: Vec<usize>,
}

fn invalid_data<E>(err: E) -> io::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    io::Error::new(io::ErrorKind::InvalidData, err)
}

fn write_u32<W: Write>(w: &mut W, value: usize) -> io::Result<()> {
    let value = u32::try_from(value).map_err(invalid_data)?;
    w.write_all(&value.to_le_bytes())
}

fn read_u32<R: Read>(r: &mut R) -> io::Result<usize> {
    let mut bytes = [0u8; 4];
    r.read_exact(&mut bytes)?;
    Ok(u32::from_le_bytes(bytes) as usize)
}

fn write_tensor<W: Write>(w: &mut W, tensor: &Tensor) -> io::Result<()> {
    write_u32(w, tensor.shape.len())?;
    for &dim in &tensor.shape {
        write_u32(w, dim)?;
    }
    write_u32(w, tensor.data.len())?;
    for &val in &tensor.data {
        w.write_all(&val.to_le_bytes())?;
    }
    Ok(())
}

/// Read one tensor, rejecting any header that disagrees with `expected`
fn read_tensor<R: Read>(r: &mut R, expected: &[usize]) -> io::Result<Tensor> {
    let rank = read_u32(r)?;
    if rank != expected.len() {
        return Err(invalid_data(format!(
            "tensor rank {} doesn't match expected shape {:?}",
            rank, expected
        )));
    }
    let mut shape = Vec::with_capacity(rank);
    for _ in 0..rank {
        shape.push(read_u32(r)?);
    }
    let len = read_u32(r)?;
    if shape != expected || len != expected.iter().product::<usize>() {
        return Err(invalid_data(format!(
            "tensor {:?} (len {}) doesn't match expected shape {:?}",
            shape, len, expected
        )));
    }
    // Grows only as values are actually read, so a truncated file fails on EOF
    let mut data = Vec::new();
    let mut bytes = [0u8; 8];
    for _ in 0..len {
        r.read_exact(&mut bytes)?;
        data.push(f64::from_le_bytes(bytes));
    }
    Ok(Tensor::new(data, shape))
}

/// Save every linear layer's parameters of `mlp` to `path`
pub fn save<P: AsRef<Path>>(mlp: &Mlp, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut file = BufWriter::new(File::create(path)?);

    file.write_all(MAGIC)?;
    file.write_all(&[VERSION])?;

    let metadata = serde_json::to_vec(&CheckpointMetadata {
        layer_sizes: mlp.layer_sizes().to_vec(),
    })?;
    write_u32(&mut file, metadata.len())?;
    file.write_all(&metadata)?;

    for params in mlp.linear_parameters() {
        write_tensor(&mut file, &params.weights)?;
        write_tensor(&mut file, &params.bias)?;
    }
    file.flush()?;

    tracing::info!(path = %path.display(), layers = ?mlp.layer_sizes(), "saved checkpoint");
    Ok(())
}

/// Load a network saved with [`save`]
///
/// The returned network is in evaluation mode and uses the unclamped loss
/// head.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Mlp> {
    let path = path.as_ref();
    let mut file = BufReader::new(File::open(path)?);

    let mut header = [0u8; 13];
    file.read_exact(&mut header)?;
    if &header != MAGIC {
        return Err(invalid_data("invalid checkpoint header - expected HANDPROP_CKPT").into());
    }

    let mut version = [0u8; 1];
    file.read_exact(&mut version)?;
    if version[0] != VERSION {
        return Err(invalid_data(format!("unsupported checkpoint version: {}", version[0])).into());
    }

    let metadata_len = read_u32(&mut file)?;
    if metadata_len > MAX_METADATA_BYTES {
        return Err(invalid_data(format!("checkpoint metadata of {} bytes", metadata_len)).into());
    }
    let mut metadata_bytes = vec![0u8; metadata_len];
    file.read_exact(&mut metadata_bytes)?;
    let metadata: CheckpointMetadata = serde_json::from_slice(&metadata_bytes)?;
    if metadata.layer_sizes.len() < 2 {
        return Err(invalid_data("checkpoint lists fewer than two layer sizes").into());
    }

    let mut linears = Vec::with_capacity(metadata.layer_sizes.len() - 1);
    for pair in metadata.layer_sizes.windows(2) {
        let weights = read_tensor(&mut file, &[pair[0], pair[1]])?;
        let bias = read_tensor(&mut file, &[1, pair[1]])?;
        linears.push(LinearLayer::from_parameters(weights, bias));
    }

    tracing::info!(path = %path.display(), layers = ?metadata.layer_sizes, "loaded checkpoint");
    Mlp::from_linear_layers(linears)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("handprop_{}_{}.bin", name, std::process::id()))
    }

    #[test]
    fn test_save_then_load_restores_predictions() {
        let path = temp_path("roundtrip");
        let mut mlp = Mlp::new(&[6, 5, 4, 3], 17).unwrap();
        let x = Tensor::new((0..24).map(|i| (i as f64 - 12.0) / 7.0).collect(), vec![4, 6]);
        mlp.train_step(&x, &[0, 1, 2, 1], 0.1).unwrap();

        save(&mlp, &path).unwrap();
        let mut restored = load(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(restored.layer_sizes(), mlp.layer_sizes());
        assert_eq!(restored.linear_parameters(), mlp.linear_parameters());
        assert!(!restored.is_training());
        assert_eq!(restored.forward(&x).unwrap(), mlp.forward(&x).unwrap());
    }

    fn header_for(layer_sizes: &str) -> Vec<u8> {
        let mut bytes = MAGIC.to_vec();
        bytes.push(VERSION);
        let metadata = format!("{{\"layer_sizes\":{}}}", layer_sizes);
        bytes.extend_from_slice(&(metadata.len() as u32).to_le_bytes());
        bytes.extend_from_slice(metadata.as_bytes());
        bytes
    }

    fn assert_invalid_data(result: Result<Mlp>) {
        match result {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::InvalidData),
            Err(e) => panic!("expected InvalidData, got {}", e),
            Ok(_) => panic!("expected InvalidData, got a network"),
        }
    }

    #[test]
    fn test_rejects_oversized_tensor_without_allocating() {
        // Metadata says 2x2, the tensor header claims 65535x65535 with no data behind it
        let path = temp_path("oversized");
        let mut bytes = header_for("[2,2]");
        for value in [2u32, 65535, 65535, 65535 * 65535] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        std::fs::write(&path, &bytes).unwrap();
        let result = load(&path);
        std::fs::remove_file(&path).unwrap();

        assert_invalid_data(result);
    }

    #[test]
    fn test_rejects_truncated_values_and_huge_metadata() {
        // Header matches the metadata but only one of four weights follows
        let path = temp_path("truncated");
        let mut bytes = header_for("[2,2]");
        for value in [2u32, 2, 2, 4] {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes.extend_from_slice(&1.0f64.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();
        let result = load(&path);
        std::fs::remove_file(&path).unwrap();
        match result {
            Err(Error::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            _ => panic!("expected UnexpectedEof"),
        }

        let path = temp_path("huge_metadata");
        let mut bytes = MAGIC.to_vec();
        bytes.push(VERSION);
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        std::fs::write(&path, &bytes).unwrap();
        let result = load(&path);
        std::fs::remove_file(&path).unwrap();
        assert_invalid_data(result);
    }

    #[test]
    fn test_rejects_tensor_that_disagrees_with_layer_sizes() {
        // Well-formed 3x2 weights where the metadata promises 2x2
        let path = temp_path("mismatch");
        let mut bytes = header_for("[2,2]");
        write_tensor(&mut bytes, &Tensor::zeros(vec![3, 2])).unwrap();
        write_tensor(&mut bytes, &Tensor::zeros(vec![1, 2])).unwrap();
        std::fs::write(&path, &bytes).unwrap();
        let result = load(&path);
        std::fs::remove_file(&path).unwrap();

        assert_invalid_data(result);
    }

    #[test]
    fn test_rejects_foreign_file() {
        let path = temp_path("foreign");
        std::fs::write(&path, b"NOT_A_CHECKPOINT_AT_ALL").unwrap();
        let result = load(&path);
        std::fs::remove_file(&path).unwrap();

        assert_invalid_data(result);
    }
}
