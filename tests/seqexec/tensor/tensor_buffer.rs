use anyhow::Result;
use seqexec::{DType, Tensor};

#[test]
fn mutable_data_grows_only_when_too_small() -> Result<()> {
    let mut tensor = Tensor::new(DType::F32);
    assert!(!tensor.is_initialized());
    assert_eq!(tensor.memory_size(), 0);

    tensor.mutable_data(DType::F32, &[4])?;
    let first = tensor.buffer_id();
    assert_eq!(tensor.memory_size(), 16);

    tensor.mutable_data(DType::F32, &[2])?;
    assert_eq!(tensor.buffer_id(), first);
    assert_eq!(tensor.memory_size(), 16);
    assert_eq!(tensor.shape(), &[2]);

    tensor.mutable_data(DType::F64, &[4])?;
    assert_ne!(tensor.buffer_id(), first);
    assert_eq!(tensor.memory_size(), 32);
    Ok(())
}

#[test]
fn shared_buffer_keeps_each_tensors_metadata() -> Result<()> {
    let big = Tensor::from_vec(&[2, 4], vec![1.0f32; 8])?;
    let mut small = Tensor::from_vec(&[3], vec![7i32, 8, 9])?;

    small.share_buffer_with(&big);
    assert!(small.shares_buffer_with(&big));
    assert_eq!(small.dtype(), DType::I32);
    assert_eq!(small.shape(), &[3]);
    assert_eq!(small.memory_size(), 32);
    assert_eq!(big.buffer_holders(), 2);

    small.write(&[3], &[1i32, 2, 3])?;
    assert_eq!(small.to_vec::<i32>()?, vec![1, 2, 3]);
    assert_eq!(big.to_vec::<f32>()?[3..], [1.0; 5]);
    assert_ne!(big.to_vec::<f32>()?[0], 1.0);
    Ok(())
}

#[test]
fn previous_holders_keep_the_old_buffer() -> Result<()> {
    let old = Tensor::from_vec(&[2], vec![3.0f32, 4.0])?;
    let mut alias = old.clone();
    assert!(alias.shares_buffer_with(&old));

    let bigger = Tensor::from_vec(&[8], vec![0.0f32; 8])?;
    alias.share_buffer_with(&bigger);
    assert!(!alias.shares_buffer_with(&old));
    assert_eq!(old.to_vec::<f32>()?, vec![3.0, 4.0]);
    assert_eq!(old.buffer_holders(), 1);
    Ok(())
}

#[test]
fn copy_from_a_shared_buffer() -> Result<()> {
    let src = Tensor::from_vec(&[2], vec![5i64, 6])?;
    let mut dst = Tensor::default();
    dst.share_buffer_with(&src);
    dst.copy_from(&src)?;
    assert_eq!(dst.dtype(), DType::I64);
    assert_eq!(dst.to_vec::<i64>()?, vec![5, 6]);
    Ok(())
}

#[test]
fn typed_access_is_checked() -> Result<()> {
    let tensor = Tensor::from_vec(&[2], vec![1.0f64, 2.0])?;
    assert!(tensor.to_vec::<f32>().is_err());
    assert!(Tensor::from_vec(&[3], vec![1u8, 2]).is_err());

    let mut flags = Tensor::new(DType::Bool);
    flags.write(&[2], &[1u8, 0])?;
    assert_eq!(flags.dtype(), DType::Bool);
    assert_eq!(flags.to_vec::<u8>()?, vec![1, 0]);
    assert_eq!(flags.describe(), "bool[2]");
    Ok(())
}

#[test]
fn dtype_identifiers() -> Result<()> {
    assert_eq!(DType::from_ident("float32")?, DType::F32);
    assert_eq!(DType::from_ident("i64")?, DType::I64);
    assert!(DType::from_ident("f16").is_err());
    assert_eq!(DType::Bool.size_of(), 1);
    assert!(DType::F64.is_float());
    Ok(())
}
