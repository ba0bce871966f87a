use serde::Serialize;

use crate::error::{Error, Result};

#[derive(Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Debug)]
pub enum ParallelismType {
    Tensor,
    Pipeline,
    Data,
}

impl ParallelismType {
    pub fn short_name(&self) -> &'static str {
        match self {
            ParallelismType::Tensor => "t",
            ParallelismType::Pipeline => "p",
            ParallelismType::Data => "d",
        }
    }
}

/// Group sizes for the three parallelism types. The product is always a power
/// of two equal to the accelerator count it was factored from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ParallelDegrees {
    tensor: u64,
    pipeline: u64,
    data: u64,
}

impl ParallelDegrees {
    pub fn tensor(&self) -> u64 {
        self.tensor
    }

    pub fn pipeline(&self) -> u64 {
        self.pipeline
    }

    pub fn data(&self) -> u64 {
        self.data
    }

    pub fn get(&self, ty: ParallelismType) -> u64 {
        match ty {
            ParallelismType::Tensor => self.tensor,
            ParallelismType::Pipeline => self.pipeline,
            ParallelismType::Data => self.data,
        }
    }

    pub fn as_tuple(&self) -> (u64, u64, u64) {
        (self.tensor, self.pipeline, self.data)
    }

    pub fn num_accelerators(&self) -> u64 {
        self.tensor * self.pipeline * self.data
    }
}

impl std::fmt::Display for ParallelDegrees {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts = [
            ParallelismType::Tensor,
            ParallelismType::Pipeline,
            ParallelismType::Data,
        ];
        for (i, ty) in parts.into_iter().enumerate() {
            if i > 0 {
                write!(f, "_")?;
            }
            write!(f, "{}{}", ty.short_name(), self.get(ty))?;
        }
        Ok(())
    }
}

/// Splits a power-of-two accelerator count into three near-equal power-of-two
/// degrees. With `e = log2(n)` the exponents are `ceil(e/3)`, `floor(e/3)` and
/// whatever is left, so no two differ by more than one.
pub fn factor_parallelism(n: u64) -> Result<ParallelDegrees> {
    if !n.is_power_of_two() {
        return Err(Error::NotPowerOfTwo(n));
    }
    let e = n.trailing_zeros();
    let tensor = e.div_ceil(3);
    let pipeline = e / 3;
    let data = e - tensor - pipeline;
    Ok(ParallelDegrees {
        tensor: 1 << tensor,
        pipeline: 1 << pipeline,
        data: 1 << data,
    })
}
