//! Layout and configuration types shared by all backends.
//!
//! Every matrix in curvefit is a flat `f32` buffer in **column-major** order:
//! element `(r, c)` of an `rows × cols` matrix lives at `c * rows + r`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Whether an operand enters a product as stored or transposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Transpose {
    /// Use the operand as stored.
    #[default]
    No,
    /// Use the transpose of the stored operand.
    Yes,
}

impl Transpose {
    /// `true` for [`Transpose::Yes`].
    pub fn is_transposed(self) -> bool {
        matches!(self, Transpose::Yes)
    }

    /// Shape of the stored operand whose `op(...)` is `rows × cols`.
    pub fn stored_shape(self, rows: usize, cols: usize) -> MatrixShape {
        match self {
            Transpose::No => MatrixShape::new(rows, cols),
            Transpose::Yes => MatrixShape::new(cols, rows),
        }
    }
}

impl From<bool> for Transpose {
    fn from(transposed: bool) -> Self {
        if transposed { Transpose::Yes } else { Transpose::No }
    }
}

/// Dimensions of a column-major matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixShape {
    /// Number of rows (also the leading dimension).
    pub rows: usize,
    /// Number of columns.
    pub cols: usize,
}

impl MatrixShape {
    /// Create a shape.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    /// Number of elements, failing on overflow.
    pub fn len(&self) -> Result<usize> {
        self.rows.checked_mul(self.cols).ok_or_else(|| {
            Error::Validation(format!("matrix {}x{} overflows usize", self.rows, self.cols))
        })
    }

    /// `true` when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.rows == 0 || self.cols == 0
    }

    /// Flat offset of `(row, col)`.
    #[inline]
    pub fn offset(&self, row: usize, col: usize) -> usize {
        col * self.rows + row
    }

    /// Shape of the transpose.
    pub fn transposed(&self) -> Self {
        Self { rows: self.cols, cols: self.rows }
    }
}

/// Parameters of `C = beta · (alpha · op(A) · op(B))`.
///
/// `op(A)` is `m × n`, `op(B)` is `n × k` and `C` is `m × k`. `C` is always
/// overwritten: its previous contents never enter the result, and `beta`
/// scales the fresh product rather than an accumulator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiplyConfig {
    /// Scalar applied inside the product.
    pub alpha: f32,
    /// Scalar applied to the finished product.
    pub beta: f32,
    /// Transpose flag for `A`.
    pub trans_a: Transpose,
    /// Transpose flag for `B`.
    pub trans_b: Transpose,
    /// Rows of `op(A)` and `C`.
    pub m: usize,
    /// Inner dimension.
    pub n: usize,
    /// Columns of `op(B)` and `C`.
    pub k: usize,
}

impl MultiplyConfig {
    /// Plain `C = A · B` for `A: m × n`, `B: n × k`.
    pub fn new(m: usize, n: usize, k: usize) -> Self {
        Self { alpha: 1.0, beta: 1.0, trans_a: Transpose::No, trans_b: Transpose::No, m, n, k }
    }

    /// Set the transpose flags.
    pub fn with_transpose(mut self, trans_a: Transpose, trans_b: Transpose) -> Self {
        self.trans_a = trans_a;
        self.trans_b = trans_b;
        self
    }

    /// Set both scalars.
    pub fn with_scalars(mut self, alpha: f32, beta: f32) -> Self {
        self.alpha = alpha;
        self.beta = beta;
        self
    }

    /// Stored shape of `A`.
    pub fn a_shape(&self) -> MatrixShape {
        self.trans_a.stored_shape(self.m, self.n)
    }

    /// Stored shape of `B`.
    pub fn b_shape(&self) -> MatrixShape {
        self.trans_b.stored_shape(self.n, self.k)
    }

    /// Shape of `C`.
    pub fn c_shape(&self) -> MatrixShape {
        MatrixShape::new(self.m, self.k)
    }

    /// Combined scalar that multiplies `op(A) · op(B)`.
    pub fn effective_alpha(&self) -> f32 {
        self.alpha * self.beta
    }

    /// Check operand buffer lengths against the configured dimensions.
    pub fn validate(&self, a_len: usize, b_len: usize, c_len: usize) -> Result<()> {
        check_len("multiply: A", a_len, self.a_shape().len()?)?;
        check_len("multiply: B", b_len, self.b_shape().len()?)?;
        check_len("multiply: C", c_len, self.c_shape().len()?)
    }
}

/// Fail with [`Error::Validation`] unless a buffer holds at least `expected` floats.
pub fn check_len(what: &str, got: usize, expected: usize) -> Result<()> {
    if got < expected {
        return Err(Error::Validation(format!(
            "{what} length mismatch: expected at least {expected}, got {got}"
        )));
    }
    Ok(())
}

/// Fail with [`Error::Validation`] unless a buffer holds exactly `expected` floats.
pub fn check_exact_len(what: &str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(Error::Validation(format!(
            "{what} length mismatch: expected {expected}, got {got}"
        )));
    }
    Ok(())
}
