use rand::prelude::*;
use serde::{Serialize, Deserialize};
use std::f64::consts::PI;

use crate::error::{Error, Result};

/// Dense 2-D matrix of `f64` elements stored row-major.
///
/// Dimensions are fixed at construction; elements are freely mutable. Every
/// algebraic operation returns a freshly allocated matrix — instances never
/// share storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub height: usize,
    pub width: usize,
    pub data: Vec<Vec<f64>>,
}

impl Matrix {
    pub fn zeros(height: usize, width: usize) -> Matrix {
        Matrix {
            height,
            width,
            data: vec![vec![0.0; width]; height],
        }
    }

    pub fn filled(height: usize, width: usize, value: f64) -> Matrix {
        Matrix {
            height,
            width,
            data: vec![vec![value; width]; height],
        }
    }

    /// Builds a matrix from nested rows. Panics if the rows are ragged or empty.
    pub fn from_rows(data: Vec<Vec<f64>>) -> Matrix {
        assert!(!data.is_empty(), "matrix must have at least one row");
        let width = data[0].len();
        assert!(
            data.iter().all(|row| row.len() == width),
            "all rows must have equal length"
        );

        Matrix {
            height: data.len(),
            width,
            data,
        }
    }

    /// Builds a matrix where each element is computed from its (row, column)
    /// position.
    pub fn from_fn<F>(height: usize, width: usize, mut generator: F) -> Matrix
    where
        F: FnMut(usize, usize) -> f64,
    {
        let data = (0..height)
            .map(|row| (0..width).map(|col| generator(row, col)).collect())
            .collect();

        Matrix {
            height,
            width,
            data,
        }
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    /// Both u1 and u2 must be uniform on (0, 1].
    pub(crate) fn sample_standard_normal<R: Rng>(rng: &mut R) -> f64 {
        // Draw two independent uniform samples in (0, 1] to avoid log(0).
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        self.data[row][col] = value;
    }

    /// Total number of elements.
    pub fn len(&self) -> usize {
        self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over all elements row-major (column index fastest).
    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        self.data.iter().flat_map(|row| row.iter().copied())
    }

    pub fn fill(&mut self, value: f64) {
        self.fill_with(|| value);
    }

    /// Replaces every element with a value from the supplier, visiting
    /// elements row-major.
    pub fn fill_with<F>(&mut self, mut supplier: F)
    where
        F: FnMut() -> f64,
    {
        for row in &mut self.data {
            for element in row {
                *element = supplier();
            }
        }
    }

    /// Replaces every element with a value computed from its position.
    pub fn fill_from_fn<F>(&mut self, mut generator: F)
    where
        F: FnMut(usize, usize) -> f64,
    {
        for (r, row) in self.data.iter_mut().enumerate() {
            for (c, element) in row.iter_mut().enumerate() {
                *element = generator(r, c);
            }
        }
    }

    /// Fills every element independently and uniformly in `[minimum, maximum)`.
    pub fn randomize<R: Rng>(&mut self, rng: &mut R, minimum: f64, maximum: f64) {
        let range = maximum - minimum;
        self.fill_with(|| range * rng.gen::<f64>() + minimum);
    }

    fn check_same_shape(&self, other: &Matrix) -> Result<()> {
        if self.height != other.height || self.width != other.width {
            return Err(Error::DimensionMismatch {
                expected: (self.height, self.width),
                actual: (other.height, other.width),
            });
        }
        Ok(())
    }

    /// Elementwise sum.
    pub fn add(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_map(other, |x, y| x + y)
    }

    /// Elementwise difference.
    pub fn sub(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_map(other, |x, y| x - y)
    }

    /// Scalar multiplication.
    pub fn scale(&self, factor: f64) -> Matrix {
        self.map(|x| factor * x)
    }

    /// True matrix product; inner dimensions must agree.
    pub fn matmul(&self, other: &Matrix) -> Result<Matrix> {
        if self.width != other.height {
            return Err(Error::DimensionMismatch {
                expected: (self.width, other.width),
                actual: (other.height, other.width),
            });
        }

        let mut res = Matrix::zeros(self.height, other.width);
        for i in 0..res.height {
            for j in 0..res.width {
                let mut sum = 0.0;
                for k in 0..self.width {
                    sum += self.data[i][k] * other.data[k][j];
                }
                res.data[i][j] = sum;
            }
        }

        Ok(res)
    }

    /// Elementwise (Hadamard) product.
    pub fn mul_elementwise(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_map(other, |x, y| x * y)
    }

    /// Elementwise quotient.
    pub fn div_elementwise(&self, other: &Matrix) -> Result<Matrix> {
        self.zip_map(other, |x, y| x / y)
    }

    pub fn transpose(&self) -> Matrix {
        Matrix::from_fn(self.width, self.height, |r, c| self.data[c][r])
    }

    /// Applies the operator to every element and returns a new matrix.
    pub fn map<F>(&self, mut operator: F) -> Matrix
    where
        F: FnMut(f64) -> f64,
    {
        Matrix::from_fn(self.height, self.width, |r, c| operator(self.data[r][c]))
    }

    /// Applies the operator to every element in place.
    pub fn map_inplace<F>(&mut self, mut operator: F)
    where
        F: FnMut(f64) -> f64,
    {
        for row in &mut self.data {
            for element in row {
                *element = operator(*element);
            }
        }
    }

    /// Applies a binary operator elementwise; both operands must have the same
    /// shape.
    pub fn zip_map<F>(&self, other: &Matrix, mut operator: F) -> Result<Matrix>
    where
        F: FnMut(f64, f64) -> f64,
    {
        self.check_same_shape(other)?;
        Ok(Matrix::from_fn(self.height, self.width, |r, c| {
            operator(self.data[r][c], other.data[r][c])
        }))
    }

    /// Applies a binary operator elementwise in place, writing the result into
    /// `self`; both operands must have the same shape.
    pub fn zip_map_inplace<F>(&mut self, other: &Matrix, mut operator: F) -> Result<()>
    where
        F: FnMut(f64, f64) -> f64,
    {
        self.check_same_shape(other)?;
        for (row, other_row) in self.data.iter_mut().zip(&other.data) {
            for (element, &y) in row.iter_mut().zip(other_row) {
                *element = operator(*element, y);
            }
        }
        Ok(())
    }

    /// Applies a binary operator elementwise with wrap-around indexing.
    ///
    /// The result takes the larger height and the larger width of the two
    /// operands; each operand's index wraps modulo its own dimension. Adding a
    /// `1xN` bias row to an `MxN` batch is the typical use. Never fails.
    pub fn zip_map_wrapping<F>(&self, other: &Matrix, mut operator: F) -> Matrix
    where
        F: FnMut(f64, f64) -> f64,
    {
        Matrix::from_fn(
            self.height.max(other.height),
            self.width.max(other.width),
            |r, c| {
                let a = self.data[r % self.height][c % self.width];
                let b = other.data[r % other.height][c % other.width];
                operator(a, b)
            },
        )
    }

    /// Sums each column over all rows, yielding a `1 x width` row.
    pub fn column_sums(&self) -> Matrix {
        Matrix::from_fn(1, self.width, |_, c| {
            self.data.iter().map(|row| row[c]).sum()
        })
    }

    /// Copies the contiguous row slice `[start, end)` into a new matrix.
    pub fn row_range(&self, start: usize, end: usize) -> Matrix {
        assert!(start < end && end <= self.height, "row range out of bounds");
        Matrix::from_rows(self.data[start..end].to_vec())
    }
}
