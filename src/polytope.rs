use faer::{Col, Mat};
use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug, PartialEq)]
pub enum PolytopeError {
    #[error("row {row} of the constraint matrix has {found} entries, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("constraint matrix has {rows} rows but {bounds} bounds were given")]
    BoundCount { rows: usize, bounds: usize },
    #[error("constraint matrix has no rows")]
    Empty,
}

/// The region `{x : A x ≤ b}`.
#[derive(Debug, Clone)]
pub struct Polytope {
    a: Mat<f64>,
    b: Col<f64>,
}

impl Polytope {
    pub fn new(a: Mat<f64>, b: Col<f64>) -> Result<Self, PolytopeError> {
        if a.nrows() == 0 {
            return Err(PolytopeError::Empty);
        }
        if a.nrows() != b.nrows() {
            return Err(PolytopeError::BoundCount {
                rows: a.nrows(),
                bounds: b.nrows(),
            });
        }
        Ok(Polytope { a, b })
    }

    /// Build from row-major nested slices.
    pub fn from_rows(rows: &[Vec<f64>], bounds: &[f64]) -> Result<Self, PolytopeError> {
        let dim = rows.first().ok_or(PolytopeError::Empty)?.len();
        if let Some((row, found)) = rows
            .iter()
            .map(Vec::len)
            .enumerate()
            .find(|&(_, len)| len != dim)
        {
            return Err(PolytopeError::RaggedRow {
                row,
                expected: dim,
                found,
            });
        }
        let a = Mat::from_fn(rows.len(), dim, |i, j| rows[i][j]);
        let b = Col::from_fn(bounds.len(), |i| bounds[i]);
        Self::new(a, b)
    }

    pub fn dim(&self) -> usize {
        self.a.ncols()
    }

    pub fn num_constraints(&self) -> usize {
        self.a.nrows()
    }

    /// `b − A x`, nonnegative in every entry exactly when `x` is feasible.
    pub fn slack(&self, point: &[f64]) -> Col<f64> {
        assert!(point.len() == self.dim());
        let x = Col::from_fn(point.len(), |i| point[i]);
        let ax = self.a.as_ref() * x.as_ref();
        Col::from_fn(self.num_constraints(), |i| self.b[i] - ax[i])
    }

    /// Whether `A x ≤ b` holds in every row. NaN coordinates are infeasible.
    pub fn contains(&self, point: &[f64]) -> bool {
        point.len() == self.dim() && self.slack(point).iter().all(|&s| s >= 0.)
    }
}
