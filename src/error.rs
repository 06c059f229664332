use thiserror::Error;

/// Errors raised by the LP/IP engine.
///
/// Algorithmic outcomes such as infeasibility or unboundedness are not errors;
/// they are reported through [`SolveStatus`](crate::math::optimization::SolveStatus).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Malformed input: ragged rows, mismatched variable counts and the like.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A pivot was requested on a numerically negligible element.
    #[error("singular pivot at row {row}, column {column} (value {value:e})")]
    SingularPivot { row: usize, column: usize, value: f64 },

    /// Gauss-Jordan elimination found no usable pivot in a column of `B`.
    #[error("basis matrix is singular: no nonzero pivot in column {column}")]
    SingularBasis { column: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Sensitivity analysis needs an optimal tableau.
    #[error("sensitivity analysis requires an optimal solution")]
    NotOptimal,

    #[error("column {column} is a basic variable")]
    VariableIsBasic { column: usize },

    #[error("column {column} is not a basic variable")]
    VariableNotBasic { column: usize },

    #[error("{what} index {index} out of range (len {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },
}

impl Error {
    pub fn dimension_mismatch(message: impl Into<String>) -> Self {
        Error::DimensionMismatch(message.into())
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Error::InvalidInput(message.into())
    }

    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Error::Parse {
            line,
            message: message.into(),
        }
    }

    pub(crate) fn out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        Error::IndexOutOfRange { what, index, len }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
