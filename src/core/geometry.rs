//! Terminal geometry
//!
//! Viewport size in character cells, shared by the surface, the bridge and
//! the session controller.

use std::fmt;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("Terminal geometry must be non-zero (got {columns}x{rows})")]
    Empty { columns: u16, rows: u16 },
}

/// Terminal viewport size in character cells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Geometry {
    columns: u16,
    rows: u16,
}

impl Geometry {
    /// Geometry used before the surface has been measured
    pub const DEFAULT: Geometry = Geometry { columns: 80, rows: 24 };

    /// Create a geometry, rejecting zero-sized dimensions
    pub fn new(columns: u16, rows: u16) -> Result<Self, GeometryError> {
        if columns == 0 || rows == 0 {
            return Err(GeometryError::Empty { columns, rows });
        }
        Ok(Self { columns, rows })
    }

    /// Create a geometry, clamping each dimension to at least one cell
    pub fn clamped(columns: u16, rows: u16) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }

    pub fn columns(&self) -> u16 {
        self.columns
    }

    pub fn rows(&self) -> u16 {
        self.rows
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.columns, self.rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_zero() {
        assert_eq!(
            Geometry::new(0, 24),
            Err(GeometryError::Empty { columns: 0, rows: 24 })
        );
        assert!(Geometry::new(80, 0).is_err());
        assert!(Geometry::new(1, 1).is_ok());
    }

    #[test]
    fn test_clamped() {
        let geometry = Geometry::clamped(0, 0);
        assert_eq!((geometry.columns(), geometry.rows()), (1, 1));
        assert_eq!(Geometry::clamped(100, 30).to_string(), "100x30");
    }
}
