//! Error types for the DAT packfile codec

pub use crate::common::{DatError, Result};
