//! Convenient re-exports for downstream crates.

pub use crate::attribute::{Attribute, AttributeSet};
pub use crate::config::EngineConfig;
pub use crate::context::Context;
pub use crate::error::{Error, Result};
pub use crate::filter::{CursorToken, Paging, PagingCursor, RowFilter, SortExpr, SortExprSet};
pub use crate::schema::{DataType, FrameColumn, FrameDescription, FrameDescriptionSet};
pub use crate::types::{Row, Scalar};
