//! Empire orders: what they are and how they are applied.

pub mod apply;
pub mod set;

pub use apply::{apply_order_set, execute_order, OrderContext, OrderError, SHIPYARD};
pub use set::{Order, OrderSet};
