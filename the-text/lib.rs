use smartstring::{
  LazyCompact,
  SmartString,
};

pub mod buffer;
pub mod history;
pub mod transaction;
pub mod undo;

pub type Tendril = SmartString<LazyCompact>;
