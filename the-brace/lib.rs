//! Automatic brace completion.
//!
//! Typing an opening delimiter inserts its closer, leaves the caret between
//! the two and starts a tracking session for the pair. While the session is
//! active, typing the closer steps over it, backspace in the empty pair
//! removes both halves and return may expand the pair into a block. The
//! session ends once the caret leaves the pair or either delimiter
//! disappears.
//!
//! ```
//! use std::{
//!   num::NonZeroUsize,
//!   sync::Arc,
//! };
//!
//! use ropey::Rope;
//! use the_brace::{
//!   config::Registration,
//!   handler::BraceCompletion,
//!   position::{
//!     CaretId,
//!     CaretPosition,
//!   },
//!   resolver::{
//!     PermissiveResolver,
//!     ResolverRegistry,
//!   },
//! };
//! use the_text::buffer::{
//!   Buffer,
//!   BufferId,
//!   DocumentKind,
//! };
//!
//! let resolvers = ResolverRegistry::new().with("text", PermissiveResolver);
//! let mut completion = BraceCompletion::new(Arc::new(Registration::default()), Arc::new(resolvers));
//! let mut buffer = Buffer::new(
//!   BufferId::new(NonZeroUsize::new(1).unwrap()),
//!   DocumentKind::from("text"),
//!   Rope::new(),
//! );
//! let caret = CaretId::new(NonZeroUsize::new(1).unwrap());
//!
//! let mut pos = CaretPosition::at(&buffer, 0);
//! for ch in "(x)".chars() {
//!   pos = completion.character_typed(&mut buffer, caret, pos, ch).unwrap();
//! }
//! assert_eq!(buffer.text().to_string(), "(x)");
//! assert_eq!(pos.offset, 3);
//! ```

pub mod config;
pub mod factory;
pub mod handler;
pub mod pairs;
pub mod position;
pub mod resolver;
pub mod session;
pub mod stack;

pub use the_text::Tendril;
use the_text::{
  buffer::BufferError,
  transaction::TransactionError,
};
use thiserror::Error;

use crate::stack::StackError;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BraceError {
  #[error("caret position {offset} belongs to version {version}, buffer is at {current}")]
  StalePosition {
    offset:  usize,
    version: u64,
    current: u64,
  },
  #[error(transparent)]
  Buffer(#[from] BufferError),
  #[error(transparent)]
  Transaction(#[from] TransactionError),
  #[error(transparent)]
  Stack(#[from] StackError),
}

pub type Result<T> = std::result::Result<T, BraceError>;
