//! Editable text buffer with versioned snapshots.
//!
//! A [`Buffer`] owns the text, its undo [`History`] and a short journal of
//! the changes that produced each version. Readers that recorded offsets
//! against an older version (tracking spans, carets) carry them forward with
//! [`Buffer::changes_since`].
//!
//! # Example
//!
//! ```
//! use std::num::NonZeroUsize;
//!
//! use ropey::Rope;
//! use the_text::{
//!   buffer::{
//!     Buffer,
//!     BufferId,
//!     DocumentKind,
//!   },
//!   transaction::{
//!     Assoc,
//!     Transaction,
//!   },
//! };
//!
//! let id = BufferId::new(NonZeroUsize::new(1).unwrap());
//! let mut buffer = Buffer::new(id, DocumentKind::from("rust"), Rope::from("()"));
//! let before = buffer.version();
//!
//! let tx = Transaction::insert(buffer.text(), 1, "x".into()).unwrap();
//! buffer.apply_transaction(&tx).unwrap();
//! buffer.commit(1, 2).unwrap();
//!
//! let changes = buffer.changes_since(before).unwrap().unwrap();
//! assert_eq!(changes.map_pos(1, Assoc::After).unwrap(), 2);
//! ```

use std::{
  collections::VecDeque,
  fmt,
  num::NonZeroUsize,
};

use ropey::Rope;
use thiserror::Error;

use crate::{
  Tendril,
  history::{
    History,
    HistoryError,
    HistoryJump,
  },
  transaction::{
    ChangeSet,
    Transaction,
    TransactionError,
  },
};

/// Number of versions [`Buffer::changes_since`] can reach back.
pub const MAX_JOURNAL_LEN: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(NonZeroUsize);

impl BufferId {
  pub const fn new(id: NonZeroUsize) -> Self {
    Self(id)
  }

  pub const fn get(self) -> NonZeroUsize {
    self.0
  }
}

impl From<NonZeroUsize> for BufferId {
  fn from(value: NonZeroUsize) -> Self {
    Self::new(value)
  }
}

/// Content type of a buffer, e.g. `rust` or `text`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentKind(Tendril);

impl DocumentKind {
  pub fn new(kind: impl Into<Tendril>) -> Self {
    Self(kind.into())
  }

  pub fn as_str(&self) -> &str {
    self.0.as_str()
  }
}

impl From<&str> for DocumentKind {
  fn from(kind: &str) -> Self {
    Self::new(kind)
  }
}

impl fmt::Display for DocumentKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

#[derive(Debug, Error)]
pub enum BufferError {
  #[error("buffer is readonly")]
  Readonly,
  #[error(transparent)]
  Transaction(#[from] TransactionError),
  #[error(transparent)]
  History(#[from] HistoryError),
}

pub type Result<T> = std::result::Result<T, BufferError>;

/// Immutable view of a buffer at one version.
#[derive(Debug, Clone)]
pub struct Snapshot {
  text:    Rope,
  version: u64,
  kind:    DocumentKind,
}

impl Snapshot {
  pub fn text(&self) -> &Rope {
    &self.text
  }

  pub fn version(&self) -> u64 {
    self.version
  }

  pub fn kind(&self) -> &DocumentKind {
    &self.kind
  }

  pub fn len_chars(&self) -> usize {
    self.text.len_chars()
  }

  /// Character starting at `pos`.
  pub fn char_at(&self, pos: usize) -> Option<char> {
    self.text.get_char(pos)
  }

  /// Character ending at `pos`.
  pub fn char_before(&self, pos: usize) -> Option<char> {
    pos.checked_sub(1).and_then(|prev| self.text.get_char(prev))
  }
}

#[derive(Debug)]
pub struct Buffer {
  id:           BufferId,
  kind:         DocumentKind,
  text:         Rope,
  history:      History,
  /// Edits applied since the last commit, composed.
  pending:      ChangeSet,
  /// Text at the last commit, present while `pending` is non-empty.
  old_text:     Option<Rope>,
  version:      u64,
  readonly:     bool,
  journal:      VecDeque<ChangeSet>,
  /// Version the first journal entry applies to.
  journal_base: u64,
}

impl Buffer {
  pub fn new(id: BufferId, kind: DocumentKind, text: Rope) -> Self {
    let pending = ChangeSet::new(text.slice(..));
    Self {
      id,
      kind,
      text,
      history: History::default(),
      pending,
      old_text: None,
      version: 0,
      readonly: false,
      journal: VecDeque::new(),
      journal_base: 0,
    }
  }

  pub fn id(&self) -> BufferId {
    self.id
  }

  pub fn kind(&self) -> &DocumentKind {
    &self.kind
  }

  pub fn text(&self) -> &Rope {
    &self.text
  }

  pub fn len_chars(&self) -> usize {
    self.text.len_chars()
  }

  /// Incremented on every text change, including undo and rollback.
  pub fn version(&self) -> u64 {
    self.version
  }

  pub fn is_readonly(&self) -> bool {
    self.readonly
  }

  pub fn set_readonly(&mut self, readonly: bool) {
    self.readonly = readonly;
  }

  pub fn history(&self) -> &History {
    &self.history
  }

  /// Whether edits were applied since the last commit.
  pub fn has_pending(&self) -> bool {
    self.old_text.is_some()
  }

  pub fn snapshot(&self) -> Snapshot {
    Snapshot {
      text:    self.text.clone(),
      version: self.version,
      kind:    self.kind.clone(),
    }
  }

  pub fn apply_transaction(&mut self, transaction: &Transaction) -> Result<()> {
    if self.readonly {
      return Err(BufferError::Readonly);
    }

    let changes = transaction.changes();
    if changes.is_empty() {
      return Ok(());
    }

    let before = self.text.clone();
    changes.apply(&mut self.text)?;

    let prior = std::mem::take(&mut self.pending);
    self.pending = match prior.compose(changes.clone()) {
      Ok(pending) => pending,
      Err(err) => {
        self.text = before;
        return Err(err.into());
      },
    };
    self.old_text.get_or_insert(before);

    self.record(changes.clone());
    Ok(())
  }

  /// Turn everything applied since the last commit into one undo step.
  pub fn commit(&mut self, caret_before: usize, caret_after: usize) -> Result<()> {
    let Some(original) = self.old_text.take() else {
      return Ok(());
    };

    let pending = std::mem::replace(&mut self.pending, ChangeSet::new(self.text.slice(..)));
    let tx = Transaction::from(pending).with_caret(caret_after);
    self.history.commit_revision(&tx, &original, caret_before)?;
    Ok(())
  }

  /// Revert everything applied since the last commit.
  pub fn rollback(&mut self) -> Result<()> {
    let Some(original) = self.old_text.take() else {
      return Ok(());
    };

    let pending = std::mem::replace(&mut self.pending, ChangeSet::new(original.slice(..)));
    let revert = pending.invert(&original)?;
    self.text = original;
    self.record(revert);
    tracing::debug!(buffer = ?self.id, version = self.version, "rolled back uncommitted edits");
    Ok(())
  }

  /// Undo one revision. Returns the restored caret, or `None` at the root.
  pub fn undo(&mut self) -> Result<Option<usize>> {
    let Some(jump) = self.history.undo() else {
      return Ok(None);
    };
    self.apply_history_jump(&jump)?;
    self.history.apply_jump(&jump)?;
    Ok(jump.caret())
  }

  /// Redo one revision. Returns the restored caret, or `None` without a
  /// redo.
  pub fn redo(&mut self) -> Result<Option<usize>> {
    let Some(jump) = self.history.redo() else {
      return Ok(None);
    };
    self.apply_history_jump(&jump)?;
    self.history.apply_jump(&jump)?;
    Ok(jump.caret())
  }

  fn apply_history_jump(&mut self, jump: &HistoryJump) -> Result<()> {
    if self.readonly {
      return Err(BufferError::Readonly);
    }
    self.commit(0, 0)?;

    for tx in &jump.transactions {
      tx.apply(&mut self.text)?;
      self.record(tx.changes().clone());
    }

    self.pending = ChangeSet::new(self.text.slice(..));
    Ok(())
  }

  /// Changes between `version` and the current text, composed into one
  /// changeset. `None` when `version` is newer than the buffer or older than
  /// the journal reaches.
  pub fn changes_since(&self, version: u64) -> Result<Option<ChangeSet>> {
    if version > self.version || version < self.journal_base {
      return Ok(None);
    }

    let skip = (version - self.journal_base) as usize;
    let mut entries = self.journal.iter().skip(skip).cloned();
    let Some(first) = entries.next() else {
      return Ok(Some(ChangeSet::new(self.text.slice(..))));
    };

    let composed = entries.try_fold(first, ChangeSet::compose)?;
    Ok(Some(composed))
  }

  fn record(&mut self, changes: ChangeSet) {
    self.version = self.version.saturating_add(1);
    self.journal.push_back(changes);
    while self.journal.len() > MAX_JOURNAL_LEN {
      self.journal.pop_front();
      self.journal_base += 1;
    }
    tracing::trace!(buffer = ?self.id, version = self.version, "buffer changed");
  }
}
