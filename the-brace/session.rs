//! Lifecycle of one completed delimiter pair.
//!
//! ```text
//!            settle / first event
//!  Started ─────────────────────▶ Tracking
//!                                   │
//!        over-type, pair delete,    │
//!        caret left, span collapsed ▼
//!                                 Exited
//! ```
//!
//! A session only ever looks at its own span. Deciding which session sees an
//! event is the stack's job.

use std::{
  fmt,
  sync::Arc,
};

use the_text::{
  buffer::Buffer,
  transaction::Transaction,
  undo::UndoScope,
};

use crate::{
  Result,
  pairs::DelimiterPair,
  position::TrackingSpan,
  resolver::{
    EditingStrategy,
    ReturnContext,
  },
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
  Started,
  Tracking,
  Exited,
}

/// What a session did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
  /// Not handled, the host's default behaviour applies.
  Pass,
  /// Handled, the caret ends up at `caret`.
  Consumed { caret: usize },
}

pub struct TrackingSession {
  pair:     DelimiterPair,
  span:     TrackingSpan,
  strategy: Arc<dyn EditingStrategy>,
  state:    SessionState,
}

impl fmt::Debug for TrackingSession {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TrackingSession")
      .field("pair", &self.pair)
      .field("span", &self.span)
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

impl TrackingSession {
  pub fn new(pair: DelimiterPair, span: TrackingSpan, strategy: Arc<dyn EditingStrategy>) -> Self {
    Self {
      pair,
      span,
      strategy,
      state: SessionState::Started,
    }
  }

  pub fn pair(&self) -> DelimiterPair {
    self.pair
  }

  pub fn span(&self) -> TrackingSpan {
    self.span
  }

  pub fn state(&self) -> SessionState {
    self.state
  }

  pub fn strategy(&self) -> &Arc<dyn EditingStrategy> {
    &self.strategy
  }

  pub fn is_exited(&self) -> bool {
    self.state == SessionState::Exited
  }

  /// Finish the keystroke that created the session.
  pub fn settle(&mut self) {
    if self.state == SessionState::Started {
      self.state = SessionState::Tracking;
    }
  }

  pub fn exit(&mut self) {
    if self.state != SessionState::Exited {
      tracing::debug!(pair = %self.pair, span = ?self.span, "brace session exited");
      self.state = SessionState::Exited;
    }
  }

  /// Carry the span to the buffer's current version. Returns `false` (and
  /// exits) when the span collapsed.
  pub fn sync(&mut self, buffer: &Buffer) -> bool {
    if self.is_exited() {
      return false;
    }
    match self.span.translate(buffer, self.pair) {
      Some(span) => {
        self.span = span;
        true
      },
      None => {
        tracing::trace!(pair = %self.pair, "brace session span collapsed");
        self.exit();
        false
      },
    }
  }

  fn begin_event(&mut self, buffer: &Buffer) -> bool {
    self.settle();
    self.sync(buffer)
  }

  /// Over-type: typing the closer right before the tracked closer steps over
  /// it instead of inserting a second one. Symmetric pairs work the same
  /// way, the caret position alone tells closing from opening.
  pub fn typed(&mut self, buffer: &Buffer, caret: usize, ch: char) -> Reaction {
    if !self.begin_event(buffer) {
      return Reaction::Pass;
    }
    if ch != self.pair.closing || caret != self.span.closer() {
      return Reaction::Pass;
    }
    if !self.strategy.allow_overtype(&buffer.snapshot(), caret) {
      return Reaction::Pass;
    }

    self.exit();
    Reaction::Consumed {
      caret: self.span.end(),
    }
  }

  /// Backspace inside an empty pair removes both delimiters as one undo
  /// step.
  pub fn backspace(&mut self, buffer: &mut Buffer, caret: usize) -> Result<Reaction> {
    if !self.begin_event(buffer) {
      return Ok(Reaction::Pass);
    }
    if !self.span.is_empty() || caret != self.span.start() {
      return Ok(Reaction::Pass);
    }
    if !self.strategy.allow_pair_delete(&buffer.snapshot(), caret) {
      return Ok(Reaction::Pass);
    }

    let opener = self.span.opener();
    let mut scope = UndoScope::acquire(buffer, caret)?;
    let tx = Transaction::delete(scope.text(), opener, self.span.end())?.with_caret(opener);
    scope.apply(&tx)?;
    let caret = scope.complete()?;

    self.exit();
    Ok(Reaction::Consumed { caret })
  }

  /// Exit as soon as the caret leaves the span.
  pub fn caret_moved(&mut self, buffer: &Buffer, caret: usize) {
    if self.begin_event(buffer) && !self.span.contains(caret) {
      self.exit();
    }
  }

  /// Return inside an empty pair, expanded by the strategy. The session keeps
  /// tracking the now larger span.
  pub fn return_pressed(&mut self, buffer: &mut Buffer, caret: usize) -> Result<Reaction> {
    if !self.begin_event(buffer) {
      return Ok(Reaction::Pass);
    }
    if !self.span.is_empty() || caret != self.span.start() {
      return Ok(Reaction::Pass);
    }

    let snapshot = buffer.snapshot();
    let context = ReturnContext {
      snapshot: &snapshot,
      caret,
      pair: self.pair,
    };
    let Some(edit) = self.strategy.on_return(&context) else {
      return Ok(Reaction::Pass);
    };

    let mut scope = UndoScope::acquire(buffer, caret)?;
    let tx = Transaction::insert(scope.text(), caret, edit.text)?.with_caret(caret + edit.caret);
    scope.apply(&tx)?;
    let caret = scope.complete()?;

    self.sync(buffer);
    Ok(Reaction::Consumed { caret })
  }
}
