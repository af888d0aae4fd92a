use smallvec::SmallVec;
use the_text::buffer::Buffer;
use thiserror::Error;

use crate::{
  pairs::DelimiterPair,
  session::TrackingSession,
};

#[derive(Debug, Error, PartialEq, Eq)]
#[non_exhaustive]
pub enum StackError {
  #[error("{inner} at {start}..{end} is not nested inside the active {outer} session")]
  NotNested {
    outer: DelimiterPair,
    inner: DelimiterPair,
    start: usize,
    end:   usize,
  },
}

/// Active sessions of one caret, innermost last.
///
/// Every session's span encloses both delimiters of the session above it.
#[derive(Debug, Default)]
pub struct SessionStack {
  sessions: SmallVec<[TrackingSession; 4]>,
}

impl SessionStack {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn len(&self) -> usize {
    self.sessions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sessions.is_empty()
  }

  pub fn top(&self) -> Option<&TrackingSession> {
    self.sessions.last()
  }

  pub fn top_mut(&mut self) -> Option<&mut TrackingSession> {
    self.sessions.last_mut()
  }

  /// Push `session`, whose span must be valid for `buffer`'s current
  /// version. Rejected unless the current top encloses it.
  pub fn push(&mut self, buffer: &Buffer, session: TrackingSession) -> Result<(), StackError> {
    self.sync(buffer);
    if let Some(top) = self.sessions.last() {
      let inner = session.span();
      if !top.span().encloses(&inner) {
        return Err(StackError::NotNested {
          outer: top.pair(),
          inner: session.pair(),
          start: inner.start(),
          end:   inner.end(),
        });
      }
    }

    tracing::debug!(
      pair = %session.pair(),
      depth = self.sessions.len() + 1,
      "brace session started"
    );
    self.sessions.push(session);
    Ok(())
  }

  pub fn pop(&mut self) -> Option<TrackingSession> {
    self.sessions.pop()
  }

  /// Drop exited sessions from the top.
  pub fn pop_exited(&mut self) {
    while self.top().is_some_and(TrackingSession::is_exited) {
      self.sessions.pop();
    }
  }

  /// Carry every span to the buffer's current version and drop the
  /// sessions that collapsed. Outer spans move with each event too, so the
  /// journal only has to reach back to the previous event.
  pub fn sync(&mut self, buffer: &Buffer) {
    self.sessions.retain(|session| session.sync(buffer));
  }

  /// Sync, then drop sessions from the top until one holds `caret`.
  pub fn prune(&mut self, buffer: &Buffer, caret: usize) {
    self.sync(buffer);
    while let Some(top) = self.sessions.last() {
      if top.span().contains(caret) {
        break;
      }
      tracing::trace!(pair = %top.pair(), caret, "pruning brace session");
      self.sessions.pop();
    }
  }

  /// Whether a pair opened at `caret` would nest inside the current top.
  /// Expects [`SessionStack::prune`] to have run for this version.
  pub fn accepts(&self, caret: usize) -> bool {
    self
      .top()
      .is_none_or(|top| !top.is_exited() && top.span().contains(caret))
  }

  /// Move a freshly pushed session from `Started` to `Tracking`.
  pub fn settle(&mut self) {
    if let Some(top) = self.sessions.last_mut() {
      top.settle();
    }
  }
}
