//! Legality resolution for brace completion.
//!
//! Whether a pair may be completed at a caret is a per-document-kind
//! question. Each kind registers a [`LegalityResolver`] in a
//! [`ResolverRegistry`]; on success the resolver hands back the
//! [`EditingStrategy`] the new session consults for the rest of its life.
//!
//! Resolvers may be asynchronous internally. [`ResolverRegistry::resolve`]
//! blocks on the answer, so the keystroke is decided before the host's
//! default insertion would run. Errors and panics inside a resolver never
//! escape: they degrade to "no completion" and the keystroke falls back to
//! plain insertion.

use std::{
  collections::HashMap,
  fmt,
  panic::{
    self,
    AssertUnwindSafe,
  },
  sync::Arc,
};

use async_trait::async_trait;
use the_text::buffer::{
  DocumentKind,
  Snapshot,
};

use crate::{
  Tendril,
  config::Registration,
  pairs::{
    self,
    DelimiterPair,
  },
};

/// Everything a resolver gets to see for one keystroke.
#[derive(Debug, Clone)]
pub struct ResolveRequest {
  pub document_kind: DocumentKind,
  pub snapshot:      Snapshot,
  /// Offset the opening delimiter is about to be typed at.
  pub caret:         usize,
  pub opening:       char,
}

#[async_trait]
pub trait LegalityResolver: Send + Sync {
  /// `Ok(None)` declines completion at this point.
  async fn try_resolve(
    &self,
    request: &ResolveRequest,
  ) -> anyhow::Result<Option<Arc<dyn EditingStrategy>>>;
}

/// Input to [`EditingStrategy::on_return`].
#[derive(Debug, Clone, Copy)]
pub struct ReturnContext<'a> {
  pub snapshot: &'a Snapshot,
  pub caret:    usize,
  pub pair:     DelimiterPair,
}

/// Replacement for the newline typed inside an empty pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReturnEdit {
  pub text:  Tendril,
  /// Caret position inside `text`, in chars.
  pub caret: usize,
}

/// Per-session editing hooks chosen by the resolver.
pub trait EditingStrategy: fmt::Debug + Send + Sync {
  /// Whether typing the closer may step over the tracked closer.
  fn allow_overtype(&self, _snapshot: &Snapshot, _caret: usize) -> bool {
    true
  }

  /// Whether backspace inside an empty pair removes both delimiters.
  fn allow_pair_delete(&self, _snapshot: &Snapshot, _caret: usize) -> bool {
    true
  }

  /// Text to insert instead of a plain newline inside an empty pair.
  fn on_return(&self, _context: &ReturnContext<'_>) -> Option<ReturnEdit> {
    None
  }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultStrategy;

impl EditingStrategy for DefaultStrategy {}

/// Splits an empty block over three lines when return is pressed inside it:
///
/// ```text
/// fn main() {|}
///
/// fn main() {
///     |
/// }
/// ```
#[derive(Debug, Clone)]
pub struct BlockStrategy {
  indent_unit: Tendril,
}

impl BlockStrategy {
  pub fn new(indent_unit: impl Into<Tendril>) -> Self {
    Self {
      indent_unit: indent_unit.into(),
    }
  }
}

impl EditingStrategy for BlockStrategy {
  fn on_return(&self, context: &ReturnContext<'_>) -> Option<ReturnEdit> {
    if context.pair.is_symmetric() {
      return None;
    }

    let text = context.snapshot.text();
    let line_start = text.line_to_char(text.char_to_line(context.caret));
    let indent: Tendril = text
      .slice(line_start..context.caret)
      .chars()
      .take_while(|ch| matches!(ch, ' ' | '\t'))
      .collect();

    let mut edit = Tendril::new();
    edit.push('\n');
    edit.push_str(&indent);
    edit.push_str(&self.indent_unit);
    let caret = edit.chars().count();
    edit.push('\n');
    edit.push_str(&indent);

    Some(ReturnEdit { text: edit, caret })
  }
}

/// Completes a pair only where it is unlikely to glue onto a word: the
/// character after the caret must not be alphanumeric, and for quotes the
/// character before must not be either (so `don't` stays unpaired).
#[derive(Debug, Clone)]
pub struct ContextResolver {
  plain: Arc<dyn EditingStrategy>,
  block: Arc<dyn EditingStrategy>,
}

impl ContextResolver {
  pub fn new(indent_unit: impl Into<Tendril>) -> Self {
    Self {
      plain: Arc::new(DefaultStrategy),
      block: Arc::new(BlockStrategy::new(indent_unit)),
    }
  }

  /// Resolver whose block expansion indents by the configured unit.
  pub fn from_registration(registration: &Registration) -> Self {
    Self::new(registration.indent_unit())
  }

  pub fn should_close(snapshot: &Snapshot, caret: usize, pair: DelimiterPair) -> bool {
    let next_is_not_alpha = snapshot
      .char_at(caret)
      .is_none_or(|ch| !ch.is_alphanumeric());
    let prev_is_not_alpha = snapshot
      .char_before(caret)
      .is_none_or(|ch| !ch.is_alphanumeric());
    next_is_not_alpha && (!pair.is_symmetric() || prev_is_not_alpha)
  }
}

#[async_trait]
impl LegalityResolver for ContextResolver {
  async fn try_resolve(
    &self,
    request: &ResolveRequest,
  ) -> anyhow::Result<Option<Arc<dyn EditingStrategy>>> {
    let Some(pair) = pairs::lookup_by_opening(request.opening) else {
      return Ok(None);
    };
    if !Self::should_close(&request.snapshot, request.caret, pair) {
      return Ok(None);
    }

    let strategy = if pair == pairs::CURLY {
      Arc::clone(&self.block)
    } else {
      Arc::clone(&self.plain)
    };
    Ok(Some(strategy))
  }
}

/// Completes every pair everywhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct PermissiveResolver;

#[async_trait]
impl LegalityResolver for PermissiveResolver {
  async fn try_resolve(
    &self,
    _request: &ResolveRequest,
  ) -> anyhow::Result<Option<Arc<dyn EditingStrategy>>> {
    Ok(Some(Arc::new(DefaultStrategy)))
  }
}

/// Resolvers keyed by document kind.
#[derive(Default, Clone)]
pub struct ResolverRegistry {
  resolvers: HashMap<DocumentKind, Arc<dyn LegalityResolver>>,
}

impl fmt::Debug for ResolverRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_set().entries(self.resolvers.keys()).finish()
  }
}

impl ResolverRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register `resolver` for `kind`, replacing any previous one.
  pub fn register(&mut self, kind: DocumentKind, resolver: Arc<dyn LegalityResolver>) {
    self.resolvers.insert(kind, resolver);
  }

  pub fn with(mut self, kind: impl Into<DocumentKind>, resolver: impl LegalityResolver + 'static) -> Self {
    self.register(kind.into(), Arc::new(resolver));
    self
  }

  pub fn get(&self, kind: &DocumentKind) -> Option<&Arc<dyn LegalityResolver>> {
    self.resolvers.get(kind)
  }

  pub fn kinds(&self) -> impl Iterator<Item = &DocumentKind> {
    self.resolvers.keys()
  }

  /// Ask the resolver registered for the request's document kind, blocking
  /// until it answers. Every failure mode yields `None`.
  pub fn resolve(&self, request: &ResolveRequest) -> Option<Arc<dyn EditingStrategy>> {
    let Some(resolver) = self.resolvers.get(&request.document_kind) else {
      tracing::trace!(kind = %request.document_kind, "no legality resolver registered");
      return None;
    };

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
      pollster::block_on(resolver.try_resolve(request))
    }));

    match outcome {
      Ok(Ok(Some(strategy))) => Some(strategy),
      Ok(Ok(None)) => {
        tracing::debug!(
          kind = %request.document_kind,
          caret = request.caret,
          opening = ?request.opening,
          "legality resolver declined completion"
        );
        None
      },
      Ok(Err(err)) => {
        tracing::warn!(kind = %request.document_kind, "legality resolver failed: {err:#}");
        None
      },
      Err(_) => {
        tracing::warn!(kind = %request.document_kind, "legality resolver panicked");
        None
      },
    }
  }
}

#[cfg(test)]
mod test {
  use std::num::NonZeroUsize;

  use ropey::Rope;
  use the_text::buffer::{
    Buffer,
    BufferId,
  };

  use super::*;

  struct Failing;

  #[async_trait]
  impl LegalityResolver for Failing {
    async fn try_resolve(
      &self,
      _request: &ResolveRequest,
    ) -> anyhow::Result<Option<Arc<dyn EditingStrategy>>> {
      anyhow::bail!("analysis unavailable")
    }
  }

  struct Panicking;

  #[async_trait]
  impl LegalityResolver for Panicking {
    async fn try_resolve(
      &self,
      _request: &ResolveRequest,
    ) -> anyhow::Result<Option<Arc<dyn EditingStrategy>>> {
      panic!("resolver bug")
    }
  }

  fn request(kind: &str, text: &str, caret: usize, opening: char) -> ResolveRequest {
    let id = BufferId::new(NonZeroUsize::new(1).unwrap());
    let buffer = Buffer::new(id, DocumentKind::from(kind), Rope::from(text));
    ResolveRequest {
      document_kind: buffer.kind().clone(),
      snapshot: buffer.snapshot(),
      caret,
      opening,
    }
  }

  #[test]
  fn context_resolver_follows_neighbours() {
    let registry = ResolverRegistry::new().with("text", ContextResolver::new("  "));

    assert!(registry.resolve(&request("text", "", 0, '(')).is_some());
    assert!(registry.resolve(&request("text", "foo ", 4, '(')).is_some());
    // next char is a word char
    assert!(registry.resolve(&request("text", "foo", 0, '(')).is_none());
    // quote right after a word
    assert!(registry.resolve(&request("text", "don", 3, '\'')).is_none());
    assert!(registry.resolve(&request("text", "x = ", 4, '"')).is_some());
    // brackets don't care about the previous char
    assert!(registry.resolve(&request("text", "vec", 3, '[')).is_some());
    // not a catalog opener
    assert!(registry.resolve(&request("text", "", 0, 'x')).is_none());
  }

  #[test]
  fn context_resolver_uses_configured_indent() {
    let config = crate::config::BraceConfig {
      indent_unit: "\t".to_string(),
      ..Default::default()
    };
    let registration = Registration::from_config(&config).unwrap();
    let registry =
      ResolverRegistry::new().with("text", ContextResolver::from_registration(&registration));

    let req = request("text", "{}", 1, '{');
    let strategy = registry.resolve(&request("text", "", 0, '{')).unwrap();
    let context = ReturnContext {
      snapshot: &req.snapshot,
      caret:    1,
      pair:     pairs::CURLY,
    };
    let edit = strategy.on_return(&context).unwrap();
    assert_eq!(edit.text.as_str(), "\n\t\n");
    assert_eq!(edit.caret, 2);
  }

  #[test]
  fn unknown_kind_declines() {
    let registry = ResolverRegistry::new().with("rust", PermissiveResolver);
    assert!(registry.resolve(&request("markdown", "", 0, '(')).is_none());
    assert!(registry.resolve(&request("rust", "abc", 0, '(')).is_some());
  }

  #[test]
  fn failures_degrade_to_none() {
    let registry = ResolverRegistry::new()
      .with("failing", Failing)
      .with("panicking", Panicking);

    assert!(registry.resolve(&request("failing", "", 0, '(')).is_none());
    assert!(registry.resolve(&request("panicking", "", 0, '(')).is_none());
  }

  #[test]
  fn block_strategy_splits_lines() {
    let strategy = BlockStrategy::new("    ");
    let req = request("text", "  fn main() {}", 13, '{');
    let context = ReturnContext {
      snapshot: &req.snapshot,
      caret:    13,
      pair:     pairs::CURLY,
    };

    let edit = strategy.on_return(&context).unwrap();
    assert_eq!(edit.text.as_str(), "\n      \n  ");
    assert_eq!(edit.caret, 7);

    let quotes = ReturnContext {
      pair: pairs::DOUBLE_QUOTE,
      ..context
    };
    assert_eq!(strategy.on_return(&quotes), None);
    assert_eq!(DefaultStrategy.on_return(&context), None);
  }
}
