//! Brace completion settings and the registration built from them.
//!
//! ```toml
//! enable = true
//! document-kinds = ["rust", "text"]
//! disabled-pairs = ["<"]
//! indent-unit = "    "
//! ```

use serde::{
  Deserialize,
  Serialize,
};
use smallvec::SmallVec;
use the_text::buffer::DocumentKind;
use thiserror::Error;

use crate::{
  Tendril,
  pairs::{
    self,
    CatalogError,
    DelimiterPair,
  },
};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
  #[error("invalid brace completion config: {0}")]
  Toml(#[from] toml::de::Error),
  #[error("disabled pair {0:?} is not an opening delimiter")]
  UnknownPair(char),
  #[error(transparent)]
  Catalog(#[from] CatalogError),
  #[error("indent unit must not be empty")]
  EmptyIndentUnit,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default, deny_unknown_fields)]
pub struct BraceConfig {
  pub enable:         bool,
  /// Kinds brace completion applies to. Empty means every kind.
  pub document_kinds: Vec<String>,
  /// Opening characters of pairs that are never completed.
  pub disabled_pairs: Vec<char>,
  pub indent_unit:    String,
}

impl Default for BraceConfig {
  fn default() -> Self {
    Self {
      enable:         true,
      document_kinds: Vec::new(),
      disabled_pairs: Vec::new(),
      indent_unit:    "    ".to_string(),
    }
  }
}

impl BraceConfig {
  pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
    Ok(toml::from_str(source)?)
  }
}

/// Validated, immutable registration metadata.
#[derive(Debug, Clone)]
pub struct Registration {
  enabled:        bool,
  pairs:          SmallVec<[DelimiterPair; 6]>,
  document_kinds: Vec<DocumentKind>,
  indent_unit:    Tendril,
}

impl Default for Registration {
  fn default() -> Self {
    Self {
      enabled:        true,
      pairs:          pairs::CATALOG.iter().copied().collect(),
      document_kinds: Vec::new(),
      indent_unit:    Tendril::from("    "),
    }
  }
}

impl Registration {
  pub fn from_config(config: &BraceConfig) -> Result<Self, ConfigError> {
    pairs::validate_catalog(pairs::CATALOG)?;

    if let Some(&unknown) = config
      .disabled_pairs
      .iter()
      .find(|&&opening| pairs::lookup_by_opening(opening).is_none())
    {
      return Err(ConfigError::UnknownPair(unknown));
    }
    if config.indent_unit.is_empty() {
      return Err(ConfigError::EmptyIndentUnit);
    }

    let pairs = pairs::CATALOG
      .iter()
      .copied()
      .filter(|pair| !config.disabled_pairs.contains(&pair.opening))
      .collect();
    let document_kinds = config
      .document_kinds
      .iter()
      .map(|kind| DocumentKind::from(kind.as_str()))
      .collect();

    Ok(Self {
      enabled: config.enable,
      pairs,
      document_kinds,
      indent_unit: Tendril::from(config.indent_unit.as_str()),
    })
  }

  pub fn is_enabled(&self) -> bool {
    self.enabled
  }

  pub fn pairs(&self) -> &[DelimiterPair] {
    &self.pairs
  }

  /// Catalog lookup restricted to the enabled pairs.
  pub fn lookup(&self, opening: char) -> Option<DelimiterPair> {
    pairs::lookup_by_opening(opening).filter(|pair| self.pairs.contains(pair))
  }

  pub fn document_kinds(&self) -> &[DocumentKind] {
    &self.document_kinds
  }

  pub fn applies_to(&self, kind: &DocumentKind) -> bool {
    self.enabled && (self.document_kinds.is_empty() || self.document_kinds.contains(kind))
  }

  pub fn indent_unit(&self) -> &str {
    &self.indent_unit
  }
}
