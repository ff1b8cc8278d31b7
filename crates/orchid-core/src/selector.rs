//! Label selectors, in the Kubernetes text syntax.
//!
//! Supported requirement forms, joined by commas (all must hold):
//!
//! | Form | Meaning |
//! |------|---------|
//! | `k=v`, `k==v` | label `k` equals `v` |
//! | `k!=v` | label `k` is absent or differs from `v` |
//! | `k in (a,b)` | label `k` is one of the values |
//! | `k notin (a,b)` | label `k` is absent or none of the values |
//! | `k` | label `k` is present |
//! | `!k` | label `k` is absent |

use std::{collections::BTreeMap, fmt, str::FromStr};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
  Equals,
  NotEquals,
  In,
  NotIn,
  Exists,
  DoesNotExist,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
  pub key:      String,
  pub operator: Operator,
  pub values:   Vec<String>,
}

impl Requirement {
  pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
    let value = labels.get(&self.key);
    match self.operator {
      Operator::Equals | Operator::In => value.is_some_and(|v| self.values.contains(v)),
      Operator::NotEquals | Operator::NotIn => {
        value.is_none_or(|v| !self.values.contains(v))
      }
      Operator::Exists => value.is_some(),
      Operator::DoesNotExist => value.is_none(),
    }
  }
}

impl fmt::Display for Requirement {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let key = &self.key;
    match self.operator {
      Operator::Equals => write!(f, "{key}={}", self.values.join("")),
      Operator::NotEquals => write!(f, "{key}!={}", self.values.join("")),
      Operator::In => write!(f, "{key} in ({})", self.values.join(",")),
      Operator::NotIn => write!(f, "{key} notin ({})", self.values.join(",")),
      Operator::Exists => write!(f, "{key}"),
      Operator::DoesNotExist => write!(f, "!{key}"),
    }
  }
}

/// A conjunction of [`Requirement`]s. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
  pub requirements: Vec<Requirement>,
}

impl LabelSelector {
  pub fn everything() -> Self { Self::default() }

  pub fn is_empty(&self) -> bool { self.requirements.is_empty() }

  pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
    self.requirements.iter().all(|r| r.matches(labels))
  }
}

impl fmt::Display for LabelSelector {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let terms: Vec<String> = self.requirements.iter().map(ToString::to_string).collect();
    f.write_str(&terms.join(","))
  }
}

impl FromStr for LabelSelector {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let requirements = split_terms(s)
      .into_iter()
      .map(str::trim)
      .filter(|term| !term.is_empty())
      .map(parse_requirement)
      .collect::<Result<_>>()?;
    Ok(Self { requirements })
  }
}

/// Split on commas that are not inside a parenthesised value set.
fn split_terms(s: &str) -> Vec<&str> {
  let mut terms = Vec::new();
  let mut depth = 0usize;
  let mut start = 0;
  for (i, c) in s.char_indices() {
    match c {
      '(' => depth += 1,
      ')' => depth = depth.saturating_sub(1),
      ',' if depth == 0 => {
        terms.push(&s[start..i]);
        start = i + 1;
      }
      _ => {}
    }
  }
  terms.push(&s[start..]);
  terms
}

fn parse_requirement(term: &str) -> Result<Requirement> {
  let invalid = || Error::InvalidSelector(term.to_owned());

  if let Some((head, rest)) = term.split_once('(') {
    let set = rest.trim_end().strip_suffix(')').ok_or_else(invalid)?;
    let (key, op) = head.trim().rsplit_once(char::is_whitespace).ok_or_else(invalid)?;
    let operator = match op {
      "in" => Operator::In,
      "notin" => Operator::NotIn,
      _ => return Err(invalid()),
    };
    let values: Vec<String> = set
      .split(',')
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .map(str::to_owned)
      .collect();
    if values.is_empty() {
      return Err(invalid());
    }
    return requirement(key.trim(), operator, values, term);
  }

  if let Some(key) = term.strip_prefix('!')
    && !key.contains('=')
  {
    return requirement(key.trim(), Operator::DoesNotExist, vec![], term);
  }

  let (key, operator, value) = if let Some((k, v)) = term.split_once("!=") {
    (k, Operator::NotEquals, v)
  } else if let Some((k, v)) = term.split_once("==") {
    (k, Operator::Equals, v)
  } else if let Some((k, v)) = term.split_once('=') {
    (k, Operator::Equals, v)
  } else {
    return requirement(term, Operator::Exists, vec![], term);
  };
  requirement(key.trim(), operator, vec![value.trim().to_owned()], term)
}

fn requirement(
  key: &str,
  operator: Operator,
  values: Vec<String>,
  term: &str,
) -> Result<Requirement> {
  let key_ok = !key.is_empty()
    && key
      .chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/'));
  let values_ok = values.iter().all(|v| {
    v.chars()
      .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
  });
  if !key_ok || !values_ok {
    return Err(Error::InvalidSelector(term.to_owned()));
  }
  Ok(Requirement {
    key: key.to_owned(),
    operator,
    values,
  })
}
