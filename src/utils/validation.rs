// src/utils/validation.rs

//! Accumulated validity verdicts.
//!
//! Validation never interrupts parsing. Every component reports a
//! `ValidationResult`, and a parent merges the results of its children into
//! its own so the root carries every complaint found anywhere in the tree.

use std::fmt;

/// Tri-state verdict, ordered from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum Validity {
    Valid,
    /// Nothing has been decided. Merging never silently upgrades this to `Valid`.
    #[default]
    Unknown,
    Invalid,
}

/// A validity verdict plus the ordered reasons behind it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationResult {
    validity: Validity,
    reasons: Vec<String>,
}

impl ValidationResult {
    /// A passing result with no reasons. This is the usual starting accumulator.
    pub fn valid() -> Self {
        ValidationResult {
            validity: Validity::Valid,
            reasons: Vec::new(),
        }
    }

    pub fn unknown() -> Self {
        ValidationResult::default()
    }

    pub fn invalid(reason: impl Into<String>) -> Self {
        ValidationResult {
            validity: Validity::Invalid,
            reasons: vec![reason.into()],
        }
    }

    #[inline]
    pub fn validity(&self) -> Validity {
        self.validity
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.validity == Validity::Valid
    }

    pub fn reasons(&self) -> &[String] {
        &self.reasons
    }

    /// Marks the result invalid and records why. Once invalid, always invalid.
    pub fn fail(&mut self, reason: impl Into<String>) {
        self.validity = Validity::Invalid;
        self.reasons.push(reason.into());
    }

    /// Records `reason` as a failure unless `condition` holds.
    pub fn require(&mut self, condition: bool, reason: impl FnOnce() -> String) {
        if !condition {
            self.fail(reason());
        }
    }

    /// Downgrades a valid result to unknown, keeping the note.
    pub fn mark_unknown(&mut self, reason: impl Into<String>) {
        self.validity = self.validity.max(Validity::Unknown);
        self.reasons.push(reason.into());
    }

    /// Folds `other` into `self`: the worse verdict wins and all reasons are kept.
    pub fn merge(&mut self, other: ValidationResult) {
        self.validity = self.validity.max(other.validity);
        self.reasons.extend(other.reasons);
    }

    /// Like [`merge`](Self::merge), but prefixes each incoming reason with `context`.
    pub fn merge_with_context(&mut self, context: &str, other: ValidationResult) {
        self.validity = self.validity.max(other.validity);
        self.reasons
            .extend(other.reasons.into_iter().map(|r| format!("{}: {}", context, r)));
    }

    #[must_use]
    pub fn merged(mut self, other: ValidationResult) -> Self {
        self.merge(other);
        self
    }
}

impl From<&ValidationResult> for bool {
    fn from(result: &ValidationResult) -> Self {
        result.is_valid()
    }
}

impl From<ValidationResult> for bool {
    fn from(result: ValidationResult) -> Self {
        result.is_valid()
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.validity)?;
        for reason in &self.reasons {
            write!(f, "\n  - {}", reason)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_is_monotonic() {
        let all = [
            ValidationResult::valid(),
            ValidationResult::unknown(),
            ValidationResult::invalid("bad"),
        ];
        for a in &all {
            let merged = a.clone().merged(ValidationResult::invalid("worse"));
            assert_eq!(merged.validity(), Validity::Invalid);
            let merged = ValidationResult::invalid("worse").merged(a.clone());
            assert_eq!(merged.validity(), Validity::Invalid);
        }

        let both = ValidationResult::valid().merged(ValidationResult::valid());
        assert!(both.is_valid());
        assert!(bool::from(&both));
    }

    #[test]
    fn test_unknown_is_not_upgraded() {
        let merged = ValidationResult::unknown().merged(ValidationResult::valid());
        assert_eq!(merged.validity(), Validity::Unknown);
        assert!(!bool::from(merged));
    }

    #[test]
    fn test_reasons_are_kept_in_order() {
        let mut left = ValidationResult::invalid("first");
        let mut right = ValidationResult::valid();
        right.fail("second");
        right.fail("third");
        left.merge(right);
        assert_eq!(left.reasons(), ["first", "second", "third"]);
    }

    #[test]
    fn test_require_and_context() {
        let mut result = ValidationResult::valid();
        result.require(1 + 1 == 2, || "arithmetic".to_string());
        assert!(result.is_valid());

        let mut outer = ValidationResult::valid();
        outer.merge_with_context("fmt ", ValidationResult::invalid("Channels is 0"));
        assert_eq!(outer.reasons(), ["fmt : Channels is 0"]);
        assert!(!outer.is_valid());
    }
}
