//! Enum registry (spec component C8): an ordered mapping of enum-type-name
//! to its ordered name-to-value elements, built as `enum` declarations are
//! walked and consulted later wherever an enum's element names or its
//! maximum value are needed.

use crate::error::TypeError;
use indexmap::IndexMap;
use zx_common::Position;

#[derive(Debug, Clone, Default)]
pub struct EnumType {
    pub tag: Option<String>,
    elements: IndexMap<String, i64>,
}

impl EnumType {
    pub fn find_element(&self, name: &str) -> Option<i64> {
        self.elements.get(name).copied()
    }

    /// First element (in declaration order) whose value equals `value`.
    pub fn find_by_value(&self, value: i64) -> Option<&str> {
        self.elements.iter().find(|(_, v)| **v == value).map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i64)> {
        self.elements.iter().map(|(name, v)| (name.as_str(), *v))
    }

    pub fn max_val(&self) -> i64 {
        self.elements.values().copied().max().unwrap_or(0)
    }

    fn insert(&mut self, name: String, value: i64, position: Position) -> Result<(), TypeError> {
        if self.elements.contains_key(&name) {
            return Err(TypeError::DuplicateEnumElement { position, name });
        }
        self.elements.insert(name, value);
        Ok(())
    }
}

/// Registry of every `enum` type seen so far, keyed by tag name. Anonymous
/// enums are still tracked, just never reachable by [`EnumRegistry::find`].
#[derive(Debug, Default)]
pub struct EnumRegistry {
    types: IndexMap<String, EnumType>,
    anonymous: Vec<EnumType>,
}

impl EnumRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn find(&self, tag: &str) -> Option<&EnumType> {
        self.types.get(tag)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EnumType> {
        self.types.values().chain(self.anonymous.iter())
    }

    /// Builds and registers a new enum type from an ordered list of
    /// `(name, explicit_value)` elements. An element with no explicit
    /// value takes the previous element's value plus one, starting at 0,
    /// matching the C rule `enum E { A, B = 5, C }` -> `A=0, B=5, C=6`.
    pub fn declare(
        &mut self,
        tag: Option<String>,
        elements: Vec<(String, Option<i64>, Position)>,
    ) -> Result<(), TypeError> {
        let mut ty = EnumType { tag: tag.clone(), elements: IndexMap::new() };
        let mut next = 0i64;
        for (name, explicit, position) in elements {
            let value = explicit.unwrap_or(next);
            ty.insert(name, value, position)?;
            next = value + 1;
        }
        match tag {
            Some(tag) => {
                self.types.insert(tag, ty);
            }
            None => self.anonymous.push(ty),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn pos() -> Position {
        Position::new(Rc::from("a.c"), 1, 1, 0)
    }

    #[test]
    fn explicit_value_resumes_sequential_numbering_after_it() {
        let mut reg = EnumRegistry::new();
        reg.declare(
            Some("E".into()),
            vec![("A".into(), None, pos()), ("B".into(), Some(5), pos()), ("C".into(), None, pos())],
        )
        .unwrap();
        let ty = reg.find("E").unwrap();
        assert_eq!(ty.find_element("A"), Some(0));
        assert_eq!(ty.find_element("B"), Some(5));
        assert_eq!(ty.find_element("C"), Some(6));
        assert_eq!(ty.max_val(), 6);
    }

    #[test]
    fn empty_enum_has_max_val_zero() {
        let mut reg = EnumRegistry::new();
        reg.declare(Some("Empty".into()), vec![]).unwrap();
        assert_eq!(reg.find("Empty").unwrap().max_val(), 0);
    }

    #[test]
    fn find_by_value_returns_first_match_in_declaration_order() {
        let mut reg = EnumRegistry::new();
        reg.declare(
            Some("E".into()),
            vec![("A".into(), Some(1), pos()), ("B".into(), Some(1), pos())],
        )
        .unwrap();
        assert_eq!(reg.find("E").unwrap().find_by_value(1), Some("A"));
    }

    #[test]
    fn duplicate_element_name_is_an_error() {
        let mut reg = EnumRegistry::new();
        let err = reg
            .declare(Some("E".into()), vec![("A".into(), None, pos()), ("A".into(), None, pos())])
            .unwrap_err();
        assert!(matches!(err, TypeError::DuplicateEnumElement { .. }));
    }
}
