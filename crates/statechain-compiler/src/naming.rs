// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Identifier conversion for generated code.
//!
//! Transition names may be written in any common case style (`foo_bar`,
//! `foo-bar`, `fooBar`, `FooBar`, `foo.bar`). They all map to the same
//! `snake_case` method name, which is why collisions are checked per machine.

use std::collections::HashMap;

use proc_macro2::{Ident, Span, TokenStream};
use quote::quote;

use crate::error::CompileError;

const KEYWORDS: &[&str] = &[
    "abstract", "as", "async", "await", "become", "box", "break", "const", "continue", "crate",
    "do", "dyn", "else", "enum", "extern", "false", "final", "fn", "for", "gen", "if", "impl",
    "in", "let", "loop", "macro", "match", "mod", "move", "mut", "override", "priv", "pub", "ref",
    "return", "self", "Self", "static", "struct", "super", "trait", "true", "try", "type",
    "typeof", "unsafe", "unsized", "use", "virtual", "where", "while", "yield",
];

/// Keywords that cannot be used even as raw identifiers.
const RESERVED: &[&str] = &["self", "Self", "super", "crate", "_"];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Split a name into lowercase ASCII words.
///
/// Non-alphanumeric characters separate words, and so do lower-to-upper
/// case changes and the last capital of an acronym (`HTTPServer`).
fn words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            if prev.is_ascii_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_ascii_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c.to_ascii_lowercase());
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// `fooBar`, `foo-bar` and `FooBar` all become `foo_bar`.
pub fn to_snake_case(name: &str) -> String {
    words(name).join("_")
}

/// `StateMachine` becomes `STATE_MACHINE`.
pub fn to_screaming_snake_case(name: &str) -> String {
    to_snake_case(name).to_ascii_uppercase()
}

/// Identifier for a snake_case word, raw if it is a keyword.
fn snake_ident(machine: &str, source: &str, snake: &str) -> Result<Ident, CompileError> {
    let invalid = |reason| CompileError::InvalidIdentifier {
        machine: machine.to_string(),
        name: source.to_string(),
        reason,
    };

    if snake.is_empty() {
        return Err(invalid("contains no letters or digits"));
    }
    if snake.starts_with(|c: char| c.is_ascii_digit()) {
        return Err(invalid("starts with a digit"));
    }
    if RESERVED.contains(&snake) {
        return Err(invalid("is a reserved keyword"));
    }

    if is_keyword(snake) {
        Ok(Ident::new_raw(snake, Span::call_site()))
    } else {
        Ok(Ident::new(snake, Span::call_site()))
    }
}

/// Method identifier for a transition.
pub fn method_ident(machine: &str, transition: &str) -> Result<Ident, CompileError> {
    snake_ident(machine, transition, &to_snake_case(transition))
}

/// Check that a machine name can be used verbatim as a type name prefix.
pub fn type_ident(machine: &str) -> Result<Ident, CompileError> {
    let invalid = |reason| CompileError::InvalidIdentifier {
        machine: machine.to_string(),
        name: machine.to_string(),
        reason,
    };

    let mut chars = machine.chars();
    match chars.next() {
        None => return Err(invalid("is empty")),
        Some(c) if !(c.is_ascii_alphabetic() || c == '_') => {
            return Err(invalid("must start with a letter or underscore"));
        }
        Some(_) => {}
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(invalid("may only contain ASCII letters, digits and underscores"));
    }
    if machine == "_" || is_keyword(machine) {
        return Err(invalid("is a keyword"));
    }

    Ok(Ident::new(machine, Span::call_site()))
}

/// Identifier built from a machine name with a prefix or suffix, e.g.
/// `state_machine_workflow`.
pub fn derived_ident(machine: &str, snake: &str) -> Result<Ident, CompileError> {
    snake_ident(machine, machine, snake)
}

/// Method identifiers for all transitions, failing on the first collision.
pub fn assign_method_names<'a, I>(machine: &str, transitions: I) -> Result<Vec<Ident>, CompileError>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut taken: HashMap<String, &str> = HashMap::new();
    let mut idents = Vec::new();

    for transition in transitions {
        let ident = method_ident(machine, transition)?;
        let method = to_snake_case(transition);
        if let Some(first) = taken.insert(method.clone(), transition) {
            return Err(CompileError::NamingCollision {
                machine: machine.to_string(),
                first: first.to_string(),
                second: transition.to_string(),
                method,
            });
        }
        idents.push(ident);
    }

    Ok(idents)
}

/// Tokens for a plain `a::b::C` path.
///
/// Only identifier segments are accepted. `crate`, `self` and `super` may
/// lead the path; generic arguments and leading `::` are rejected.
pub fn path_tokens(machine: &str, path: &str) -> Result<TokenStream, CompileError> {
    let invalid = || CompileError::InvalidPath {
        machine: machine.to_string(),
        path: path.to_string(),
    };

    let mut segments = Vec::new();
    for (i, segment) in path.split("::").enumerate() {
        let segment = segment.trim();
        let valid_start = segment
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_start
            || segment == "_"
            || !segment.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(invalid());
        }

        let leading_keyword = matches!(segment, "crate" | "self" | "super");
        let super_chain = segment == "super" && segments.iter().all(|s: &Ident| *s == "super");
        if leading_keyword && i > 0 && !super_chain {
            return Err(invalid());
        }
        if is_keyword(segment) && !leading_keyword {
            return Err(invalid());
        }
        segments.push(Ident::new(segment, Span::call_site()));
    }

    Ok(quote! { #(#segments)::* })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snake_case_conversion() {
        let cases = [
            ("foo", "foo"),
            ("Foo", "foo"),
            ("fooBar", "foo_bar"),
            ("FooBar", "foo_bar"),
            ("foo_bar", "foo_bar"),
            ("foo-bar", "foo_bar"),
            ("foo.bar baz", "foo_bar_baz"),
            ("HTTPServer", "http_server"),
            ("parseJSON", "parse_json"),
            ("step2Go", "step2_go"),
            ("__leading__", "leading"),
            ("StateMachine", "state_machine"),
        ];
        for (input, expected) in cases {
            assert_eq!(to_snake_case(input), expected, "input: {}", input);
        }
    }

    #[test]
    fn test_screaming_snake_case() {
        assert_eq!(to_screaming_snake_case("StateMachine"), "STATE_MACHINE");
        assert_eq!(to_screaming_snake_case("order-flow"), "ORDER_FLOW");
    }

    #[test]
    fn test_method_ident_keywords() {
        assert_eq!(method_ident("M", "Type").unwrap().to_string(), "r#type");
        assert_eq!(method_ident("M", "match").unwrap().to_string(), "r#match");
        assert_eq!(method_ident("M", "fooBar").unwrap().to_string(), "foo_bar");
    }

    #[test]
    fn test_method_ident_rejections() {
        for name in ["self", "Super", "crate", "---", "2fast"] {
            let err = method_ident("M", name).unwrap_err();
            assert!(
                matches!(err, CompileError::InvalidIdentifier { .. }),
                "{} should be rejected",
                name
            );
        }
    }

    #[test]
    fn test_type_ident() {
        assert_eq!(type_ident("StateMachine").unwrap().to_string(), "StateMachine");
        assert!(type_ident("").is_err());
        assert!(type_ident("9Lives").is_err());
        assert!(type_ident("State Machine").is_err());
        assert!(type_ident("struct").is_err());
        assert!(type_ident("_").is_err());
    }

    #[test]
    fn test_collision_detected() {
        let err = assign_method_names("M", ["foo_bar", "fooBar"]).unwrap_err();
        match err {
            CompileError::NamingCollision {
                machine,
                first,
                second,
                method,
            } => {
                assert_eq!(machine, "M");
                assert_eq!(first, "foo_bar");
                assert_eq!(second, "fooBar");
                assert_eq!(method, "foo_bar");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_distinct_names_assigned_in_order() {
        let idents = assign_method_names("M", ["Foo", "bar", "bazQux"]).unwrap();
        let names: Vec<_> = idents.iter().map(|i| i.to_string()).collect();
        assert_eq!(names, vec!["foo", "bar", "baz_qux"]);
    }

    #[test]
    fn test_path_tokens() {
        let tokens = path_tokens("M", "super::StateMachine").unwrap();
        assert_eq!(tokens.to_string(), "super :: StateMachine");

        let tokens = path_tokens("M", "super::super::types::Order").unwrap();
        assert_eq!(tokens.to_string(), "super :: super :: types :: Order");

        assert!(path_tokens("M", "statechain_workflows").is_ok());
        assert!(path_tokens("M", "crate::rt").is_ok());
    }

    #[test]
    fn test_path_tokens_rejections() {
        for path in [
            "",
            "::std::Vec",
            "Vec<u8>",
            "a::crate::B",
            "a::super::B",
            "a::type",
            "a::",
            "1a::B",
        ] {
            assert!(
                matches!(
                    path_tokens("M", path),
                    Err(CompileError::InvalidPath { .. })
                ),
                "{} should be rejected",
                path
            );
        }
    }
}
