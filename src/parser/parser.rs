use log::{debug, trace};

use crate::grammar::{Grammar, Symbol};
use crate::lexer::Lexeme;

/*
The parser is classical backtracking recursive descent, generalized over an
externally supplied grammar. Node names are plain strings rather than a
tagged enum on purpose: the grammar is data built at runtime (§6.3), so the
set of node shapes is not known until the grammar is constructed, and the
generator (src/generator/generator.rs) dispatches on those same strings. A
`numTokens` field doubles as the error sentinel (-1), exactly as the
original: there is no separate `Result` wrapper around the recursive calls,
since an error must still carry a partial tree for diagnostics.
*/

/// A node in the parse tree. Two shapes share this one struct:
/// - a *leaf*: `name` is the matched lexeme's literal text, no children,
///   `num_tokens == 1`;
/// - an *error*: `name` is a human-readable message, `children` is whatever
///   partial tree was built before failure, `num_tokens == -1`.
/// Every other node's `num_tokens` is the sum of its children's (with
/// `Nothing` children contributing 0).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseTree {
    pub name: String,
    pub children: Vec<ParseTree>,
    pub num_tokens: i64,
}

impl ParseTree {
    pub fn leaf(text: impl Into<String>) -> ParseTree {
        ParseTree {
            name: text.into(),
            children: Vec::new(),
            num_tokens: 1,
        }
    }

    pub fn error(message: impl Into<String>, children: Vec<ParseTree>) -> ParseTree {
        ParseTree {
            name: message.into(),
            children,
            num_tokens: -1,
        }
    }

    pub fn is_error(&self) -> bool {
        self.num_tokens < 0
    }

    /// The first direct child whose name equals `name`, or an error tree if
    /// none match.
    pub fn get_child(&self, name: &str) -> ParseTree {
        match self.children.iter().find(|c| c.name == name) {
            Some(child) => child.clone(),
            None => ParseTree::error(
                format!("Could not find child with name '{name}'."),
                self.children.clone(),
            ),
        }
    }

    /// The last direct child whose name equals `name`. Used by
    /// `condition`'s generator handler to pick out the second `expression`
    /// operand of a relational comparison.
    pub fn get_last_child(&self, name: &str) -> ParseTree {
        match self.children.iter().rev().find(|c| c.name == name) {
            Some(child) => child.clone(),
            None => ParseTree::error(
                format!("Could not find child with name '{name}'."),
                self.children.clone(),
            ),
        }
    }

    pub fn has_child(&self, name: &str) -> bool {
        !self.get_child(name).is_error()
    }

    /// The first direct child regardless of name — used to pick the single
    /// concrete alternative inside a wrapper variable like `statement`.
    pub fn get_first_child(&self) -> ParseTree {
        match self.children.first() {
            Some(child) => child.clone(),
            None => ParseTree::error(
                "Cannot get first child of tree with no children.",
                self.children.clone(),
            ),
        }
    }

    /// For a node with exactly one child, the literal text of that child.
    /// Used to read the operator/sign/number text out of a leaf.
    pub fn token(&self) -> &str {
        assert_eq!(
            self.children.len(),
            1,
            "getToken requires exactly one child, found {} on '{}'",
            self.children.len(),
            self.name
        );
        &self.children[0].name
    }
}

/// Parses the full lexeme stream as a `program`. This is the only entry
/// point callers should use; `parse`/`parse_rule` are implementation detail
/// shared with the recursive descent itself.
pub fn parse_program(lexemes: &[Lexeme], grammar: &Grammar) -> ParseTree {
    let result = parse(lexemes, 0, "program", grammar);
    assert!(result.num_tokens as usize <= lexemes.len() || result.is_error());
    if !result.is_error() && result.num_tokens as usize == lexemes.len() {
        result
    } else {
        ParseTree::error("Trailing tokens after program.", vec![result])
    }
}

/// Parses `current_variable` starting at lexeme `index`, trying each of the
/// grammar's rules for that variable in order and returning the first
/// success. If every rule fails, returns an error tree listing the rules
/// tried, joined by "or", and citing the lexeme at `index` (or end-of-file).
fn parse(lexemes: &[Lexeme], index: usize, current_variable: &str, grammar: &Grammar) -> ParseTree {
    if index >= lexemes.len() && grammar.rules_for(current_variable).next().is_none() {
        return ParseTree::error(
            format!("No rules found for variable {current_variable}."),
            Vec::new(),
        );
    }

    let mut children = Vec::new();
    let mut expected: Option<String> = None;

    for (rule_index, rule) in grammar.rules_for(current_variable).enumerate() {
        trace!("trying rule {rule_index} for '{current_variable}' at token {index}");
        let result = parse_rule(&rule.production, lexemes, index, current_variable, grammar);
        let failed = result.is_error();
        if !failed {
            debug!("rule {rule_index} for '{current_variable}' matched {} tokens", result.num_tokens);
            return result;
        }
        children.push(result);
        expected = Some(match expected {
            None => rule.variable.clone(),
            Some(prev) => format!("{prev} or {}", rule.variable),
        });
    }

    match expected {
        None => ParseTree::error(
            format!("No rules found for variable {current_variable}."),
            children,
        ),
        Some(expected) => {
            let cited = lexemes
                .get(index)
                .map(|l| l.text.as_str())
                .unwrap_or("end of file");
            ParseTree::error(
                format!("Expected {expected} starting at '{cited}'."),
                children,
            )
        }
    }
}

/// Tries to parse a single production rule for `current_variable`, starting
/// at `index`. Consumes the right-hand side symbols left to right,
/// recursing into variables and matching terminals directly.
fn parse_rule(
    production: &[Symbol],
    lexemes: &[Lexeme],
    start_index: usize,
    current_variable: &str,
    grammar: &Grammar,
) -> ParseTree {
    let mut index = start_index;
    let mut children = Vec::new();

    for symbol in production {
        match symbol {
            Symbol::Nothing => continue,
            Symbol::Terminal(expected_kind) => {
                let Some(current) = lexemes.get(index) else {
                    return ParseTree::error(
                        format!(
                            "Expected '{expected_kind}' but got end of file while parsing {current_variable}."
                        ),
                        children,
                    );
                };
                if current.kind == *expected_kind {
                    children.push(ParseTree::leaf(current.text.clone()));
                    index += 1;
                } else {
                    return ParseTree::error(
                        format!(
                            "Expected '{expected_kind}' but got '{}' while parsing {current_variable}.",
                            current.text
                        ),
                        children,
                    );
                }
            }
            Symbol::Variable(variable) => {
                let cited = lexemes
                    .get(index)
                    .map(|l| l.text.as_str())
                    .unwrap_or("end of file");
                let child = parse(lexemes, index, variable, grammar);
                let child_tokens = child.num_tokens;
                let child_failed = child.is_error();
                children.push(child);
                if child_failed {
                    return ParseTree::error(
                        format!(
                            "Expected '{variable}' starting at '{cited}' while parsing {current_variable}."
                        ),
                        children,
                    );
                }
                index += child_tokens as usize;
            }
        }
    }

    ParseTree {
        name: current_variable.to_string(),
        num_tokens: (index - start_index) as i64,
        children,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::pl0_grammar;
    use crate::lexer::lex;

    fn tree_for(variable: &str, source: &str) -> ParseTree {
        let (lexemes, errors) = lex(source);
        assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
        let grammar = pl0_grammar();
        parse(&lexemes, 0, variable, &grammar)
    }

    #[test]
    fn bare_number_expression() {
        let tree = tree_for("expression", "5");
        assert!(!tree.is_error());
        assert_eq!(tree.num_tokens, 1);
    }

    #[test]
    fn parse_program_rejects_trailing_tokens() {
        let (lexemes, _) = lex("5 5");
        let grammar = pl0_grammar();
        let tree = parse_program(&lexemes, &grammar);
        assert!(tree.is_error());
        assert_eq!(tree.name, "Trailing tokens after program.");
    }

    #[test]
    fn parse_tree_span_matches_lexeme_count() {
        let (lexemes, errors) = lex(
            "const y = 3; int x; begin read x; if x = y then write x end.",
        );
        assert!(errors.is_empty());
        let grammar = pl0_grammar();
        let tree = parse_program(&lexemes, &grammar);
        assert!(!tree.is_error(), "{}", tree.name);
        assert_eq!(tree.num_tokens as usize, lexemes.len());
    }

    #[test]
    fn rule_ordering_controls_statements_nesting() {
        // statements -> statement semicolonsym statements | statement
        let tree = tree_for("statements", "read x; write x");
        assert!(!tree.is_error(), "{}", tree.name);
        // The "statement ; statements" alternative must win, producing a
        // nested `statements` child rather than stopping after the first
        // statement.
        assert!(tree.has_child("statements"));
    }

    #[test]
    fn reversed_rule_order_only_covers_first_statement() {
        let mut grammar = pl0_grammar();
        grammar.rules.retain(|r| r.variable != "statements");
        grammar.add_rule("statements", "statement");
        grammar.add_rule("statements", "statement semicolonsym statements");

        let (lexemes, _) = lex("read x; write x");
        let tree = parse(&lexemes, 0, "statements", &grammar);
        assert!(!tree.is_error());
        assert_eq!(tree.num_tokens, 2); // just "read x", not the semicolon or "write x"
    }
}
