use crate::generator::{generate_program, GenError, Instruction};
use crate::grammar::{pl0_grammar, Grammar};
use crate::lexer::{lex, LexError, Lexeme};
use crate::parser::{parse_program, ParseTree};

/*
This module is the seam between the three pipeline stages and whatever
surface calls them — today that's src/main.rs, but the split exists so a
future embedder (a test harness, a language-server-style tool) can drive the
pipeline without going through a CLI at all.
*/

/// Everything produced by compiling one source string, successful or not.
/// Each stage's output is kept even when later stages fail or are skipped,
/// so a caller that wants the token stream or parse tree for diagnostics
/// still gets it.
pub struct CompileResult {
    pub tokens: Vec<Lexeme>,
    pub lex_errors: Vec<LexError>,
    pub parse_tree: ParseTree,
    pub instructions: Vec<Instruction>,
    pub gen_errors: Vec<GenError>,
}

impl CompileResult {
    /// Whether any stage reported a problem. A caller that only cares about
    /// success/failure (the CLI's exit code, for instance) can use this
    /// instead of inspecting each diagnostic list itself.
    pub fn has_errors(&self) -> bool {
        !self.lex_errors.is_empty() || self.parse_tree.is_error() || !self.gen_errors.is_empty()
    }
}

/// Runs the full lexer -> parser -> generator pipeline over `source`. Never
/// panics on malformed input: a lex error doesn't stop lexing, a parse
/// error produces an error tree (and the generator is still invoked on it,
/// which is a safe no-op per `generate`'s error-tree short-circuit), and
/// generator errors are collected rather than raised.
pub fn compile(source: &str) -> CompileResult {
    compile_with_grammar(source, &pl0_grammar())
}

/// Same as [`compile`], but with an explicit grammar — useful for testing
/// grammar variations (rule order, alternative productions) without
/// reaching into `pl0_grammar()`'s default.
pub fn compile_with_grammar(source: &str, grammar: &Grammar) -> CompileResult {
    let (tokens, lex_errors) = lex(source);
    let parse_tree = parse_program(&tokens, grammar);
    let (instructions, gen_errors) = generate_program(&parse_tree);

    CompileResult {
        tokens,
        lex_errors,
        parse_tree,
        instructions,
        gen_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_compile_has_no_errors() {
        let result = compile("5.");
        assert!(!result.has_errors());
        assert_eq!(result.instructions.len(), 2);
    }

    #[test]
    fn lex_errors_surface_but_pipeline_keeps_running() {
        let result = compile("begin write x @ end.");
        assert!(result.has_errors());
        assert_eq!(result.lex_errors.len(), 1);
    }

    #[test]
    fn unparseable_source_yields_an_error_tree_and_no_instructions() {
        let result = compile("begin write end.");
        assert!(result.has_errors());
        assert!(result.parse_tree.is_error());
        assert!(result.instructions.is_empty());
    }
}
