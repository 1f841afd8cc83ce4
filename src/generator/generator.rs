use std::fmt;

use log::{debug, trace};

#[path = "instruction.rs"]
pub mod instruction;

use crate::parser::ParseTree;
pub use instruction::{opr, Instruction, Opcode};

/*
The generator walks the parse tree and dispatches on each node's `name`
string (see src/parser/parser.rs for why that's a string and not a tagged
enum). Two statement kinds — `if` and `while` — need to jump past code that
hasn't been emitted yet, so they use a dry-run/real-run technique: clone the
generator state, emit the body into the clone just to measure how many
instructions it produces, throw the clone's instructions away, and then emit
the real body knowing the jump target up front. This is the only way to keep
code generation single-pass and single-forward without a separate backpatch
table.
*/

/// What a symbol table entry refers to. `Procedure` exists for shape parity
/// with the original symbol table, but nothing in this compiler ever
/// constructs one — there is no procedure declaration in the grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Variable,
    Constant,
    Procedure,
}

/// One entry in the generator's symbol table. `level` is always 0 in this
/// compiler (no nested lexical scopes), but the field is kept so a `Symbol`
/// has the same shape the original's single-level table would generalize
/// to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub level: i64,
    pub address: i64,
    pub constant_value: i64,
}

/// A diagnostic produced while generating code. Collected, not fatal:
/// generation keeps walking the tree after recording one, the same "report
/// everything in one pass" character the lexer and parser have.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenError {
    UnknownSymbol(String),
    LoadProcedure(String),
    StoreIntoConstantOrProcedure(String),
    MalformedNumber(String),
}

impl fmt::Display for GenError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GenError::UnknownSymbol(name) => write!(f, "Could not find symbol '{name}'."),
            GenError::LoadProcedure(name) => {
                write!(f, "Cannot take value of procedure '{name}'.")
            }
            GenError::StoreIntoConstantOrProcedure(name) => {
                write!(f, "Cannot store into constant or procedure '{name}'.")
            }
            GenError::MalformedNumber(text) => {
                write!(f, "Number literal '{text}' does not fit in a 64-bit integer.")
            }
        }
    }
}

/// The generator's working state: the symbol table built up so far, the
/// current lexical level, and the instructions emitted so far. `Clone` is
/// load-bearing — `if`/`while` generation clones this to run a throwaway
/// dry pass before committing the real one.
#[derive(Debug, Clone, Default)]
pub struct GeneratorState {
    pub symbols: Vec<Symbol>,
    pub level: i64,
    pub instructions: Vec<Instruction>,
}

impl GeneratorState {
    pub fn new() -> Self {
        Self::default()
    }

    fn add_instruction(&mut self, opcode: Opcode, level: i64, modifier: i64) {
        self.instructions.push(Instruction::new(opcode, level, modifier));
    }

    fn add_variable(&mut self, name: &str) {
        let address = self.symbols.len() as i64;
        debug!("adding variable '{name}' at level {} address {address}", self.level);
        self.symbols.push(Symbol {
            name: name.to_string(),
            kind: SymbolKind::Variable,
            level: self.level,
            address,
            constant_value: 0,
        });
    }

    fn add_constant(&mut self, name: &str, value: i64) {
        debug!("adding constant '{name}' = {value} at level {}", self.level);
        self.symbols.push(Symbol {
            name: name.to_string(),
            kind: SymbolKind::Constant,
            level: self.level,
            address: 0,
            constant_value: value,
        });
    }

    fn get_symbol(&self, name: &str, errors: &mut Vec<GenError>) -> Option<Symbol> {
        match self.symbols.iter().find(|s| s.name == name) {
            Some(symbol) => Some(symbol.clone()),
            None => {
                errors.push(GenError::UnknownSymbol(name.to_string()));
                None
            }
        }
    }

    fn add_load_instruction(&mut self, name: &str, errors: &mut Vec<GenError>) {
        let Some(symbol) = self.get_symbol(name, errors) else {
            return;
        };
        match symbol.kind {
            SymbolKind::Procedure => errors.push(GenError::LoadProcedure(name.to_string())),
            SymbolKind::Variable => self.add_instruction(Opcode::Lod, symbol.level, symbol.address),
            SymbolKind::Constant => self.add_instruction(Opcode::Lit, 0, symbol.constant_value),
        }
    }

    fn add_store_instruction(&mut self, name: &str, errors: &mut Vec<GenError>) {
        let Some(symbol) = self.get_symbol(name, errors) else {
            return;
        };
        match symbol.kind {
            SymbolKind::Procedure | SymbolKind::Constant => {
                errors.push(GenError::StoreIntoConstantOrProcedure(name.to_string()))
            }
            SymbolKind::Variable => self.add_instruction(Opcode::Sto, symbol.level, symbol.address),
        }
    }
}

/// Generates p-code for a fully parsed, error-free `program` tree. Returns
/// whatever instructions were produced alongside any diagnostics collected
/// along the way — callers decide whether a non-empty error list should
/// suppress the instructions (the CLI does; an embedder might not).
pub fn generate_program(tree: &ParseTree) -> (Vec<Instruction>, Vec<GenError>) {
    let mut state = GeneratorState::new();
    let mut errors = Vec::new();
    generate(tree, &mut state, &mut errors);
    debug!(
        "generated {} instructions with {} diagnostics",
        state.instructions.len(),
        errors.len()
    );
    (state.instructions, errors)
}

/// Dispatches on `tree.name`, exactly mirroring the original's chain of
/// `strcmp`-based `is(...)` checks. A tree the dispatch table doesn't
/// recognize (a leaf, or a node name the grammar never produces) is simply
/// skipped — it contributes no instructions, matching `generate`'s original
/// fall-through behavior.
fn generate(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    if tree.is_error() {
        return;
    }

    match tree.name.as_str() {
        "program" => generate_program_node(tree, state, errors),
        "block" => generate_block(tree, state, errors),
        "var-declaration" => generate_var_declaration(tree, state, errors),
        "vars" => generate_vars(tree, state, errors),
        "var" => generate_var(tree, state),
        "const-declaration" => generate_const_declaration(tree, state, errors),
        "constants" => generate_constants(tree, state, errors),
        "constant" => generate_constant(tree, state, errors),
        "statement" => generate_statement(tree, state, errors),
        "assignment" => generate_assignment(tree, state, errors),
        "begin-block" => generate_begin_block(tree, state, errors),
        "statements" => generate_statements(tree, state, errors),
        "read-statement" => generate_read_statement(tree, state, errors),
        "write-statement" => generate_write_statement(tree, state, errors),
        "if-statement" => generate_if_statement(tree, state, errors),
        "while-statement" => generate_while_statement(tree, state, errors),
        "condition" => generate_condition(tree, state, errors),
        "rel-op" => generate_rel_op(tree, state),
        "expression" => generate_expression(tree, state, errors),
        "add-or-subtract" => generate_add_or_subtract(tree, state),
        "term" => generate_term(tree, state, errors),
        "multiply-or-divide" => generate_multiply_or_divide(tree, state),
        "factor" => generate_factor(tree, state, errors),
        "sign" => generate_sign(tree, state),
        "number" => generate_number(tree, state, errors),
        "identifier" => generate_identifier(tree, state, errors),
        _ => {}
    }
}

fn generate_program_node(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    generate(&tree.get_child("block"), state, errors);
    state.add_instruction(Opcode::Opr, 0, opr::RETURN);
}

fn generate_block(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    generate(&tree.get_child("var-declaration"), state, errors);
    generate(&tree.get_child("const-declaration"), state, errors);
    generate(&tree.get_child("statement"), state, errors);
}

fn generate_var_declaration(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    if !tree.has_child("vars") {
        return;
    }

    let mut fake_state = state.clone();
    generate(&tree.get_child("vars"), &mut fake_state, errors);
    let num_variables = fake_state.instructions.len() - state.instructions.len();
    trace!("dry run counted {num_variables} variables, discarding its placeholder instructions");

    state.add_instruction(Opcode::Inc, 0, num_variables as i64);
    state.symbols = fake_state.symbols;
}

fn generate_vars(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    generate(&tree.get_child("var"), state, errors);
    generate(&tree.get_child("vars"), state, errors);
}

fn generate_var(tree: &ParseTree, state: &mut GeneratorState) {
    let identifier = tree.get_child("identifier");
    state.add_variable(identifier.token());
    // A placeholder so generate_var_declaration can count how many vars
    // were added by diffing instruction-list lengths; it is never emitted
    // for real.
    state.add_instruction(Opcode::Inc, -1, -1);
}

fn generate_const_declaration(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    generate(&tree.get_child("constants"), state, errors);
}

fn generate_constants(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    generate(&tree.get_child("constant"), state, errors);
    generate(&tree.get_child("constants"), state, errors);
}

fn generate_constant(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    let identifier = tree.get_child("identifier");
    let number = tree.get_child("number");
    let text = number.token();
    match text.parse() {
        Ok(value) => state.add_constant(identifier.token(), value),
        Err(_) => errors.push(GenError::MalformedNumber(text.to_string())),
    }
}

fn generate_statement(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    generate(&tree.get_first_child(), state, errors);
}

fn generate_statements(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    generate(&tree.get_child("statement"), state, errors);
    generate(&tree.get_child("statements"), state, errors);
}

fn generate_begin_block(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    generate(&tree.get_child("statements"), state, errors);
}

fn generate_read_statement(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    state.add_instruction(Opcode::Read, 0, 2);
    let identifier = tree.get_child("identifier");
    state.add_store_instruction(identifier.token(), errors);
}

fn generate_write_statement(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    let identifier = tree.get_child("identifier");
    state.add_load_instruction(identifier.token(), errors);
    state.add_instruction(Opcode::Sio, 0, 1);
}

fn generate_assignment(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    generate(&tree.get_child("expression"), state, errors);
    let identifier = tree.get_child("identifier");
    state.add_store_instruction(identifier.token(), errors);
}

fn generate_if_statement(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    // Measure how long the body is by generating it into a throwaway clone
    // first, so the real `jpc` can be emitted with its target already known.
    let mut fake_state = state.clone();
    let mut fake_errors = Vec::new();
    generate(&tree.get_child("condition"), &mut fake_state, &mut fake_errors);
    fake_state.add_instruction(Opcode::Jpc, -1, -1);
    generate(&tree.get_child("statement"), &mut fake_state, &mut fake_errors);
    let after_if_statement = fake_state.instructions.len() as i64;
    trace!("if-statement dry run measured jump target {after_if_statement}, discarding its instructions");

    generate(&tree.get_child("condition"), state, errors);
    state.add_instruction(Opcode::Jpc, 0, after_if_statement);
    generate(&tree.get_child("statement"), state, errors);
}

fn generate_while_statement(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    let beginning = state.instructions.len() as i64;

    let mut fake_state = state.clone();
    let mut fake_errors = Vec::new();
    generate(&tree.get_child("condition"), &mut fake_state, &mut fake_errors);
    fake_state.add_instruction(Opcode::Jpc, -1, -1);
    generate(&tree.get_child("statement"), &mut fake_state, &mut fake_errors);
    fake_state.add_instruction(Opcode::Jmp, 0, beginning);
    let after_while_loop = fake_state.instructions.len() as i64;
    trace!("while-statement dry run measured jump target {after_while_loop}, discarding its instructions");

    generate(&tree.get_child("condition"), state, errors);
    state.add_instruction(Opcode::Jpc, 0, after_while_loop);
    generate(&tree.get_child("statement"), state, errors);
    state.add_instruction(Opcode::Jmp, 0, beginning);
}

fn generate_condition(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    if tree.has_child("odd") {
        generate(&tree.get_child("expression"), state, errors);
        state.add_instruction(Opcode::Opr, 0, opr::ODD);
    } else {
        generate(&tree.get_child("expression"), state, errors);
        generate(&tree.get_last_child("expression"), state, errors);
        generate(&tree.get_child("rel-op"), state, errors);
    }
}

fn generate_rel_op(tree: &ParseTree, state: &mut GeneratorState) {
    let modifier = match tree.get_first_child().name.as_str() {
        "=" => opr::EQ,
        "<>" => opr::NEQ,
        "<" => opr::LT,
        "<=" => opr::LEQ,
        ">" => opr::GT,
        ">=" => opr::GEQ,
        other => panic!("invalid relational operator '{other}'"),
    };
    state.add_instruction(Opcode::Opr, 0, modifier);
}

fn generate_expression(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    generate(&tree.get_child("term"), state, errors);

    if tree.has_child("add-or-subtract") {
        generate(&tree.get_child("expression"), state, errors);
        generate(&tree.get_child("add-or-subtract"), state, errors);
    }
}

fn generate_add_or_subtract(tree: &ParseTree, state: &mut GeneratorState) {
    match tree.get_first_child().name.as_str() {
        "+" => state.add_instruction(Opcode::Opr, 0, opr::ADD),
        "-" => state.add_instruction(Opcode::Opr, 0, opr::SUBTRACT),
        other => panic!("expected + or - inside add-or-subtract, got '{other}'"),
    }
}

fn generate_term(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    generate(&tree.get_child("factor"), state, errors);

    if tree.has_child("multiply-or-divide") {
        generate(&tree.get_child("term"), state, errors);
        generate(&tree.get_child("multiply-or-divide"), state, errors);
    }
}

fn generate_multiply_or_divide(tree: &ParseTree, state: &mut GeneratorState) {
    match tree.get_first_child().name.as_str() {
        "*" => state.add_instruction(Opcode::Opr, 0, opr::MULTIPLY),
        "/" => state.add_instruction(Opcode::Opr, 0, opr::DIVIDE),
        other => panic!("expected * or / inside multiply-or-divide, got '{other}'"),
    }
}

fn generate_factor(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    // At most one of these child lookups succeeds; `generate` on an error
    // tree is a no-op, so trying every alternative unconditionally is safe
    // as long as the parser never pairs two of them at once.
    generate(&tree.get_child("number"), state, errors);
    generate(&tree.get_child("sign"), state, errors);
    generate(&tree.get_child("identifier"), state, errors);
    generate(&tree.get_child("expression"), state, errors);
}

fn generate_sign(tree: &ParseTree, state: &mut GeneratorState) {
    if tree.get_first_child().name == "-" {
        state.add_instruction(Opcode::Opr, 0, opr::NEGATE);
    }
}

fn generate_number(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    let text = tree.get_first_child().name;
    match text.parse() {
        Ok(value) => state.add_instruction(Opcode::Lit, 0, value),
        Err(_) => errors.push(GenError::MalformedNumber(text)),
    }
}

fn generate_identifier(tree: &ParseTree, state: &mut GeneratorState, errors: &mut Vec<GenError>) {
    state.add_load_instruction(tree.token(), errors);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::pl0_grammar;
    use crate::lexer::lex;
    use crate::parser::parse_program;

    fn compile(source: &str) -> (Vec<Instruction>, Vec<GenError>) {
        let (lexemes, lex_errors) = lex(source);
        assert!(lex_errors.is_empty(), "{lex_errors:?}");
        let grammar = pl0_grammar();
        let tree = parse_program(&lexemes, &grammar);
        assert!(!tree.is_error(), "{}", tree.name);
        generate_program(&tree)
    }

    fn codes(instructions: &[Instruction]) -> Vec<(i64, i64, i64)> {
        instructions
            .iter()
            .map(|i| (i.opcode.as_code(), i.level, i.modifier))
            .collect()
    }

    #[test]
    fn bare_number_expression_s1() {
        let (instructions, errors) = compile("5.");
        assert!(errors.is_empty());
        assert_eq!(codes(&instructions), vec![(1, 0, 5), (2, 0, 0)]);
    }

    #[test]
    fn negation_s2() {
        let (instructions, errors) = compile("-100.");
        assert!(errors.is_empty());
        assert_eq!(
            codes(&instructions),
            vec![(1, 0, 100), (2, 0, opr::NEGATE), (2, 0, 0)]
        );
    }

    #[test]
    fn left_associative_addition_chain_s3() {
        // expression is right-recursive in the grammar but addition is still
        // evaluated left to right at runtime because `term` is emitted before
        // the recursive `expression`, i.e. (1 + (2 + 3)) - which is fine for
        // `+` since it's associative; this test pins the exact instruction
        // order that falls out of the grammar shape.
        let (instructions, errors) = compile("1+2+3.");
        assert!(errors.is_empty());
        assert_eq!(
            codes(&instructions),
            vec![
                (1, 0, 1),
                (1, 0, 2),
                (1, 0, 3),
                (2, 0, opr::ADD),
                (2, 0, opr::ADD),
                (2, 0, 0),
            ]
        );
    }

    #[test]
    fn mixed_precedence_s4() {
        let (instructions, errors) = compile("-3*(5+-10).");
        assert!(errors.is_empty());
        assert_eq!(
            codes(&instructions),
            vec![
                (1, 0, 3),
                (2, 0, opr::NEGATE),
                (1, 0, 5),
                (1, 0, 10),
                (2, 0, opr::NEGATE),
                (2, 0, opr::ADD),
                (2, 0, opr::MULTIPLY),
                (2, 0, 0),
            ]
        );
    }

    #[test]
    fn full_program_with_if_s5() {
        let (instructions, errors) = compile(
            "const y = 3; int x; begin read x; if x = y then write x end.",
        );
        assert!(errors.is_empty());
        assert_eq!(
            codes(&instructions),
            vec![
                (6, 0, 1),      // inc 0 1          -- reserve space for x
                (10, 0, 2),     // read 0 2
                (4, 0, 0),      // sto 0 0          -- store into x (address 0)
                (3, 0, 0),      // lod 0 0          -- load x
                (1, 0, 3),      // lit 0 3          -- constant y folds to a literal
                (2, 0, 8),      // opr 0 8          -- eq
                (8, 0, 9),      // jpc 0 9          -- past the if-body (no else)
                (3, 0, 0),      // lod 0 0
                (9, 0, 1),      // sio 0 1
                (2, 0, 0),      // opr 0 0          -- program return
            ]
        );
    }

    #[test]
    fn constants_always_fold_to_lit_never_lod() {
        let (instructions, errors) = compile("const c = 42; begin write c end.");
        assert!(errors.is_empty());
        assert!(instructions
            .iter()
            .any(|i| i.opcode.as_code() == 1 && i.modifier == 42));
        assert!(!instructions.iter().any(|i| i.opcode.as_code() == 3));
    }

    #[test]
    fn unknown_identifier_is_a_collected_diagnostic() {
        let (_, errors) = compile("begin write x end.");
        assert_eq!(errors, vec![GenError::UnknownSymbol("x".to_string())]);
    }

    #[test]
    fn storing_into_a_constant_is_a_collected_diagnostic() {
        let (_, errors) = compile("const c = 1; begin c := 2 end.");
        assert_eq!(
            errors,
            vec![GenError::StoreIntoConstantOrProcedure("c".to_string())]
        );
    }

    #[test]
    fn if_dry_run_and_real_run_agree_on_length() {
        // A while loop whose body is itself an if-statement exercises nested
        // dry runs: the outer while's fake pass must walk through the inner
        // if's *real* dry-run/real-run split consistently, or the two jump
        // targets it measures would disagree with what's actually emitted.
        let (instructions, errors) =
            compile("int x; begin while x < 10 do if odd x then x := x + 1 end.");
        assert!(errors.is_empty());
        // The generator must not panic or diverge; a structural sanity check
        // that every jpc/jmp target lands within bounds is sufficient here.
        for instr in &instructions {
            if matches!(instr.opcode, Opcode::Jpc | Opcode::Jmp) {
                assert!((instr.modifier as usize) <= instructions.len());
            }
        }
    }

    #[test]
    fn dispatch_is_deterministic_over_structurally_equal_trees() {
        // Two structurally-equal parse trees (built independently, not the
        // same tree re-borrowed) must generate identical instructions: the
        // generator's dispatch has no hidden dependence on anything but the
        // tree's own structure.
        let source = "const y = 3; int x; begin read x; if x = y then write x end.";
        let (lexemes, _) = lex(source);
        let grammar = pl0_grammar();
        let tree_a = parse_program(&lexemes, &grammar);
        let tree_b = parse_program(&lexemes, &grammar);
        assert_eq!(tree_a, tree_b);

        let (instructions_a, errors_a) = generate_program(&tree_a);
        let (instructions_b, errors_b) = generate_program(&tree_b);
        assert_eq!(instructions_a, instructions_b);
        assert_eq!(errors_a, errors_b);
    }

    // A numeral long enough to overflow i64 is, by construction, also longer
    // than MAX_NUMBER_LENGTH (src/lexer/lexer.rs), so the lexer always flags
    // it with its own NumberTooLong diagnostic too. That is a lex-stage
    // concern and orthogonal to what these two tests check: that the
    // generator itself never panics on the overflow and instead reports its
    // own diagnostic, per the pipeline's "collect, never abort" contract —
    // so these bypass the `compile` helper's `lex_errors.is_empty()` assert.
    #[test]
    fn number_literal_too_large_for_i64_is_a_collected_diagnostic_not_a_panic() {
        let overflowing = "12345678901234567890";
        let source = format!("int x; begin x := {overflowing} end.");
        let (lexemes, _) = lex(&source);
        let grammar = pl0_grammar();
        let tree = parse_program(&lexemes, &grammar);
        assert!(!tree.is_error(), "{}", tree.name);
        let (_, errors) = generate_program(&tree);
        assert_eq!(errors, vec![GenError::MalformedNumber(overflowing.to_string())]);
    }

    #[test]
    fn constant_with_overflowing_value_is_a_collected_diagnostic_not_a_panic() {
        let overflowing = "99999999999999999999";
        let source = format!("const c = {overflowing}; begin write c end.");
        let (lexemes, _) = lex(&source);
        let grammar = pl0_grammar();
        let tree = parse_program(&lexemes, &grammar);
        assert!(!tree.is_error(), "{}", tree.name);
        let (_, errors) = generate_program(&tree);
        assert_eq!(errors, vec![GenError::MalformedNumber(overflowing.to_string())]);
    }
}
