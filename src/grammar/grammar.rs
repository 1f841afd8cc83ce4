use crate::lexer::TokenKind;

/*
A grammar is built in code, not parsed from a file: a sequence of `add_rule`
calls, each mapping a variable name to a right-hand side. This keeps the
parser itself generic — it never mentions "block" or "expression" by name —
while still letting `pl0_grammar()` below read like the production list it
describes.
*/

/// A single symbol on a rule's right-hand side: either a reference to
/// another grammar variable, a terminal (one of the fixed token-kind names
/// in §6.1), or the distinguished empty marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Symbol {
    Variable(String),
    Terminal(TokenKind),
    Nothing,
}

impl Symbol {
    fn parse(text: &str) -> Symbol {
        if text == "nothing" {
            Symbol::Nothing
        } else if let Some(kind) = TokenKind::from_terminal_name(text) {
            Symbol::Terminal(kind)
        } else {
            Symbol::Variable(text.to_string())
        }
    }
}

/// A production rule: `variable -> production` (an ordered list of symbols).
#[derive(Debug, Clone)]
pub struct Rule {
    pub variable: String,
    pub production: Vec<Symbol>,
}

/// An ordered sequence of rules. Order matters: the parser tries rules for a
/// given variable in insertion order and returns the first success, so the
/// grammar writer resolves ambiguity by placing longer/more-specific
/// alternatives first.
#[derive(Debug, Clone, Default)]
pub struct Grammar {
    pub rules: Vec<Rule>,
}

impl Grammar {
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Adds a production rule. `production` is a single space-separated
    /// string of symbols, exactly as the original `addRule(grammar,
    /// variable, productionString)` takes it.
    pub fn add_rule(&mut self, variable: &str, production: &str) {
        let symbols = production
            .split_whitespace()
            .map(Symbol::parse)
            .collect();
        self.rules.push(Rule {
            variable: variable.to_string(),
            production: symbols,
        });
    }

    /// All rules whose left-hand side is `variable`, in insertion order.
    pub fn rules_for(&self, variable: &str) -> impl Iterator<Item = &Rule> {
        self.rules.iter().filter(move |rule| rule.variable == variable)
    }
}

/// The bundled PL/0 grammar (§4, §6.3). Uses the "improved" expression/term
/// productions the original ships with (right-recursive, intuitive
/// precedence), not the alternative single-operator grammar it keeps
/// commented out alongside them.
pub fn pl0_grammar() -> Grammar {
    let mut g = Grammar::new();

    g.add_rule("program", "block periodsym");

    g.add_rule("block", "const-declaration var-declaration statement");

    g.add_rule("const-declaration", "constsym constants semicolonsym");
    g.add_rule("const-declaration", "nothing");
    g.add_rule("constants", "constant commasym constants");
    g.add_rule("constants", "constant");
    g.add_rule("constant", "identifier eqsym number");

    g.add_rule("var-declaration", "intsym vars semicolonsym");
    g.add_rule("var-declaration", "nothing");
    g.add_rule("vars", "var commasym vars");
    g.add_rule("vars", "var");
    g.add_rule("var", "identifier");

    g.add_rule("statement", "read-statement");
    g.add_rule("statement", "write-statement");
    g.add_rule("statement", "assignment");
    g.add_rule("statement", "if-statement");
    g.add_rule("statement", "while-statement");
    g.add_rule("statement", "begin-block");
    g.add_rule("statement", "nothing");

    g.add_rule("assignment", "identifier becomessym expression");

    g.add_rule("begin-block", "beginsym statements endsym");
    g.add_rule("statements", "statement semicolonsym statements");
    g.add_rule("statements", "statement");

    g.add_rule("if-statement", "ifsym condition thensym statement");
    g.add_rule("condition", "expression rel-op expression");
    g.add_rule("condition", "oddsym expression");
    g.add_rule("rel-op", "eqsym");
    g.add_rule("rel-op", "neqsym");
    g.add_rule("rel-op", "lessym");
    g.add_rule("rel-op", "leqsym");
    g.add_rule("rel-op", "gtrsym");
    g.add_rule("rel-op", "geqsym");

    // The "improved" grammar for expressions: right-recursive on `expression`
    // and `term` so chains like `1 + 2 + 3` parse without extra parens.
    g.add_rule("expression", "term add-or-subtract expression");
    g.add_rule("expression", "term");
    g.add_rule("add-or-subtract", "plussym");
    g.add_rule("add-or-subtract", "minussym");
    g.add_rule("term", "factor multiply-or-divide term");
    g.add_rule("term", "factor");
    g.add_rule("multiply-or-divide", "multsym");
    g.add_rule("multiply-or-divide", "slashsym");
    g.add_rule("factor", "lparentsym expression rparentsym");
    g.add_rule("factor", "sign number");
    g.add_rule("factor", "identifier");
    g.add_rule("sign", "plussym");
    g.add_rule("sign", "minussym");
    g.add_rule("sign", "nothing");
    g.add_rule("number", "numbersym");

    g.add_rule("while-statement", "whilesym condition dosym statement");

    g.add_rule("read-statement", "readsym identifier");
    g.add_rule("write-statement", "writesym identifier");

    g.add_rule("identifier", "identsym");

    g
}
