use log::{debug, trace};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

/*
The lexer's job is to scan source text as a sequence of characters and group
runs of characters together into lexemes. Each lexeme is classified against an
ordered list of regular expressions, anchored to the current position; the
first pattern that matches wins. This mirrors the original compiler's
regex-driven scanner rather than the hand-rolled character-at-a-time switch
more common in toy lexers: the token set is data (an ordered list of
pattern/kind pairs), not a match arm per character.
*/

/// The 33 source-language token kinds, plus two internal kinds
/// (`Whitespace`, `Comment`) that are recognized and discarded before the
/// lexeme stream reaches the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    IdentSym,
    NumberSym,
    PlusSym,
    MinusSym,
    MultSym,
    SlashSym,
    OddSym,
    EqSym,
    NeqSym,
    LesSym,
    LeqSym,
    GtrSym,
    GeqSym,
    LparentSym,
    RparentSym,
    CommaSym,
    SemicolonSym,
    PeriodSym,
    BecomesSym,
    BeginSym,
    EndSym,
    IfSym,
    ThenSym,
    WhileSym,
    DoSym,
    CallSym,
    ConstSym,
    IntSym,
    ProcSym,
    WriteSym,
    ReadSym,
    ElseSym,

    // Internal-only: recognized by the lexer but never forwarded to the parser.
    Whitespace,
    Comment,
}

impl TokenKind {
    /// The terminal name used in grammar right-hand sides (§6.1). Returns
    /// `None` for the two internal kinds, which never appear as terminals.
    pub fn terminal_name(self) -> Option<&'static str> {
        use TokenKind::*;
        Some(match self {
            IdentSym => "identsym",
            NumberSym => "numbersym",
            PlusSym => "plussym",
            MinusSym => "minussym",
            MultSym => "multsym",
            SlashSym => "slashsym",
            OddSym => "oddsym",
            EqSym => "eqsym",
            NeqSym => "neqsym",
            LesSym => "lessym",
            LeqSym => "leqsym",
            GtrSym => "gtrsym",
            GeqSym => "geqsym",
            LparentSym => "lparentsym",
            RparentSym => "rparentsym",
            CommaSym => "commasym",
            SemicolonSym => "semicolonsym",
            PeriodSym => "periodsym",
            BecomesSym => "becomessym",
            BeginSym => "beginsym",
            EndSym => "endsym",
            IfSym => "ifsym",
            ThenSym => "thensym",
            WhileSym => "whilesym",
            DoSym => "dosym",
            CallSym => "callsym",
            ConstSym => "constsym",
            IntSym => "intsym",
            ProcSym => "procsym",
            WriteSym => "writesym",
            ReadSym => "readsym",
            ElseSym => "elsesym",
            Whitespace | Comment => return None,
        })
    }

    /// The numeric token-type code from the original's token enum (1-based,
    /// `IdentSym` is 2 since the original reserves 1 for an unused `NULSYM`
    /// sentinel). Used only by the CLI's verbosity>=3 numeric token dump;
    /// nothing in the pipeline itself needs a stable integer encoding.
    pub fn numeric_code(self) -> i64 {
        use TokenKind::*;
        match self {
            IdentSym => 2,
            NumberSym => 3,
            PlusSym => 4,
            MinusSym => 5,
            MultSym => 6,
            SlashSym => 7,
            OddSym => 8,
            EqSym => 9,
            NeqSym => 10,
            LesSym => 11,
            LeqSym => 12,
            GtrSym => 13,
            GeqSym => 14,
            LparentSym => 15,
            RparentSym => 16,
            CommaSym => 17,
            SemicolonSym => 18,
            PeriodSym => 19,
            BecomesSym => 20,
            BeginSym => 21,
            EndSym => 22,
            IfSym => 23,
            ThenSym => 24,
            WhileSym => 25,
            DoSym => 26,
            CallSym => 27,
            ConstSym => 28,
            IntSym => 29,
            ProcSym => 30,
            WriteSym => 31,
            ReadSym => 32,
            ElseSym => 33,
            Whitespace => 34,
            Comment => 35,
        }
    }

    /// Inverse of [`TokenKind::terminal_name`]; used by the parser to decide
    /// whether a grammar symbol is a terminal reference.
    pub fn from_terminal_name(name: &str) -> Option<TokenKind> {
        use TokenKind::*;
        Some(match name {
            "identsym" => IdentSym,
            "numbersym" => NumberSym,
            "plussym" => PlusSym,
            "minussym" => MinusSym,
            "multsym" => MultSym,
            "slashsym" => SlashSym,
            "oddsym" => OddSym,
            "eqsym" => EqSym,
            "neqsym" => NeqSym,
            "lessym" => LesSym,
            "leqsym" => LeqSym,
            "gtrsym" => GtrSym,
            "geqsym" => GeqSym,
            "lparentsym" => LparentSym,
            "rparentsym" => RparentSym,
            "commasym" => CommaSym,
            "semicolonsym" => SemicolonSym,
            "periodsym" => PeriodSym,
            "becomessym" => BecomesSym,
            "beginsym" => BeginSym,
            "endsym" => EndSym,
            "ifsym" => IfSym,
            "thensym" => ThenSym,
            "whilesym" => WhileSym,
            "dosym" => DoSym,
            "callsym" => CallSym,
            "constsym" => ConstSym,
            "intsym" => IntSym,
            "procsym" => ProcSym,
            "writesym" => WriteSym,
            "readsym" => ReadSym,
            "elsesym" => ElseSym,
            _ => return None,
        })
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.terminal_name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "{:?}", self),
        }
    }
}

/// An immutable (kind, literal text) pair. For identifiers and numbers the
/// text is significant downstream; for punctuation and keywords it is
/// redundant with the kind but preserved for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: TokenKind,
    pub text: String,
}

impl Lexeme {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }
}

impl fmt::Display for Lexeme {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.text)
    }
}

/// A diagnostic collected by the lexer. Lexing never aborts on one of these:
/// the offending character (or lexeme) is skipped/kept and scanning
/// continues, so a single pass can surface every lexical problem at once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    UnrecognizedCharacter { line: usize, text: String },
    IdentifierTooLong { line: usize, text: String },
    NumberTooLong { line: usize, text: String },
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LexError::UnrecognizedCharacter { line, text } => {
                write!(f, "line {line}: unrecognized character '{text}'")
            }
            LexError::IdentifierTooLong { line, text } => write!(
                f,
                "line {line}: identifier '{text}' exceeds {MAX_IDENTIFIER_LENGTH} characters"
            ),
            LexError::NumberTooLong { line, text } => write!(
                f,
                "line {line}: number '{text}' exceeds {MAX_NUMBER_LENGTH} digits"
            ),
        }
    }
}

pub const MAX_IDENTIFIER_LENGTH: usize = 11;
pub const MAX_NUMBER_LENGTH: usize = 5;

/// One entry in the ordered pattern table: a compiled, position-anchored
/// regex and the token kind it produces on a match.
struct TokenPattern {
    regex: Regex,
    kind: TokenKind,
}

/// The token patterns in the order the original lexer tries them. Order is
/// part of the contract: whitespace and comments must come before anything
/// else, keywords must come before the identifier pattern (so "beginning"
/// doesn't lex as "begin" + "ning"), and multi-character operators must come
/// before the single-character prefixes they extend.
static TOKEN_PATTERNS: Lazy<Vec<TokenPattern>> = Lazy::new(|| {
    use TokenKind::*;
    let table: &[(&str, TokenKind)] = &[
        (r"^\s+", Whitespace),
        (r"^/\*([^*]|\*+[^*/])*\*+/", Comment),
        (r"^begin\b", BeginSym),
        (r"^while\b", WhileSym),
        (r"^const\b", ConstSym),
        (r"^write\b", WriteSym),
        (r"^call\b", CallSym),
        (r"^then\b", ThenSym),
        (r"^procedure\b", ProcSym),
        (r"^read\b", ReadSym),
        (r"^else\b", ElseSym),
        (r"^odd\b", OddSym),
        (r"^end\b", EndSym),
        (r"^int\b", IntSym),
        (r"^if\b", IfSym),
        (r"^do\b", DoSym),
        (r"^[A-Za-z][A-Za-z0-9_]*", IdentSym),
        (r"^[0-9]+", NumberSym),
        (r"^>=", GeqSym),
        (r"^<=", LeqSym),
        (r"^<>", NeqSym),
        (r"^:=", BecomesSym),
        (r"^\+", PlusSym),
        (r"^-", MinusSym),
        (r"^\*", MultSym),
        (r"^/", SlashSym),
        (r"^=", EqSym),
        (r"^<", LesSym),
        (r"^>", GtrSym),
        (r"^\(", LparentSym),
        (r"^\)", RparentSym),
        (r"^,", CommaSym),
        (r"^;", SemicolonSym),
        (r"^\.", PeriodSym),
    ];

    table
        .iter()
        .map(|(pattern, kind)| TokenPattern {
            regex: Regex::new(pattern).expect("static token pattern must compile"),
            kind: *kind,
        })
        .collect()
});

/// Converts PL/0 source text into an ordered lexeme stream, discarding
/// whitespace and comments, plus any diagnostics collected along the way.
/// Lexing never fails outright: an unrecognized character is skipped and
/// scanning resumes at the next position, matching the original's
/// "skip and continue" recovery.
pub fn lex(source: &str) -> (Vec<Lexeme>, Vec<LexError>) {
    let mut lexemes = Vec::new();
    let mut errors = Vec::new();
    let mut line = 1usize;
    let mut rest = source;

    while !rest.is_empty() {
        match read_lexeme(rest) {
            Some((kind, text)) => {
                trace!("line {line}: matched {kind} '{text}'");
                line += text.matches('\n').count();
                if kind != TokenKind::Whitespace && kind != TokenKind::Comment {
                    check_length(kind, &text, line, &mut errors);
                    lexemes.push(Lexeme::new(kind, text.clone()));
                }
                rest = &rest[text.len()..];
            }
            None => {
                let bad = rest.chars().next().expect("rest is non-empty");
                debug!("line {line}: skipping unrecognized character '{bad}'");
                errors.push(LexError::UnrecognizedCharacter {
                    line,
                    text: bad.to_string(),
                });
                if bad == '\n' {
                    line += 1;
                }
                rest = &rest[bad.len_utf8()..];
            }
        }
    }

    debug!(
        "lexed {} lexemes with {} diagnostics",
        lexemes.len(),
        errors.len()
    );
    (lexemes, errors)
}

fn check_length(kind: TokenKind, text: &str, line: usize, errors: &mut Vec<LexError>) {
    match kind {
        TokenKind::IdentSym if text.len() > MAX_IDENTIFIER_LENGTH => {
            errors.push(LexError::IdentifierTooLong {
                line,
                text: text.to_string(),
            });
        }
        TokenKind::NumberSym if text.len() > MAX_NUMBER_LENGTH => {
            errors.push(LexError::NumberTooLong {
                line,
                text: text.to_string(),
            });
        }
        _ => {}
    }
}

/// Tries every pattern in order against the start of `source`, returning the
/// first match. Mirrors `readLexeme` in the original: a linear scan of the
/// pattern table rather than a single combined automaton, since the table is
/// small and order matters more than throughput.
fn read_lexeme(source: &str) -> Option<(TokenKind, String)> {
    for pattern in TOKEN_PATTERNS.iter() {
        if let Some(m) = pattern.regex.find(source) {
            if m.start() == 0 && !m.as_str().is_empty() {
                return Some((pattern.kind, m.as_str().to_string()));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex(source).0.into_iter().map(|l| l.kind).collect()
    }

    #[test]
    fn keywords_before_identifiers() {
        assert_eq!(kinds("begin"), vec![TokenKind::BeginSym]);
        assert_eq!(kinds("beginning"), vec![TokenKind::IdentSym]);
    }

    #[test]
    fn multi_char_operators_before_prefixes() {
        assert_eq!(kinds(">="), vec![TokenKind::GeqSym]);
        assert_eq!(kinds(">"), vec![TokenKind::GtrSym]);
        assert_eq!(kinds("<="), vec![TokenKind::LeqSym]);
        assert_eq!(kinds("<>"), vec![TokenKind::NeqSym]);
        assert_eq!(kinds("<"), vec![TokenKind::LesSym]);
        assert_eq!(kinds(":="), vec![TokenKind::BecomesSym]);
    }

    #[test]
    fn whitespace_and_comments_are_discarded() {
        let (lexemes, errors) = lex("x /* a * b */ := 1");
        assert!(errors.is_empty());
        assert_eq!(
            lexemes.iter().map(|l| l.kind).collect::<Vec<_>>(),
            vec![TokenKind::IdentSym, TokenKind::BecomesSym, TokenKind::NumberSym]
        );
    }

    #[test]
    fn unrecognized_character_is_skipped_not_fatal() {
        let (lexemes, errors) = lex("x := 1 @ y");
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], LexError::UnrecognizedCharacter { .. }));
        // Lexing continues past the bad character.
        assert_eq!(lexemes.last().unwrap().kind, TokenKind::IdentSym);
    }

    #[test]
    fn token_totality_round_trips_source() {
        let source = "const y = 3; int x; begin read x; if x = y then write x end.";
        let mut reconstructed = String::new();
        let mut rest = source;
        while !rest.is_empty() {
            let (_, text) = read_lexeme(rest).expect("whole source should lex");
            reconstructed.push_str(&text);
            rest = &rest[text.len()..];
        }
        assert_eq!(reconstructed, source);
    }

    #[test]
    fn identifier_and_number_length_limits_are_diagnosed_not_fatal() {
        let (lexemes, errors) = lex("abcdefghijkl 123456");
        assert_eq!(lexemes.len(), 2);
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], LexError::IdentifierTooLong { .. }));
        assert!(matches!(errors[1], LexError::NumberTooLong { .. }));
    }

    #[test]
    fn terminal_name_round_trips() {
        for kind in [
            TokenKind::IfSym,
            TokenKind::BeginSym,
            TokenKind::BecomesSym,
            TokenKind::OddSym,
        ] {
            let name = kind.terminal_name().unwrap();
            assert_eq!(TokenKind::from_terminal_name(name), Some(kind));
        }
    }

    #[test]
    fn numeric_codes_are_distinct() {
        let codes: Vec<i64> = [
            TokenKind::IdentSym,
            TokenKind::NumberSym,
            TokenKind::PlusSym,
            TokenKind::ElseSym,
            TokenKind::Whitespace,
            TokenKind::Comment,
        ]
        .into_iter()
        .map(TokenKind::numeric_code)
        .collect();
        let mut sorted = codes.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(codes.len(), sorted.len());
    }
}
