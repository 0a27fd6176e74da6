use crate::error::{Reporter, SourceRange};
use crate::session::FileID;
use crate::text::{TextOffset, TextRange};

#[derive(Copy, Clone, PartialEq, Debug)]
pub enum Token {
    Eof,
    Ident,
    IntLit,
    RealLit,
    CharLit,
    StrLit,

    KwUsing,
    KwNamespace,
    KwClass,
    KwInterface,
    KwStruct,
    KwEnum,
    KwErrordomain,
    KwDelegate,
    KwSignal,
    KwConst,
    KwPublic,
    KwPrivate,
    KwProtected,
    KwInternal,
    KwStatic,
    KwAbstract,
    KwVirtual,
    KwOverride,
    KwOwned,
    KwUnowned,
    KwWeak,
    KwNew,
    KwVar,
    KwVoid,
    KwReturn,
    KwIf,
    KwElse,
    KwWhile,
    KwFor,
    KwThis,
    KwNull,
    KwTrue,
    KwFalse,
    KwGet,
    KwSet,

    Dot,
    Arrow,
    Comma,
    Semi,
    Colon,
    Question,
    Star,
    Amp,
    ParenOpen,
    ParenClose,
    BraceOpen,
    BraceClose,
    BracketOpen,
    BracketClose,
    Plus,
    Minus,
    Slash,
    Percent,
    Bang,
    Assign,
    CmpEq,
    CmpNotEq,
    CmpLt,
    CmpLtEq,
    CmpGt,
    CmpGtEq,
    LogicAnd,
    LogicOr,
}

impl Token {
    pub fn keyword(ident: &str) -> Option<Token> {
        let token = match ident {
            "using" => Token::KwUsing,
            "namespace" => Token::KwNamespace,
            "class" => Token::KwClass,
            "interface" => Token::KwInterface,
            "struct" => Token::KwStruct,
            "enum" => Token::KwEnum,
            "errordomain" => Token::KwErrordomain,
            "delegate" => Token::KwDelegate,
            "signal" => Token::KwSignal,
            "const" => Token::KwConst,
            "public" => Token::KwPublic,
            "private" => Token::KwPrivate,
            "protected" => Token::KwProtected,
            "internal" => Token::KwInternal,
            "static" => Token::KwStatic,
            "abstract" => Token::KwAbstract,
            "virtual" => Token::KwVirtual,
            "override" => Token::KwOverride,
            "owned" => Token::KwOwned,
            "unowned" => Token::KwUnowned,
            "weak" => Token::KwWeak,
            "new" => Token::KwNew,
            "var" => Token::KwVar,
            "void" => Token::KwVoid,
            "return" => Token::KwReturn,
            "if" => Token::KwIf,
            "else" => Token::KwElse,
            "while" => Token::KwWhile,
            "for" => Token::KwFor,
            "this" => Token::KwThis,
            "null" => Token::KwNull,
            "true" => Token::KwTrue,
            "false" => Token::KwFalse,
            "get" => Token::KwGet,
            "set" => Token::KwSet,
            _ => return None,
        };
        Some(token)
    }

    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Token::KwPublic
                | Token::KwPrivate
                | Token::KwProtected
                | Token::KwInternal
                | Token::KwStatic
                | Token::KwAbstract
                | Token::KwVirtual
                | Token::KwOverride
                | Token::KwOwned
                | Token::KwUnowned
                | Token::KwWeak
        )
    }
}

pub struct TokenList {
    tokens: Vec<Token>,
    ranges: Vec<TextRange>,
}

impl TokenList {
    fn new() -> TokenList {
        TokenList { tokens: Vec::with_capacity(256), ranges: Vec::with_capacity(256) }
    }

    fn add(&mut self, token: Token, range: TextRange) {
        self.tokens.push(token);
        self.ranges.push(range);
    }

    #[inline]
    pub fn token(&self, index: usize) -> Token {
        self.tokens[index]
    }
    #[inline]
    pub fn range(&self, index: usize) -> TextRange {
        self.ranges[index]
    }
    #[inline]
    pub fn count(&self) -> usize {
        self.tokens.len()
    }
}

struct Lexer<'src> {
    source: &'src str,
    pos: usize,
    file_id: FileID,
    tokens: TokenList,
}

pub fn lex(source: &str, file_id: FileID, reporter: &mut Reporter) -> TokenList {
    let mut lex = Lexer { source, pos: 0, file_id, tokens: TokenList::new() };

    while let Some(c) = lex.peek() {
        if c.is_ascii_whitespace() {
            lex.eat(c);
        } else if c == '/' && lex.peek_next() == Some('/') {
            skip_line_comment(&mut lex);
        } else if c == '/' && lex.peek_next() == Some('*') {
            skip_block_comment(&mut lex, reporter);
        } else if c == '"' {
            lex_string(&mut lex, reporter);
        } else if c == '\'' {
            lex_char(&mut lex, reporter);
        } else if c.is_ascii_digit() {
            lex_number(&mut lex);
        } else if c == '_' || c.is_ascii_alphabetic() {
            lex_ident(&mut lex);
        } else {
            lex_symbol(&mut lex, reporter, c);
        }
    }

    let eof = TextRange::empty_at((source.len() as u32).into());
    lex.tokens.add(Token::Eof, eof);
    lex.tokens.add(Token::Eof, eof);
    lex.tokens
}

impl<'src> Lexer<'src> {
    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }
    fn peek_next(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }
    fn eat(&mut self, c: char) {
        self.pos += c.len_utf8();
    }
    fn start(&self) -> TextOffset {
        (self.pos as u32).into()
    }
    fn make_range(&self, start: TextOffset) -> TextRange {
        TextRange::new(start, (self.pos as u32).into())
    }
    fn src(&self, start: TextOffset) -> SourceRange {
        SourceRange::new(self.make_range(start), self.file_id)
    }
}

fn skip_line_comment(lex: &mut Lexer) {
    while let Some(c) = lex.peek() {
        lex.eat(c);
        if c == '\n' {
            break;
        }
    }
}

fn skip_block_comment(lex: &mut Lexer, reporter: &mut Reporter) {
    let start = lex.start();
    lex.eat('/');
    lex.eat('*');
    loop {
        match lex.peek() {
            Some('*') if lex.peek_next() == Some('/') => {
                lex.eat('*');
                lex.eat('/');
                return;
            }
            Some(c) => lex.eat(c),
            None => {
                reporter.error("missing block comment terminator `*/`", lex.src(start));
                return;
            }
        }
    }
}

fn lex_string(lex: &mut Lexer, reporter: &mut Reporter) {
    let start = lex.start();
    lex.eat('"');
    loop {
        match lex.peek() {
            Some('"') => {
                lex.eat('"');
                break;
            }
            Some('\\') => {
                lex.eat('\\');
                if let Some(c) = lex.peek() {
                    lex.eat(c);
                }
            }
            Some('\n') | None => {
                reporter.error("missing string terminator `\"`", lex.src(start));
                break;
            }
            Some(c) => lex.eat(c),
        }
    }
    let range = lex.make_range(start);
    lex.tokens.add(Token::StrLit, range);
}

fn lex_char(lex: &mut Lexer, reporter: &mut Reporter) {
    let start = lex.start();
    lex.eat('\'');
    match lex.peek() {
        Some('\\') => {
            lex.eat('\\');
            if let Some(c) = lex.peek() {
                lex.eat(c);
            }
        }
        Some(c) if c != '\'' => lex.eat(c),
        _ => {}
    }
    if lex.peek() == Some('\'') {
        lex.eat('\'');
    } else {
        reporter.error("missing char literal terminator `'`", lex.src(start));
    }
    let range = lex.make_range(start);
    lex.tokens.add(Token::CharLit, range);
}

fn lex_number(lex: &mut Lexer) {
    let start = lex.start();
    let mut is_real = false;
    while let Some(c) = lex.peek() {
        if c.is_ascii_digit() {
            lex.eat(c);
        } else if c == '.' && !is_real && matches!(lex.peek_next(), Some(n) if n.is_ascii_digit()) {
            is_real = true;
            lex.eat(c);
        } else {
            break;
        }
    }
    let token = if is_real { Token::RealLit } else { Token::IntLit };
    let range = lex.make_range(start);
    lex.tokens.add(token, range);
}

fn lex_ident(lex: &mut Lexer) {
    let start = lex.start();
    while let Some(c) = lex.peek() {
        if c == '_' || c.is_ascii_alphanumeric() {
            lex.eat(c);
        } else {
            break;
        }
    }
    let range = lex.make_range(start);
    let text = &lex.source[range.as_usize()];
    let token = Token::keyword(text).unwrap_or(Token::Ident);
    lex.tokens.add(token, range);
}

fn lex_symbol(lex: &mut Lexer, reporter: &mut Reporter, c: char) {
    let start = lex.start();
    lex.eat(c);

    let token = match c {
        '.' => Token::Dot,
        ',' => Token::Comma,
        ';' => Token::Semi,
        ':' => Token::Colon,
        '?' => Token::Question,
        '*' => Token::Star,
        '(' => Token::ParenOpen,
        ')' => Token::ParenClose,
        '{' => Token::BraceOpen,
        '}' => Token::BraceClose,
        '[' => Token::BracketOpen,
        ']' => Token::BracketClose,
        '+' => Token::Plus,
        '/' => Token::Slash,
        '%' => Token::Percent,
        '-' => match lex.peek() {
            Some('>') => {
                lex.eat('>');
                Token::Arrow
            }
            _ => Token::Minus,
        },
        '!' => match lex.peek() {
            Some('=') => {
                lex.eat('=');
                Token::CmpNotEq
            }
            _ => Token::Bang,
        },
        '=' => match lex.peek() {
            Some('=') => {
                lex.eat('=');
                Token::CmpEq
            }
            _ => Token::Assign,
        },
        '<' => match lex.peek() {
            Some('=') => {
                lex.eat('=');
                Token::CmpLtEq
            }
            _ => Token::CmpLt,
        },
        '>' => match lex.peek() {
            Some('=') => {
                lex.eat('=');
                Token::CmpGtEq
            }
            _ => Token::CmpGt,
        },
        '&' => match lex.peek() {
            Some('&') => {
                lex.eat('&');
                Token::LogicAnd
            }
            _ => Token::Amp,
        },
        '|' => match lex.peek() {
            Some('|') => {
                lex.eat('|');
                Token::LogicOr
            }
            _ => {
                reporter.error("invalid character `|`", lex.src(start));
                return;
            }
        },
        _ => {
            reporter.error(format!("invalid character `{c}`"), lex.src(start));
            return;
        }
    };

    let range = lex.make_range(start);
    lex.tokens.add(token, range);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_kinds(text: &str) -> Vec<Token> {
        let mut reporter = Reporter::new();
        let tokens = lex(text, FileID::new(0), &mut reporter);
        assert!(!reporter.did_error(), "unexpected lex errors");
        (0..tokens.count()).map(|i| tokens.token(i)).collect()
    }

    #[test]
    fn idents_keywords_and_symbols() {
        let kinds = lex_kinds("class Foo { int x; }");
        assert_eq!(
            kinds,
            vec![
                Token::KwClass,
                Token::Ident,
                Token::BraceOpen,
                Token::Ident,
                Token::Ident,
                Token::Semi,
                Token::BraceClose,
                Token::Eof,
                Token::Eof,
            ]
        );
    }

    #[test]
    fn arrow_and_comparisons() {
        let kinds = lex_kinds("p->x <= y != z");
        assert_eq!(
            kinds[..7],
            [
                Token::Ident,
                Token::Arrow,
                Token::Ident,
                Token::CmpLtEq,
                Token::Ident,
                Token::CmpNotEq,
                Token::Ident,
            ]
        );
    }

    #[test]
    fn literals() {
        let kinds = lex_kinds("3 2.5 'a' \"hi\\\"\" true null");
        assert_eq!(
            kinds[..6],
            [
                Token::IntLit,
                Token::RealLit,
                Token::CharLit,
                Token::StrLit,
                Token::KwTrue,
                Token::KwNull,
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        let kinds = lex_kinds("a // line\n/* block\nstill */ b");
        assert_eq!(kinds[..2], [Token::Ident, Token::Ident]);
    }

    #[test]
    fn token_ranges() {
        let mut reporter = Reporter::new();
        let tokens = lex("ab cd", FileID::new(0), &mut reporter);
        assert_eq!(tokens.range(0), TextRange::new(0.into(), 2.into()));
        assert_eq!(tokens.range(1), TextRange::new(3.into(), 5.into()));
    }
}
