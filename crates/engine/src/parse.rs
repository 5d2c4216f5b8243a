//! Path and expression parsing.
//!
//! Paths are split lexically: segments are separated by dots outside
//! balanced parentheses and quoted strings, and call syntax desugars into
//! expression steps (`f(a, b)` becomes `f.(a).(b)`). The expression grammar
//! is a winnow recursive-descent parser over the full operator table.

use crate::{
    error::ParseError,
    expression::{BinOp, Expr, MapEntry, SeqItem, UnaryOp},
    value::Value,
};
use winnow::{
    ModalParser, ModalResult, Parser,
    ascii::{dec_int, float, multispace0},
    combinator::{
        alt, cut_err, delimited, fail, not, opt, peek, preceded, repeat,
        separated, terminated,
    },
    error::{ContextError, StrContext, StrContextValue},
    stream::Accumulate,
    token::{any, none_of, one_of, take_while},
};

/// A parsed path: an origin anchor plus a program of steps
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Path {
    pub origin: Origin,
    pub steps: Vec<Step>,
    /// Trailing standalone dot: finish by replacing the cursor with the
    /// label it sits under
    pub trailing_label: bool,
}

/// Where a path starts navigating from
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Origin {
    /// `:` anchors at the document root
    Root,
    /// Each leading dot is one level up
    Up(usize),
    /// No anchor: the argument-scope union
    Arguments,
    /// The bare-dot path: stay on the current cursor
    Current,
}

/// One access step
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Step {
    /// A raw segment, typed by scalar coercion at execution time
    Part(String),
    /// A pre-typed literal key
    Key(Value),
    /// A parenthesised expression or call argument, evaluated on demand
    Expr(Expr),
    /// Go up one level (empty segment between two dots)
    Up,
}

/// Parse a path string into its step program
pub(crate) fn parse_path(input: &str) -> Result<Path, ParseError> {
    let input = input.trim();
    if input == "." {
        // Name-of-self for the current entry
        return Ok(Path {
            origin: Origin::Current,
            steps: Vec::new(),
            trailing_label: true,
        });
    }

    let (origin, rest) = if let Some(rest) = input.strip_prefix(':') {
        // A separator directly after the anchor is tolerated: `:.a` ≡ `:a`
        (Origin::Root, rest.strip_prefix('.').unwrap_or(rest))
    } else if input.starts_with('.') {
        let stripped = input.trim_start_matches('.');
        (Origin::Up(input.len() - stripped.len()), stripped)
    } else {
        (Origin::Arguments, input)
    };

    let mut path = Path {
        origin,
        steps: Vec::new(),
        trailing_label: false,
    };
    if rest.is_empty() {
        return Ok(path);
    }

    let segments = split_segments(rest)?;
    let count = segments.len();
    for (index, segment) in segments.into_iter().enumerate() {
        let segment = segment.trim();
        if segment.is_empty() {
            if index + 1 == count {
                path.trailing_label = true;
            } else {
                path.steps.push(Step::Up);
            }
        } else {
            segment_steps(segment, &mut path.steps)?;
        }
    }
    Ok(path)
}

/// Parse an expression string into its tree
pub(crate) fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    expression.parse(input.trim()).map_err(ParseError::from)
}

/// Split path text into segments at dots that sit outside balanced
/// parentheses and quoted strings
fn split_segments(text: &str) -> Result<Vec<&str>, ParseError> {
    let mut segments = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ParseError(format!("unbalanced `)` in path `{text}`"))
                })?;
            }
            '.' if depth == 0 => {
                segments.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if depth > 0 || quote.is_some() {
        return Err(ParseError(format!("unbalanced group in path `{text}`")));
    }
    segments.push(&text[start..]);
    Ok(segments)
}

/// Desugar one segment into steps. `atom(a, b)(c)` is an atom step plus one
/// expression step per argument; a fully parenthesised segment is a single
/// expression step.
fn segment_steps(
    segment: &str,
    steps: &mut Vec<Step>,
) -> Result<(), ParseError> {
    validate_segment(segment)?;
    let open = top_level_paren(segment);
    let atom = segment[..open.unwrap_or(segment.len())].trim();
    if !atom.is_empty() {
        steps.push(Step::Part(atom.to_owned()));
    }

    let mut rest = &segment[open.unwrap_or(segment.len())..];
    let mut first_group = true;
    while !rest.is_empty() {
        let (inner, consumed) = balanced_group(rest).ok_or_else(|| {
            ParseError(format!("malformed call syntax in `{segment}`"))
        })?;
        rest = rest[consumed..].trim_start();

        if first_group && atom.is_empty() {
            // A parenthesised segment is one expression step
            steps.push(Step::Expr(parse_expression(inner)?));
        } else {
            // A call group contributes one expression step per argument;
            // empty slots mean null
            for arg in split_args(inner)? {
                let arg = arg.trim();
                let expr = if arg.is_empty() {
                    Expr::Literal(Value::Null)
                } else {
                    parse_expression(arg)?
                };
                steps.push(Step::Expr(expr));
            }
        }
        first_group = false;
    }
    Ok(())
}

/// A segment is a single key or a call chain. Whitespace or commas sitting
/// outside every group and quoted string mean the text is not a path —
/// expression source like `1 if n<=1 else n * 2` must be rejected here, not
/// resolved as a sequence of nonsense keys.
fn validate_segment(segment: &str) -> Result<(), ParseError> {
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in segment.chars() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            c if depth == 0 && (c.is_whitespace() || c == ',') => {
                return Err(ParseError(format!(
                    "not a path segment: `{segment}`"
                )));
            }
            _ => {}
        }
    }
    Ok(())
}

/// Byte offset of the first parenthesis that starts call syntax: outside
/// quoted strings and not part of a `$(...)` splice, which belongs to the
/// segment's key text
fn top_level_paren(text: &str) -> Option<usize> {
    let mut i = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev: Option<char> = None;
    while i < text.len() {
        let Some(c) = text[i..].chars().next() else {
            break;
        };
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
        } else {
            match c {
                '\'' | '"' => quote = Some(c),
                '(' if prev == Some('$') => {
                    // A splice group; skip it wholesale
                    let (_, consumed) = balanced_group(&text[i..])?;
                    i += consumed;
                    prev = Some(')');
                    continue;
                }
                '(' => return Some(i),
                _ => {}
            }
        }
        prev = Some(c);
        i += c.len_utf8();
    }
    None
}

/// Extract a balanced parenthesised group starting at the first character.
/// Returns the inner text and the total length consumed (both parens
/// included). Quoted strings inside the group are honored.
pub(crate) fn balanced_group(text: &str) -> Option<(&str, usize)> {
    if !text.starts_with('(') {
        return None;
    }
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some((&text[1..i], i + 1));
                }
            }
            _ => {}
        }
    }
    None
}

/// Split call arguments at commas outside nested groups and quoted strings.
/// A blank input yields one empty argument, so `f()` desugars to `f.(null)`.
fn split_args(text: &str) -> Result<Vec<&str>, ParseError> {
    let mut args = Vec::new();
    let mut start = 0;
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth.checked_sub(1).ok_or_else(|| {
                    ParseError(format!("unbalanced call arguments `{text}`"))
                })?;
            }
            ',' if depth == 0 => {
                args.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    args.push(&text[start..]);
    Ok(args)
}

// ===== Expression grammar =====
//
// One function per precedence level, lowest first. Every level is
// left-associative except the conditional (right) and power (single).

fn expression(input: &mut &str) -> ModalResult<Expr> {
    conditional.parse_next(input)
}

/// `value if condition else fallback`; only the taken branch is evaluated
fn conditional(input: &mut &str) -> ModalResult<Expr> {
    let value = or_expr.parse_next(input)?;
    let tail = opt((
        preceded(keyword("if"), or_expr),
        preceded(keyword("else"), cut_err(conditional)),
    ))
    .parse_next(input)?;
    Ok(match tail {
        Some((condition, fallback)) => Expr::Cond {
            value: Box::new(value),
            condition: Box::new(condition),
            fallback: Box::new(fallback),
        },
        None => value,
    })
}

fn or_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = and_expr.parse_next(input)?;
    let rest: Vec<Expr> =
        repeat(0.., preceded(keyword("or"), and_expr)).parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, rhs| Expr::Or(Box::new(acc), Box::new(rhs))))
}

fn and_expr(input: &mut &str) -> ModalResult<Expr> {
    let first = not_expr.parse_next(input)?;
    let rest: Vec<Expr> =
        repeat(0.., preceded(keyword("and"), not_expr)).parse_next(input)?;
    Ok(rest
        .into_iter()
        .fold(first, |acc, rhs| Expr::And(Box::new(acc), Box::new(rhs))))
}

fn not_expr(input: &mut &str) -> ModalResult<Expr> {
    alt((
        preceded(keyword("not"), not_expr).map(|e| Expr::Not(Box::new(e))),
        comparison,
    ))
    .parse_next(input)
}

/// Relational operators don't chain: `a < b < c` is a parse error
fn comparison(input: &mut &str) -> ModalResult<Expr> {
    let lhs = bit_or.parse_next(input)?;
    let tail = opt((relational_op, bit_or)).parse_next(input)?;
    Ok(match tail {
        Some((op, rhs)) => Expr::Binary(op, Box::new(lhs), Box::new(rhs)),
        None => lhs,
    })
}

fn relational_op(input: &mut &str) -> ModalResult<BinOp> {
    ws(alt((
        "==".value(BinOp::Eq),
        "!=".value(BinOp::Ne),
        "<=".value(BinOp::Le),
        ">=".value(BinOp::Ge),
        // Don't eat the first half of a shift operator
        terminated("<", not("<")).value(BinOp::Lt),
        terminated(">", not(">")).value(BinOp::Gt),
        (keyword("not"), keyword("in")).value(BinOp::NotIn),
        keyword("in").value(BinOp::In),
    )))
    .parse_next(input)
}

fn bit_or(input: &mut &str) -> ModalResult<Expr> {
    let first = bit_xor.parse_next(input)?;
    let rest: Vec<Expr> =
        repeat(0.., preceded(ws('|'), bit_xor)).parse_next(input)?;
    Ok(rest.into_iter().fold(first, |acc, rhs| {
        Expr::Binary(BinOp::BitOr, Box::new(acc), Box::new(rhs))
    }))
}

fn bit_xor(input: &mut &str) -> ModalResult<Expr> {
    let first = bit_and.parse_next(input)?;
    let rest: Vec<Expr> =
        repeat(0.., preceded(ws('^'), bit_and)).parse_next(input)?;
    Ok(rest.into_iter().fold(first, |acc, rhs| {
        Expr::Binary(BinOp::BitXor, Box::new(acc), Box::new(rhs))
    }))
}

fn bit_and(input: &mut &str) -> ModalResult<Expr> {
    let first = shift.parse_next(input)?;
    let rest: Vec<Expr> =
        repeat(0.., preceded(ws('&'), shift)).parse_next(input)?;
    Ok(rest.into_iter().fold(first, |acc, rhs| {
        Expr::Binary(BinOp::BitAnd, Box::new(acc), Box::new(rhs))
    }))
}

fn shift(input: &mut &str) -> ModalResult<Expr> {
    let first = add_sub.parse_next(input)?;
    let rest: Vec<(BinOp, Expr)> = repeat(
        0..,
        (
            ws(alt(("<<".value(BinOp::Shl), ">>".value(BinOp::Shr)))),
            add_sub,
        ),
    )
    .parse_next(input)?;
    Ok(rest.into_iter().fold(first, |acc, (op, rhs)| {
        Expr::Binary(op, Box::new(acc), Box::new(rhs))
    }))
}

fn add_sub(input: &mut &str) -> ModalResult<Expr> {
    let first = mul_div.parse_next(input)?;
    let rest: Vec<(BinOp, Expr)> = repeat(
        0..,
        (
            ws(alt(('+'.value(BinOp::Add), '-'.value(BinOp::Sub)))),
            mul_div,
        ),
    )
    .parse_next(input)?;
    Ok(rest.into_iter().fold(first, |acc, (op, rhs)| {
        Expr::Binary(op, Box::new(acc), Box::new(rhs))
    }))
}

fn mul_div(input: &mut &str) -> ModalResult<Expr> {
    let first = unary.parse_next(input)?;
    let rest: Vec<(BinOp, Expr)> = repeat(
        0..,
        (
            ws(alt((
                "//".value(BinOp::FloorDiv),
                '/'.value(BinOp::Div),
                '*'.value(BinOp::Mul),
                '%'.value(BinOp::Rem),
            ))),
            unary,
        ),
    )
    .parse_next(input)?;
    Ok(rest.into_iter().fold(first, |acc, (op, rhs)| {
        Expr::Binary(op, Box::new(acc), Box::new(rhs))
    }))
}

fn unary(input: &mut &str) -> ModalResult<Expr> {
    alt((
        preceded(ws('-'), unary)
            .map(|e| Expr::Unary(UnaryOp::Neg, Box::new(e))),
        preceded(ws('+'), unary)
            .map(|e| Expr::Unary(UnaryOp::Pos, Box::new(e))),
        preceded(ws('~'), unary)
            .map(|e| Expr::Unary(UnaryOp::Invert, Box::new(e))),
        power,
    ))
    .parse_next(input)
}

/// `base ** exponent`. The exponent may itself be signed; chaining is not
/// supported, matching the grammar this implements
fn power(input: &mut &str) -> ModalResult<Expr> {
    let base = atom.parse_next(input)?;
    let exponent = opt(preceded(ws("**"), unary)).parse_next(input)?;
    Ok(match exponent {
        Some(exponent) => Expr::Binary(
            BinOp::Pow,
            Box::new(base),
            Box::new(exponent),
        ),
        None => base,
    })
}

fn atom(input: &mut &str) -> ModalResult<Expr> {
    ws(terminated(
        alt((
            literal,
            sequence_literal,
            mapping_literal,
            delimited('(', expression, cut_err(')')),
            path_atom,
            fail.context(ctx_expected("literal"))
                .context(ctx_expected("collection"))
                .context(ctx_expected("path")),
        )),
        boundary,
    ))
    .context(ctx_label("expression"))
    .parse_next(input)
}

/// Parse a literal: null, bool, number, string
fn literal(input: &mut &str) -> ModalResult<Expr> {
    alt((
        keyword("null").value(Expr::Literal(Value::Null)),
        '~'.value(Expr::Literal(Value::Null)),
        keyword("true").value(Expr::Literal(Value::Bool(true))),
        keyword("yes").value(Expr::Literal(Value::Bool(true))),
        keyword("false").value(Expr::Literal(Value::Bool(false))),
        keyword("no").value(Expr::Literal(Value::Bool(false))),
        number,
        string_literal.map(|s| Expr::Literal(Value::from(s))),
    ))
    .parse_next(input)
}

fn number(input: &mut &str) -> ModalResult<Expr> {
    alt((
        // If we see digits (or a leading dot) followed by . or e, it's a
        // float. The peek check prevents the int parser from eating the
        // first half of a float and leaving us in an unrecoverable state.
        preceded(
            peek((
                take_while(1.., |c: char| c.is_ascii_digit()),
                one_of(['.', 'e', 'E']),
            )),
            float.map(|f: f64| Expr::Literal(Value::Float(f))),
        ),
        // Leading-dot floats (`.5`, `.5e3`) are recognized by hand so the
        // dot is never mistaken for an upward path move
        (
            '.',
            take_while(1.., |c: char| c.is_ascii_digit()),
            opt((
                one_of(['e', 'E']),
                opt(one_of(['+', '-'])),
                take_while(1.., |c: char| c.is_ascii_digit()),
            )),
        )
            .take()
            .map(|text: &str| {
                Expr::Literal(Value::Float(
                    text.parse().unwrap_or_default(),
                ))
            }),
        dec_int.map(|i: i64| Expr::Literal(Value::Int(i))),
    ))
    .context(ctx_label("number"))
    .parse_next(input)
}

/// Parse a string literal: '...' or "..."
fn string_literal(input: &mut &str) -> ModalResult<String> {
    alt((quoted_text('\''), quoted_text('"')))
        .context(ctx_label("string literal"))
        .parse_next(input)
}

/// Create a parser for quoted text with backslash escapes. The opening quote
/// is unambiguous, so any error after it is fatal.
fn quoted_text<'a>(
    quote: char,
) -> impl ModalParser<&'a str, String, ContextError> {
    preceded(
        quote,
        cut_err(terminated(
            repeat(
                0..,
                alt((
                    preceded('\\', any).map(|c: char| match c {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        '0' => '\0',
                        other => other,
                    }),
                    none_of(['\\', quote]),
                )),
            ),
            quote.context(StrContext::Expected(StrContextValue::CharLiteral(
                quote,
            ))),
        )),
    )
}

/// Parse a sequence literal: `[expr, *splat, ...]`
fn sequence_literal(input: &mut &str) -> ModalResult<Expr> {
    delimited_list('[', seq_item, ']')
        .map(Expr::Seq)
        .context(ctx_label("sequence"))
        .parse_next(input)
}

fn seq_item(input: &mut &str) -> ModalResult<SeqItem> {
    alt((
        preceded(ws('*'), cut_err(expression)).map(SeqItem::Splat),
        expression.map(SeqItem::Item),
    ))
    .parse_next(input)
}

/// Parse a mapping literal: `{key: value, **splat, bare_key, ...}`
fn mapping_literal(input: &mut &str) -> ModalResult<Expr> {
    delimited_list('{', map_entry, '}')
        .map(Expr::Map)
        .context(ctx_label("mapping"))
        .parse_next(input)
}

fn map_entry(input: &mut &str) -> ModalResult<MapEntry> {
    alt((
        preceded(ws("**"), cut_err(expression)).map(MapEntry::Splat),
        (map_key, opt(preceded(ws(':'), opt(expression)))).map(
            |(key, value)| MapEntry::Entry {
                key,
                value: value.flatten(),
            },
        ),
    ))
    .parse_next(input)
}

/// Mapping keys: a parenthesised expression, a sequence, a literal, or a
/// bare word (which is the key itself, not a variable)
fn map_key(input: &mut &str) -> ModalResult<Expr> {
    ws(alt((
        delimited('(', expression, cut_err(')')),
        sequence_literal,
        literal,
        identifier.map(|id| Expr::Literal(Value::from(id))),
    )))
    .parse_next(input)
}

/// Parse a variable path: `name`, `:.doc.key`, `..sibling`, `:.f(x)`
fn path_atom(input: &mut &str) -> ModalResult<Expr> {
    let (origin, first) = alt((
        preceded(':', opt(preceded(opt('.'), path_element)))
            .map(|first| (Origin::Root, first)),
        (take_while(1.., '.'), path_element)
            .map(|(dots, first): (&str, _)| {
                (Origin::Up(dots.len()), Some(first))
            }),
        identifier.map(|id| (Origin::Arguments, Some(Step::Part(id)))),
    ))
    .parse_next(input)?;

    let tail: Vec<Vec<Step>> = repeat(
        0..,
        alt((
            // `.element`, with extra dots popping upward
            (ws(take_while(1.., '.')), path_element).map(
                |(dots, element): (&str, _)| {
                    let mut steps = vec![Step::Up; dots.len() - 1];
                    steps.push(element);
                    steps
                },
            ),
            // A call group desugars to one expression step per argument
            call_group
                .map(|args| args.into_iter().map(Step::Expr).collect()),
        )),
    )
    .parse_next(input)?;

    let steps = first.into_iter().chain(tail.into_iter().flatten()).collect();
    Ok(Expr::Path(Path {
        origin,
        steps,
        trailing_label: false,
    }))
}

fn path_element(input: &mut &str) -> ModalResult<Step> {
    alt((
        '*'.map(|_| Step::Part("*".to_owned())),
        identifier.map(Step::Part),
        take_while(1.., |c: char| c.is_ascii_digit())
            .map(|digits: &str| Step::Part(digits.to_owned())),
        string_literal.map(|s| Step::Key(Value::from(s))),
        delimited('(', expression, cut_err(')')).map(Step::Expr),
        sequence_literal.map(Step::Expr),
    ))
    .parse_next(input)
}

/// Parse a call's argument list. Empty slots (and an empty list) mean null.
fn call_group(input: &mut &str) -> ModalResult<Vec<Expr>> {
    preceded(
        ('(', multispace0),
        cut_err(terminated(
            alt((
                peek(')').map(|_| vec![Expr::Literal(Value::Null)]),
                separated(1.., call_arg, ws(',')),
            )),
            (multispace0, ')'),
        )),
    )
    .context(ctx_label("call"))
    .parse_next(input)
}

fn call_arg(input: &mut &str) -> ModalResult<Expr> {
    alt((
        expression,
        // An empty slot between commas (or before the close) means null
        peek(ws(one_of([',', ')']))).map(|_| Expr::Literal(Value::Null)),
    ))
    .parse_next(input)
}

/// Parse an identifier: a name starting with a letter, `_`, or `$`
fn identifier(input: &mut &str) -> ModalResult<String> {
    (take_while(1, is_ident_first), take_while(0.., is_ident_char))
        .take()
        .map(str::to_owned)
        .context(ctx_label("identifier"))
        .parse_next(input)
}

fn is_ident_first(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Parse a reserved word, requiring a token boundary after it so `not` never
/// eats the front of `nothing`
fn keyword<'a>(
    word: &'static str,
) -> impl ModalParser<&'a str, (), ContextError> {
    ws(terminated(word, not(one_of(is_ident_char)))).value(())
}

/// Create a parser for a comma-separated list with bounding delimiters.
/// Supports an optional trailing comma and whitespace around each element.
/// The open delimiter must be unambiguous, such that any error after the
/// open is fatal.
fn delimited_list<'a, O, Acc, F>(
    open: char,
    parser: F,
    close: char,
) -> impl ModalParser<&'a str, Acc, ContextError>
where
    F: ModalParser<&'a str, O, ContextError>,
    Acc: Accumulate<O>,
{
    preceded(
        open,
        cut_err(terminated(
            ws(terminated(
                separated(0.., parser, ws(',')),
                opt(ws(',')),
            )),
            close.context(StrContext::Expected(StrContextValue::CharLiteral(
                close,
            ))),
        )),
    )
}

/// Wrap a parser to allow whitespace on either side of it
fn ws<'a, O, F>(parser: F) -> impl ModalParser<&'a str, O, ContextError>
where
    F: ModalParser<&'a str, O, ContextError>,
{
    delimited(multispace0, parser, multispace0)
}

/// Detect the end of a token without consuming any input. This prevents
/// parsing `1user` as a number with lingering input.
fn boundary(input: &mut &str) -> ModalResult<()> {
    if input.is_empty() || !is_ident_char(input.chars().next().unwrap()) {
        Ok(())
    } else {
        cut_err(fail)
            .context(ctx_expected("end of token"))
            .parse_next(input)
    }
}

fn ctx_label(label: &'static str) -> StrContext {
    StrContext::Label(label)
}

fn ctx_expected(expected: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(expected))
}
