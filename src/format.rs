//! Format engine (spec §4.8): parses a printf-style template into
//! [`Specifier`]s, binds them against a caller-supplied argument list, and
//! emits the rendered output plus optional replacement metadata. Also
//! implements format *validation* mode, comparing an untrusted template
//! against an expected one specifier-by-specifier.
//!
//! Width and precision are parsed only as literal digit runs, not as
//! argument-sourced `*`/`*N$` — the parser state diagram this engine is
//! built from doesn't show that branch, so it's left out rather than
//! invented; the main conversion's own argument position is still fully
//! `%N$`-capable, sequential or explicit, per spec.

use crate::error::StringError;
use crate::locale::Locale;
use bitflags::bitflags;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarSize {
    One,
    Two,
    Four,
    Eight,
    Sixteen,
    Pointer,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    Literal,
    LongInt,
    Double,
    Pointer,
    Object,
    UnicharArray,
    CharArray,
    PascalCharArray,
    SingleUnichar,
    DummyPointerForN,
    IncompleteSpecifier,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SpecifierFlags: u32 {
        const ALTERNATE          = 1 << 0; // '#'
        const LEFT_JUSTIFY        = 1 << 1; // '-'
        const PLUS                = 1 << 2; // '+'
        const SPACE               = 1 << 3; // ' '
        const ZERO_PAD            = 1 << 4; // '0'
        const EXTERNAL_SPEC       = 1 << 5; // '[key]@'
        const LOCALIZABLE         = 1 << 6;
        const ENTITY_MARKER       = 1 << 7;
        const PERCENT_REPLACEMENT = 1 << 8; // '%%' marked for metadata
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericStyle {
    Decimal,
    Scientific,
    DecimalOrScientific,
    Unsigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgPos {
    Sequential,
    Explicit(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Specifier {
    pub source_offset: usize,
    pub source_len: usize,
    pub scalar_size: ScalarSize,
    pub kind: ValueKind,
    pub flags: SpecifierFlags,
    pub arg_pos: ArgPos,
    pub width: Option<i64>,
    pub precision: Option<i64>,
    pub numeric_style: Option<NumericStyle>,
    pub config_key: Option<String>,
    /// The raw conversion letter (`'d'`, `'x'`, `'X'`, `'o'`, ...). Needed at
    /// emission time because `numeric_style` alone can't tell `%x` from
    /// `%X` from `%u` — they're all `(LongInt, Unsigned)`.
    pub conversion: char,
}

impl Specifier {
    fn literal(offset: usize, len: usize) -> Self {
        Specifier {
            source_offset: offset,
            source_len: len,
            scalar_size: ScalarSize::Four,
            kind: ValueKind::Literal,
            flags: SpecifierFlags::empty(),
            arg_pos: ArgPos::Sequential,
            width: None,
            precision: None,
            numeric_style: None,
            config_key: None,
            conversion: '\0',
        }
    }
}

fn digit(u: u16) -> Option<u32> {
    if (0x30..=0x39).contains(&u) {
        Some((u - 0x30) as u32)
    } else {
        None
    }
}

/// Reads a run of ASCII digits starting at `i`, returning the parsed value
/// and the index just past the run. Overflow raises [`StringError::Overflow`].
fn read_digits(units: &[u16], mut i: usize) -> Result<(i64, usize), StringError> {
    let start = i;
    let mut value: i64 = 0;
    while i < units.len() {
        match digit(units[i]) {
            Some(d) => {
                value = value.checked_mul(10).and_then(|v| v.checked_add(d as i64)).ok_or(StringError::Overflow)?;
                i += 1;
            }
            None => break,
        }
    }
    debug_assert!(i > start || i == start);
    Ok((value, i))
}

/// Result of parsing one specifier starting at a `%` character.
pub enum ParseOutcome {
    Specifier(Specifier, usize),
    Incomplete(Specifier),
}

/// `parse_spec` (spec §4.8): `start` must index the `%` character. Advances
/// past the full specifier (or to the end of the string on an incomplete
/// trailer) and returns the filled-in [`Specifier`].
pub fn parse_spec(units: &[u16], start: usize) -> Result<ParseOutcome, StringError> {
    debug_assert_eq!(units.get(start).copied(), Some(b'%' as u16));
    let mut i = start + 1;
    let incomplete = |offset: usize, len: usize| {
        let mut s = Specifier::literal(offset, len);
        s.kind = ValueKind::IncompleteSpecifier;
        s
    };
    if i >= units.len() {
        return Ok(ParseOutcome::Incomplete(incomplete(start, i - start)));
    }

    // '%%' is its own literal-percent specifier, never mixed with flags etc.
    if units[i] == b'%' as u16 {
        let mut s = Specifier::literal(start, 2);
        s.flags |= SpecifierFlags::PERCENT_REPLACEMENT;
        return Ok(ParseOutcome::Specifier(s, i + 1));
    }

    // External config-key form: '%[key]@'.
    if units[i] == b'[' as u16 {
        let key_start = i + 1;
        let mut j = key_start;
        while j < units.len() && units[j] != b']' as u16 {
            j += 1;
        }
        if j >= units.len() {
            return Ok(ParseOutcome::Incomplete(incomplete(start, units.len() - start)));
        }
        let key: String = units[key_start..j].iter().map(|&u| u as u8 as char).collect();
        let after_bracket = j + 1;
        if after_bracket >= units.len() {
            return Ok(ParseOutcome::Incomplete(incomplete(start, units.len() - start)));
        }
        if units[after_bracket] != b'@' as u16 {
            return Ok(ParseOutcome::Incomplete(incomplete(start, after_bracket - start)));
        }
        let end = after_bracket + 1;
        let mut s = Specifier::literal(start, end - start);
        s.kind = ValueKind::Object;
        s.flags |= SpecifierFlags::EXTERNAL_SPEC;
        s.config_key = Some(key);
        s.conversion = '@';
        return Ok(ParseOutcome::Specifier(s, end));
    }

    // Main argument position: digit-run immediately followed by '$'.
    let mut arg_pos = ArgPos::Sequential;
    if digit(units[i]).is_some() {
        let (value, after_digits) = read_digits(units, i)?;
        if units.get(after_digits).copied() == Some(b'$' as u16) {
            if value < 1 {
                return Err(StringError::Overflow);
            }
            arg_pos = ArgPos::Explicit(value as usize);
            i = after_digits + 1;
        }
    }

    // Flags.
    let mut flags = SpecifierFlags::empty();
    loop {
        if i >= units.len() {
            return Ok(ParseOutcome::Incomplete(incomplete(start, i - start)));
        }
        let bit = match units[i] as u8 as char {
            '#' => SpecifierFlags::ALTERNATE,
            '-' => SpecifierFlags::LEFT_JUSTIFY,
            '+' => SpecifierFlags::PLUS,
            ' ' => SpecifierFlags::SPACE,
            '0' => SpecifierFlags::ZERO_PAD,
            _ => break,
        };
        flags |= bit;
        i += 1;
    }

    // Width.
    let mut width = None;
    if i < units.len() && digit(units[i]).is_some() {
        let (value, after) = read_digits(units, i)?;
        width = Some(value);
        i = after;
    }
    if i >= units.len() {
        return Ok(ParseOutcome::Incomplete(incomplete(start, i - start)));
    }

    // Precision.
    let mut precision = None;
    if units[i] == b'.' as u16 {
        i += 1;
        if i >= units.len() {
            return Ok(ParseOutcome::Incomplete(incomplete(start, i - start)));
        }
        let (value, after) = read_digits(units, i)?;
        precision = Some(value);
        i = after;
    }
    if i >= units.len() {
        return Ok(ParseOutcome::Incomplete(incomplete(start, i - start)));
    }

    // Length modifier.
    let mut scalar_size = ScalarSize::Four;
    let mut long_double = false;
    loop {
        if i >= units.len() {
            return Ok(ParseOutcome::Incomplete(incomplete(start, i - start)));
        }
        match units[i] as u8 as char {
            'h' => {
                scalar_size = if i + 1 < units.len() && units[i + 1] as u8 as char == 'h' {
                    i += 1;
                    ScalarSize::One
                } else {
                    ScalarSize::Two
                };
                i += 1;
            }
            'l' => {
                scalar_size = if i + 1 < units.len() && units[i + 1] as u8 as char == 'l' {
                    i += 1;
                    ScalarSize::Eight
                } else {
                    ScalarSize::Eight
                };
                i += 1;
            }
            'q' | 'z' => {
                scalar_size = ScalarSize::Eight;
                i += 1;
            }
            'L' => {
                long_double = true;
                scalar_size = ScalarSize::Sixteen;
                i += 1;
            }
            _ => break,
        }
    }
    if i >= units.len() {
        return Ok(ParseOutcome::Incomplete(incomplete(start, i - start)));
    }

    // Conversion.
    let conv = units[i] as u8 as char;
    let (kind, numeric_style, localizable) = match conv {
        'd' | 'i' => (ValueKind::LongInt, Some(NumericStyle::Decimal), true),
        'u' => (ValueKind::LongInt, Some(NumericStyle::Unsigned), true),
        'o' | 'x' | 'X' => (ValueKind::LongInt, Some(NumericStyle::Unsigned), false),
        'e' | 'E' => (ValueKind::Double, Some(NumericStyle::Scientific), true),
        'f' | 'F' => (ValueKind::Double, Some(NumericStyle::Decimal), true),
        'g' | 'G' => (ValueKind::Double, Some(NumericStyle::DecimalOrScientific), true),
        'p' => (ValueKind::Pointer, None, false),
        's' => (ValueKind::CharArray, None, false),
        'S' => (ValueKind::UnicharArray, None, false),
        'c' | 'C' => (ValueKind::SingleUnichar, None, false),
        '@' => (ValueKind::Object, None, false),
        'n' => (ValueKind::DummyPointerForN, None, false),
        _ => {
            // Unknown conversion: the whole run becomes a best-effort
            // incomplete specifier rather than a hard parse error, matching
            // the diagram's "no error" contract for malformed trailers.
            return Ok(ParseOutcome::Incomplete(incomplete(start, i + 1 - start)));
        }
    };
    i += 1;
    if !long_double && matches!(conv, 'e' | 'E' | 'f' | 'F' | 'g' | 'G') {
        scalar_size = ScalarSize::Eight;
    }
    if kind == ValueKind::Pointer {
        scalar_size = ScalarSize::Pointer;
    }

    if localizable {
        flags |= SpecifierFlags::LOCALIZABLE;
    }

    Ok(ParseOutcome::Specifier(
        Specifier {
            source_offset: start,
            source_len: i - start,
            scalar_size,
            kind,
            flags,
            arg_pos,
            width,
            precision,
            numeric_style,
            config_key: None,
            conversion: conv,
        },
        i,
    ))
}

enum Token {
    Literal { offset: usize, len: usize },
    Spec(Specifier),
}

fn tokenize(template: &[u16]) -> Result<Vec<Token>, StringError> {
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut literal_start = 0;
    while i < template.len() {
        if template[i] == b'%' as u16 {
            if i > literal_start {
                tokens.push(Token::Literal { offset: literal_start, len: i - literal_start });
            }
            match parse_spec(template, i)? {
                ParseOutcome::Specifier(spec, next) => {
                    i = next;
                    tokens.push(Token::Spec(spec));
                }
                ParseOutcome::Incomplete(spec) => {
                    let len = spec.source_len;
                    i = template.len();
                    tokens.push(Token::Literal { offset: spec.source_offset, len });
                }
            }
            literal_start = i;
        } else {
            i += 1;
        }
    }
    if template.len() > literal_start {
        tokens.push(Token::Literal { offset: literal_start, len: template.len() - literal_start });
    }
    Ok(tokens)
}

/// Assigns a concrete 1-based argument index to every non-literal
/// specifier: explicit `%N$` specifiers keep their claimed index; plain
/// sequential specifiers consume, in source order, the next index nobody
/// has claimed yet (spec.md §9 resolution 1).
fn bind_argument_indices(tokens: &[Token]) -> Vec<Option<usize>> {
    let mut claimed: HashSet<usize> = HashSet::new();
    for t in tokens {
        if let Token::Spec(s) = t {
            if let ArgPos::Explicit(n) = s.arg_pos {
                claimed.insert(n);
            }
        }
    }
    let mut next_seq = 1usize;
    let mut out = Vec::with_capacity(tokens.len());
    for t in tokens {
        match t {
            Token::Literal { .. } => out.push(None),
            Token::Spec(s) => match s.kind {
                ValueKind::Literal | ValueKind::IncompleteSpecifier => out.push(None),
                _ => match s.arg_pos {
                    ArgPos::Explicit(n) => out.push(Some(n)),
                    ArgPos::Sequential => {
                        while claimed.contains(&next_seq) {
                            next_seq += 1;
                        }
                        out.push(Some(next_seq));
                        claimed.insert(next_seq);
                        next_seq += 1;
                    }
                },
            },
        }
    }
    out
}

#[derive(Debug, Clone)]
pub enum FormatArgument<'a> {
    Int(i64),
    UInt(u64),
    Double(f64),
    Pointer(usize),
    CStr(&'a [u8]),
    UniStr(&'a [u16]),
    Unichar(u16),
    Object(&'a dyn ObjectDescription),
}

/// `%@`'s description collaborator. A contextual implementation can ask for
/// a second pass (spec §4.8's two-pass substitution) by returning `true`
/// from [`wants_context`](ObjectDescription::wants_context); the engine
/// then re-invokes [`describe_with_context`](ObjectDescription::describe_with_context)
/// once the surrounding literal text has been rendered.
pub trait ObjectDescription {
    fn describe(&self) -> String;
    fn wants_context(&self) -> bool {
        false
    }
    fn describe_with_context(&self, _rendered_before: &str, _rendered_after: &str) -> String {
        self.describe()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReplacementValue {
    Int(i64),
    UInt(u64),
    Double(f64),
    Text(String),
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplacementRecord {
    pub spec_offset: usize,
    pub spec_len: usize,
    pub output_offset: usize,
    pub output_len: usize,
    pub arg_index: usize,
    pub value: ReplacementValue,
}

fn push_str_units(out: &mut Vec<u16>, s: &str) {
    out.extend(s.encode_utf16());
}

fn apply_padding(body: String, width: Option<i64>, left_justify: bool, zero_pad: bool) -> String {
    let Some(w) = width else { return body };
    let w = w.max(0) as usize;
    if body.chars().count() >= w {
        return body;
    }
    let pad_len = w - body.chars().count();
    if left_justify {
        let mut s = body;
        s.extend(std::iter::repeat(' ').take(pad_len));
        s
    } else {
        let pad_char = if zero_pad { '0' } else { ' ' };
        if zero_pad && (body.starts_with('-') || body.starts_with('+')) {
            let (sign, rest) = body.split_at(1);
            format!("{sign}{}{rest}", pad_char.to_string().repeat(pad_len))
        } else {
            format!("{}{body}", pad_char.to_string().repeat(pad_len))
        }
    }
}

fn group_integer(digits: &str, sep: char) -> String {
    let mut out = String::new();
    let bytes: Vec<char> = digits.chars().collect();
    for (i, c) in bytes.iter().enumerate() {
        if i != 0 && (bytes.len() - i) % 3 == 0 {
            out.push(sep);
        }
        out.push(*c);
    }
    out
}

fn render_integer(value: i64, spec: &Specifier, locale: Option<&Locale>) -> String {
    let unsigned = matches!(spec.numeric_style, Some(NumericStyle::Unsigned));
    let mut body = if unsigned { (value as u64).to_string() } else { value.unsigned_abs().to_string() };
    if let Some(loc) = locale {
        if spec.flags.contains(SpecifierFlags::LOCALIZABLE) {
            body = group_integer(&body, loc.grouping_separator);
        }
    }
    if let Some(prec) = spec.precision {
        let want = prec.max(0) as usize;
        while body.chars().count() < want {
            body.insert(0, '0');
        }
    }
    let sign = if !unsigned && value < 0 {
        "-"
    } else if spec.flags.contains(SpecifierFlags::PLUS) {
        "+"
    } else if spec.flags.contains(SpecifierFlags::SPACE) {
        " "
    } else {
        ""
    };
    let signed_body = format!("{sign}{body}");
    apply_padding(
        signed_body,
        spec.width,
        spec.flags.contains(SpecifierFlags::LEFT_JUSTIFY),
        spec.flags.contains(SpecifierFlags::ZERO_PAD),
    )
}

fn render_radix_integer(value: i64, conv_is_upper: bool, radix: u32, spec: &Specifier) -> String {
    let unsigned = value as u64;
    let mut body = match radix {
        8 => format!("{unsigned:o}"),
        16 if conv_is_upper => format!("{unsigned:X}"),
        16 => format!("{unsigned:x}"),
        _ => unsigned.to_string(),
    };
    if spec.flags.contains(SpecifierFlags::ALTERNATE) && radix == 16 && unsigned != 0 {
        body = format!("{}{body}", if conv_is_upper { "0X" } else { "0x" });
    }
    apply_padding(
        body,
        spec.width,
        spec.flags.contains(SpecifierFlags::LEFT_JUSTIFY),
        spec.flags.contains(SpecifierFlags::ZERO_PAD),
    )
}

fn render_double(value: f64, spec: &Specifier, locale: Option<&Locale>) -> String {
    let precision = spec.precision.unwrap_or(6).max(0) as usize;
    let mut body = match spec.numeric_style {
        Some(NumericStyle::Scientific) => format!("{value:.precision$e}"),
        Some(NumericStyle::DecimalOrScientific) => {
            let exp = if value == 0.0 { 0 } else { value.abs().log10().floor() as i32 };
            if exp < -4 || exp >= precision.max(1) as i32 {
                format!("{value:.precision$e}")
            } else {
                format!("{value:.precision$}")
            }
        }
        _ => format!("{value:.precision$}"),
    };
    if let Some(loc) = locale {
        if loc.decimal_separator != '.' {
            body = body.replace('.', &loc.decimal_separator.to_string());
        }
        if spec.flags.contains(SpecifierFlags::LOCALIZABLE) && !body.contains('e') {
            if let Some(dot) = body.find(loc.decimal_separator) {
                let (int_part, rest) = body.split_at(dot);
                let (sign, digits) = if let Some(d) = int_part.strip_prefix('-') {
                    ("-", d)
                } else {
                    ("", int_part)
                };
                body = format!("{sign}{}{rest}", group_integer(digits, loc.grouping_separator));
            }
        }
    }
    if spec.flags.contains(SpecifierFlags::PLUS) && value >= 0.0 {
        body = format!("+{body}");
    } else if spec.flags.contains(SpecifierFlags::SPACE) && value >= 0.0 {
        body = format!(" {body}");
    }
    apply_padding(
        body,
        spec.width,
        spec.flags.contains(SpecifierFlags::LEFT_JUSTIFY),
        spec.flags.contains(SpecifierFlags::ZERO_PAD),
    )
}

fn render_c_string(bytes: &[u8], spec: &Specifier) -> String {
    let limit = spec.precision.map(|p| p.max(0) as usize).unwrap_or(bytes.len());
    let end = bytes.iter().position(|&b| b == 0).map(|n| n.min(limit)).unwrap_or_else(|| bytes.len().min(limit));
    let body = String::from_utf8_lossy(&bytes[..end]).into_owned();
    apply_padding(body, spec.width, spec.flags.contains(SpecifierFlags::LEFT_JUSTIFY), false)
}

fn render_unichar_array(units: &[u16], spec: &Specifier) -> String {
    let limit = spec.precision.map(|p| p.max(0) as usize).unwrap_or(units.len());
    let end = units.iter().position(|&u| u == 0).map(|n| n.min(limit)).unwrap_or_else(|| units.len().min(limit));
    let body = String::from_utf16_lossy(&units[..end]);
    apply_padding(body, spec.width, spec.flags.contains(SpecifierFlags::LEFT_JUSTIFY), false)
}

const OBJECT_SENTINEL: char = '\u{FFFC}';

struct PendingObject {
    output_offset: usize,
    placeholder_len: usize,
    arg_index: usize,
    spec_offset: usize,
    spec_len: usize,
}

/// Renders `template` against `args`, returning the UTF-16 output and — when
/// `want_metadata` is set — the replacement records spec §4.8 describes.
pub fn format_with_args(
    template: &[u16],
    args: &[FormatArgument],
    locale: Option<&Locale>,
    want_metadata: bool,
) -> Result<(Vec<u16>, Vec<ReplacementRecord>), StringError> {
    let tokens = tokenize(template);
    let tokens = tokens?;
    let indices = bind_argument_indices(&tokens);

    let mut out: Vec<u16> = Vec::new();
    let mut records = Vec::new();
    let mut pending_objects: Vec<PendingObject> = Vec::new();

    for (token, arg_index) in tokens.iter().zip(indices.iter()) {
        let out_start = out.len();
        match token {
            Token::Literal { offset, len } => {
                out.extend_from_slice(&template[*offset..*offset + *len]);
            }
            Token::Spec(spec) => {
                let idx = arg_index.unwrap_or(0);
                let arg = if idx > 0 { args.get(idx - 1) } else { None };
                let mut record_value = ReplacementValue::None;

                match spec.kind {
                    ValueKind::Literal | ValueKind::IncompleteSpecifier => {
                        if spec.flags.contains(SpecifierFlags::PERCENT_REPLACEMENT) {
                            out.push(b'%' as u16);
                        } else {
                            out.extend_from_slice(&template[spec.source_offset..spec.source_offset + spec.source_len]);
                        }
                    }
                    ValueKind::LongInt => {
                        let v = match arg {
                            Some(FormatArgument::Int(v)) => *v,
                            Some(FormatArgument::UInt(v)) => *v as i64,
                            _ => return Err(StringError::NilArg("format integer argument")),
                        };
                        let rendered = match spec.conversion {
                            'o' => render_radix_integer(v, false, 8, spec),
                            'x' => render_radix_integer(v, false, 16, spec),
                            'X' => render_radix_integer(v, true, 16, spec),
                            _ => render_integer(v, spec, locale),
                        };
                        push_str_units(&mut out, &rendered);
                        record_value = ReplacementValue::Int(v);
                    }
                    ValueKind::Double => {
                        let v = match arg {
                            Some(FormatArgument::Double(v)) => *v,
                            _ => return Err(StringError::NilArg("format double argument")),
                        };
                        let rendered = render_double(v, spec, locale);
                        push_str_units(&mut out, &rendered);
                        record_value = ReplacementValue::Double(v);
                    }
                    ValueKind::Pointer => {
                        let v = match arg {
                            Some(FormatArgument::Pointer(v)) => *v,
                            _ => return Err(StringError::NilArg("format pointer argument")),
                        };
                        push_str_units(&mut out, &format!("0x{v:x}"));
                        record_value = ReplacementValue::UInt(v as u64);
                    }
                    ValueKind::CharArray => {
                        let bytes = match arg {
                            Some(FormatArgument::CStr(b)) => *b,
                            _ => return Err(StringError::NilArg("format C string argument")),
                        };
                        push_str_units(&mut out, &render_c_string(bytes, spec));
                    }
                    ValueKind::UnicharArray => {
                        let units_arg = match arg {
                            Some(FormatArgument::UniStr(u)) => *u,
                            _ => return Err(StringError::NilArg("format unichar array argument")),
                        };
                        push_str_units(&mut out, &render_unichar_array(units_arg, spec));
                    }
                    ValueKind::PascalCharArray => {
                        // Reserved for the external-spec bracket form; no
                        // direct conversion character reaches this kind.
                        return Err(StringError::NilArg("Pascal string format argument"));
                    }
                    ValueKind::SingleUnichar => {
                        let u = match arg {
                            Some(FormatArgument::Unichar(u)) => *u,
                            _ => return Err(StringError::NilArg("format unichar argument")),
                        };
                        out.push(u);
                    }
                    ValueKind::DummyPointerForN => {
                        record_value = ReplacementValue::Int(out.len() as i64);
                    }
                    ValueKind::Object => {
                        let obj = match arg {
                            Some(FormatArgument::Object(o)) => *o,
                            _ => return Err(StringError::NilArg("format object argument")),
                        };
                        if obj.wants_context() {
                            pending_objects.push(PendingObject {
                                output_offset: out.len(),
                                placeholder_len: 1,
                                arg_index: idx,
                                spec_offset: spec.source_offset,
                                spec_len: spec.source_len,
                            });
                            out.push(OBJECT_SENTINEL as u32 as u16);
                            record_value = ReplacementValue::Text(String::new());
                        } else {
                            let description = obj.describe();
                            push_str_units(&mut out, &description);
                            record_value = ReplacementValue::Text(description);
                        }
                    }
                }

                let is_replacement = (spec.kind != ValueKind::Literal && spec.kind != ValueKind::IncompleteSpecifier)
                    || spec.flags.contains(SpecifierFlags::PERCENT_REPLACEMENT);
                if want_metadata && is_replacement {
                    records.push(ReplacementRecord {
                        spec_offset: spec.source_offset,
                        spec_len: spec.source_len,
                        output_offset: out_start,
                        output_len: out.len() - out_start,
                        arg_index: idx,
                        value: record_value,
                    });
                }
            }
        }
    }

    if !pending_objects.is_empty() {
        resolve_pending_objects(&mut out, &mut records, &pending_objects, args, want_metadata);
    }

    Ok((out, records))
}

/// Second pass of `%@`'s two-pass substitution: replaces each sentinel with
/// the object's context-aware description, in reverse output order so
/// earlier splice points stay valid as later ones shift the buffer.
fn resolve_pending_objects(
    out: &mut Vec<u16>,
    records: &mut [ReplacementRecord],
    pending: &[PendingObject],
    args: &[FormatArgument],
    want_metadata: bool,
) {
    for p in pending.iter().rev() {
        let Some(FormatArgument::Object(obj)) = args.get(p.arg_index - 1) else { continue };
        let before = String::from_utf16_lossy(&out[..p.output_offset]);
        let after_start = p.output_offset + p.placeholder_len;
        let after = String::from_utf16_lossy(&out[after_start..]);
        let description = obj.describe_with_context(&before, &after);
        let replacement: Vec<u16> = description.encode_utf16().collect();
        out.splice(p.output_offset..after_start, replacement.iter().copied());

        if want_metadata {
            if let Some(rec) = records.iter_mut().find(|r| r.output_offset == p.output_offset) {
                rec.output_len = replacement.len();
                rec.value = ReplacementValue::Text(description);
            }
        }
    }
}

/// Format validation mode (spec §4.8): every specifier in `untrusted` must
/// match the specifier at the same position in `expected` (type, size,
/// numeric style); `untrusted` may have fewer specifiers than `expected`.
/// Returns the count of specifiers validated.
pub fn validate_format(expected: &[u16], untrusted: &[u16]) -> Result<usize, StringError> {
    let expected_specs = specifiers_only(expected)?;
    let untrusted_specs = specifiers_only(untrusted)?;

    if has_mixed_arg_positions(&untrusted_specs) {
        return Err(StringError::FormatMismatch(
            "untrusted format mixes positional (%N$) and sequential specifiers".to_string(),
        ));
    }

    if untrusted_specs.len() > expected_specs.len() {
        return Err(StringError::FormatMismatch(format!(
            "untrusted format has {} specifier(s), expected allows at most {}",
            untrusted_specs.len(),
            expected_specs.len()
        )));
    }

    for (i, (u, e)) in untrusted_specs.iter().zip(expected_specs.iter()).enumerate() {
        if u.kind != e.kind || u.scalar_size != e.scalar_size || u.numeric_style != e.numeric_style {
            return Err(StringError::FormatMismatch(format!(
                "format does not match expected at specifier {}",
                i + 1
            )));
        }
    }
    Ok(untrusted_specs.len())
}

/// spec.md §9 resolution 1: validation mode rejects a format string that
/// mixes `%N$` positional specifiers with plain sequential ones — rendering
/// mode still resolves the mixture the `printf` way via
/// [`bind_argument_indices`].
fn has_mixed_arg_positions(specs: &[Specifier]) -> bool {
    let has_explicit = specs.iter().any(|s| matches!(s.arg_pos, ArgPos::Explicit(_)));
    let has_sequential = specs.iter().any(|s| matches!(s.arg_pos, ArgPos::Sequential));
    has_explicit && has_sequential
}

fn specifiers_only(template: &[u16]) -> Result<Vec<Specifier>, StringError> {
    Ok(tokenize(template)?
        .into_iter()
        .filter_map(|t| match t {
            Token::Spec(s) if s.kind != ValueKind::Literal && s.kind != ValueKind::IncompleteSpecifier => Some(s),
            _ => None,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }
    fn to_string(u: &[u16]) -> String {
        String::from_utf16_lossy(u)
    }

    #[test]
    fn literal_text_passes_through() {
        let t = units("no specifiers here");
        let (out, _) = format_with_args(&t, &[], None, false).unwrap();
        assert_eq!(to_string(&out), "no specifiers here");
    }

    #[test]
    fn decimal_and_string_specifiers() {
        let t = units("%d apples, %s total");
        let args = [FormatArgument::Int(3), FormatArgument::CStr(b"three")];
        let (out, _) = format_with_args(&t, &args, None, false).unwrap();
        assert_eq!(to_string(&out), "3 apples, three total");
    }

    #[test]
    fn zero_padded_width() {
        let t = units("%05d");
        let args = [FormatArgument::Int(42)];
        let (out, _) = format_with_args(&t, &args, None, false).unwrap();
        assert_eq!(to_string(&out), "00042");
    }

    #[test]
    fn positional_arguments_out_of_order() {
        let t = units("%2$s before %1$s");
        let args = [FormatArgument::CStr(b"first"), FormatArgument::CStr(b"second")];
        let (out, _) = format_with_args(&t, &args, None, false).unwrap();
        assert_eq!(to_string(&out), "second before first");
    }

    #[test]
    fn mixed_positional_and_sequential_consume_remaining_args_in_order() {
        // %1$s claims arg 1; the plain %s then takes the next unclaimed
        // index, which is arg 2 (spec.md §9 resolution 1).
        let t = units("%1$s then %s");
        let args = [FormatArgument::CStr(b"alpha"), FormatArgument::CStr(b"beta")];
        let (out, _) = format_with_args(&t, &args, None, false).unwrap();
        assert_eq!(to_string(&out), "alpha then beta");
    }

    #[test]
    fn percent_literal_is_marked_for_metadata() {
        let t = units("100%% done");
        let (out, records) = format_with_args(&t, &[], None, true).unwrap();
        assert_eq!(to_string(&out), "100% done");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].arg_index, 0);
    }

    #[test]
    fn replacement_metadata_covers_every_non_literal() {
        let t = units("x=%d, y=%d");
        let args = [FormatArgument::Int(1), FormatArgument::Int(2)];
        let (out, records) = format_with_args(&t, &args, None, true).unwrap();
        assert_eq!(to_string(&out), "x=1, y=2");
        assert_eq!(records.len(), 2);
        let total_len: usize = records.iter().map(|r| r.output_len).sum();
        assert!(total_len < out.len());
        assert_eq!(records[0].value, ReplacementValue::Int(1));
        assert_eq!(records[1].value, ReplacementValue::Int(2));
    }

    #[test]
    fn incomplete_specifier_at_end_is_passed_through_literally() {
        let t = units("value: %");
        let (out, _) = format_with_args(&t, &[], None, false).unwrap();
        assert_eq!(to_string(&out), "value: %");
    }

    struct Greeting;
    impl ObjectDescription for Greeting {
        fn describe(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn object_specifier_uses_its_description() {
        let t = units("say %@!");
        let greeting = Greeting;
        let args = [FormatArgument::Object(&greeting)];
        let (out, _) = format_with_args(&t, &args, None, false).unwrap();
        assert_eq!(to_string(&out), "say hello!");
    }

    struct ContextAware;
    impl ObjectDescription for ContextAware {
        fn describe(&self) -> String {
            "<no context>".to_string()
        }
        fn wants_context(&self) -> bool {
            true
        }
        fn describe_with_context(&self, before: &str, _after: &str) -> String {
            format!("[after: {before}]")
        }
    }

    #[test]
    fn context_aware_object_gets_second_pass_substitution() {
        let t = units("prefix %@");
        let ctx = ContextAware;
        let args = [FormatArgument::Object(&ctx)];
        let (out, _) = format_with_args(&t, &args, None, false).unwrap();
        assert_eq!(to_string(&out), "prefix [after: prefix ]");
    }

    #[test]
    fn locale_number_formatting_groups_and_uses_decimal_separator() {
        let t = units("%d");
        let args = [FormatArgument::Int(1234567)];
        let loc = Locale::new("de_DE");
        let (out, _) = format_with_args(&t, &args, Some(&loc), false).unwrap();
        assert_eq!(to_string(&out), "1,234,567");
    }

    #[test]
    fn validate_accepts_fewer_specifiers_than_expected() {
        let expected = units("%s scored %d points");
        let untrusted = units("%s scored well");
        assert_eq!(validate_format(&expected, &untrusted).unwrap(), 1);
    }

    #[test]
    fn validate_rejects_mismatched_specifier_type() {
        let expected = units("%s scored %d points");
        let untrusted = units("%d scored %d points");
        assert!(validate_format(&expected, &untrusted).is_err());
    }

    #[test]
    fn validate_rejects_more_specifiers_than_expected() {
        let expected = units("%s");
        let untrusted = units("%s and %d");
        assert!(validate_format(&expected, &untrusted).is_err());
    }

    #[test]
    fn validate_rejects_mixed_positional_and_sequential_in_untrusted_format() {
        let expected = units("%s and %s");
        let untrusted = units("%1$s and %s");
        assert!(validate_format(&expected, &untrusted).is_err());
    }

    #[test]
    fn rendering_still_permits_mixed_positional_and_sequential() {
        // Rendering mode (not validation) resolves the mixture the printf
        // way instead of rejecting it.
        let t = units("%1$s then %s");
        let args = [FormatArgument::CStr(b"alpha"), FormatArgument::CStr(b"beta")];
        let (out, _) = format_with_args(&t, &args, None, false).unwrap();
        assert_eq!(to_string(&out), "alpha then beta");
    }
}
