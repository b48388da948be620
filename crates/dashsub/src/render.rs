//! printf style rendering of telemetry into subtitle text.
//!
//! Templates reference fields by name, e.g. `%(gx).2f %(v_kmh).0f km/h`. Supported conversions
//! are `f`/`F`, `e`/`E`, `g`/`G`, `d`/`i` and `s`, with the flags `-+ 0#`, a width and a
//! precision. `%%` is a literal percent sign.
use std::collections::HashMap;

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{all_consuming, map, map_res, opt, value},
    multi::many0,
    sequence::{delimited, preceded},
    Finish, IResult,
};

use crate::{message::TelemetryMessage, protocol::record::SubtitleRecord, DSResult, Error};

pub const DEFAULT_TEMPLATE: &str = "%(gx).2f %(gy).2f %(gz).2f %(v_kmh).0f km/h";

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Conversion {
    Fixed,
    Exponent,
    General,
    Integer,
    Str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Flags {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alternate: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct FieldSpec {
    name: String,
    flags: Flags,
    width: Option<usize>,
    precision: Option<usize>,
    conversion: Conversion,
    uppercase: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(FieldSpec),
}

/// Fields available for one render call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldValues(HashMap<&'static str, f64>);

impl FieldValues {
    /// Values of a decoded message. Without a message nothing is available; `v_kmh` falls back
    /// to 0 when the fix has no speed.
    pub fn from_message(msg: Option<&TelemetryMessage>) -> Self {
        let mut values = HashMap::new();
        if let Some(msg) = msg {
            if let Some(g) = msg.gforce {
                values.insert("gx", g.x);
                values.insert("gy", g.y);
                values.insert("gz", g.z);
            }
            values.insert("v_kmh", msg.gps.v_gnd_km_h().unwrap_or(0.0));
        }
        Self(values)
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.0.get(name).copied()
    }

    pub fn insert(&mut self, name: &'static str, v: f64) {
        self.0.insert(name, v);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    segments: Vec<Segment>,
}

impl Template {
    pub fn parse(template: &str) -> DSResult<Self> {
        all_consuming(many0(nom_segment))(template)
            .finish()
            .map(|(_, segments)| Self { segments })
            .map_err(|e: nom::error::Error<&str>| {
                Error::Template(format!("{:?} at {:?}", template, e.input))
            })
    }

    /// Full interpolation, or the empty string if any referenced field is unavailable.
    pub fn render(&self, values: &FieldValues) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(s) => out.push_str(s),
                Segment::Field(spec) => match values.get(&spec.name) {
                    Some(v) => out.push_str(&spec.format(v)),
                    None => return String::new(),
                },
            }
        }
        out
    }

    pub fn render_message(&self, msg: Option<&TelemetryMessage>) -> String {
        self.render(&FieldValues::from_message(msg))
    }

    pub fn render_record(&self, record: &SubtitleRecord<'_>) -> String {
        self.render_message(record.message())
    }
}

impl Default for Template {
    fn default() -> Self {
        Self::parse(DEFAULT_TEMPLATE).unwrap_or(Self {
            segments: Vec::new(),
        })
    }
}

impl FieldSpec {
    fn format(&self, v: f64) -> String {
        let (negative, body) = if !v.is_finite() {
            let body = if v.is_nan() { "nan" } else { "inf" };
            (v.is_sign_negative() && !v.is_nan(), body.to_string())
        } else {
            let a = v.abs();
            match self.conversion {
                Conversion::Fixed => (
                    v.is_sign_negative(),
                    format!("{:.*}", self.precision.unwrap_or(6), a),
                ),
                Conversion::Exponent => (
                    v.is_sign_negative(),
                    c_exponent(&format!("{:.*e}", self.precision.unwrap_or(6), a)),
                ),
                Conversion::General => (v.is_sign_negative(), self.general(a)),
                Conversion::Integer => {
                    let int = v.trunc();
                    let digits = format!("{:.0}", int.abs());
                    let min_digits = self.precision.unwrap_or(0);
                    (int < 0.0, format!("{:0>min_digits$}", digits))
                }
                Conversion::Str => (v.is_sign_negative(), repr(a)),
            }
        };
        let body = if self.uppercase {
            body.to_uppercase()
        } else {
            body
        };

        let sign = if negative {
            "-"
        } else if self.flags.plus && self.conversion != Conversion::Str {
            "+"
        } else if self.flags.space && self.conversion != Conversion::Str {
            " "
        } else {
            ""
        };
        let mut text = format!("{}{}", sign, body);
        if self.conversion == Conversion::Str {
            if let Some(p) = self.precision {
                text = text.chars().take(p).collect();
            }
        }

        let width = self.width.unwrap_or(0);
        let len = text.chars().count();
        if len >= width {
            return text;
        }
        let pad = width - len;
        if self.flags.left {
            format!("{}{}", text, " ".repeat(pad))
        } else if self.flags.zero && v.is_finite() && self.conversion != Conversion::Str {
            format!("{}{}{}", sign, "0".repeat(pad), &text[sign.len()..])
        } else {
            format!("{}{}", " ".repeat(pad), text)
        }
    }

    /// `%g`: exponent form below 1e-4 or from 10^precision on, trailing zeros dropped unless `#`.
    fn general(&self, a: f64) -> String {
        let p = self.precision.unwrap_or(6).max(1);
        let sci = format!("{:.*e}", p - 1, a);
        let x = exponent_of(&sci);
        let s = if (-4..p as i32).contains(&x) {
            format!("{:.*}", (p as i32 - 1 - x) as usize, a)
        } else {
            c_exponent(&sci)
        };
        if self.flags.alternate {
            s
        } else {
            strip_fraction_zeros(&s)
        }
    }
}

/// Shortest round-trip form, switching to exponent form like Python's float repr.
fn repr(a: f64) -> String {
    let x = exponent_of(&format!("{:e}", a));
    if a != 0.0 && !(-4..16).contains(&x) {
        return c_exponent(&format!("{:e}", a));
    }
    let mut s = a.to_string();
    if !s.contains('.') {
        s.push_str(".0");
    }
    s
}

fn exponent_of(sci: &str) -> i32 {
    sci.split_once('e')
        .and_then(|(_, exp)| exp.parse().ok())
        .unwrap_or(0)
}

/// Rust's `1.5e3` to C's `1.5e+03`.
fn c_exponent(sci: &str) -> String {
    match sci.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => sci.to_string(),
    }
}

fn strip_fraction_zeros(s: &str) -> String {
    let (mantissa, exp) = match s.find('e') {
        Some(i) => s.split_at(i),
        None => (s, ""),
    };
    if !mantissa.contains('.') {
        return s.to_string();
    }
    let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
    format!("{}{}", mantissa, exp)
}

fn nom_segment(i: &str) -> IResult<&str, Segment> {
    alt((
        value(Segment::Literal("%".to_string()), tag("%%")),
        map(nom_field, Segment::Field),
        map(is_not("%"), |s: &str| Segment::Literal(s.to_string())),
    ))(i)
}

fn nom_field(i: &str) -> IResult<&str, FieldSpec> {
    let (i, _) = char('%')(i)?;
    let (i, name) = delimited(char('('), is_not(")"), char(')'))(i)?;
    let (i, flags) = nom_flags(i)?;
    let (i, width) = opt(map_res(digit1, |s: &str| s.parse::<usize>()))(i)?;
    let (i, precision) = opt(preceded(
        char('.'),
        map_res(digit0, |s: &str| {
            if s.is_empty() {
                Ok(0)
            } else {
                s.parse::<usize>()
            }
        }),
    ))(i)?;
    let (i, c) = one_of("fFeEgGdis")(i)?;
    let conversion = match c.to_ascii_lowercase() {
        'f' => Conversion::Fixed,
        'e' => Conversion::Exponent,
        'g' => Conversion::General,
        'd' | 'i' => Conversion::Integer,
        _ => Conversion::Str,
    };
    Ok((
        i,
        FieldSpec {
            name: name.to_string(),
            flags,
            width,
            precision,
            conversion,
            uppercase: c.is_ascii_uppercase(),
        },
    ))
}

fn nom_flags(mut i: &str) -> IResult<&str, Flags> {
    let mut flags = Flags::default();
    loop {
        let (rest, flag) = opt(one_of("-+ 0#"))(i)?;
        match flag {
            Some('-') => flags.left = true,
            Some('+') => flags.plus = true,
            Some(' ') => flags.space = true,
            Some('0') => flags.zero = true,
            Some(_) => flags.alternate = true,
            None => return Ok((rest, flags)),
        }
        i = rest;
    }
}
