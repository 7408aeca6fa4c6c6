//! A minimal printf-style interpolator (spec.md §9's "numeric printing"
//! design note): just enough of the C conversion grammar to render the
//! templates that survive format-string parsing (`%u`, `%d`, `%x`/`%X`,
//! `%f`/`%e`/`%g`, `%o`, `%c`, `%s`) with width/precision/flags.

#[derive(Debug, Clone, Copy)]
struct Spec {
    left_align: bool,
    zero_pad: bool,
    plus_sign: bool,
    width: Option<usize>,
    precision: Option<usize>,
    conv: char,
}

fn parse_spec(chars: &[char], mut i: usize) -> (Spec, usize) {
    let mut spec = Spec {
        left_align: false,
        zero_pad: false,
        plus_sign: false,
        width: None,
        precision: None,
        conv: 'u',
    };
    while let Some(&c) = chars.get(i) {
        match c {
            '-' => spec.left_align = true,
            '+' => spec.plus_sign = true,
            '0' => spec.zero_pad = true,
            ' ' | '#' => {}
            _ => break,
        }
        i += 1;
    }
    let mut width = String::new();
    while chars.get(i).is_some_and(char::is_ascii_digit) {
        width.push(chars[i]);
        i += 1;
    }
    if !width.is_empty() {
        spec.width = width.parse().ok();
    }
    if chars.get(i) == Some(&'.') {
        i += 1;
        let mut prec = String::new();
        while chars.get(i).is_some_and(char::is_ascii_digit) {
            prec.push(chars[i]);
            i += 1;
        }
        spec.precision = prec.parse().ok().or(Some(0));
    }
    while matches!(chars.get(i), Some('h') | Some('l')) {
        i += 1;
    }
    if let Some(&c) = chars.get(i) {
        spec.conv = c;
        i += 1;
    }
    (spec, i)
}

fn pad(body: String, spec: &Spec) -> String {
    let Some(width) = spec.width else { return body };
    if body.len() >= width {
        return body;
    }
    let fill = width - body.len();
    if spec.left_align {
        format!("{body}{}", " ".repeat(fill))
    } else if spec.zero_pad && !body.starts_with('-') {
        format!("{}{body}", "0".repeat(fill))
    } else if spec.zero_pad {
        format!("-{}{}", "0".repeat(fill), &body[1..])
    } else {
        format!("{}{body}", " ".repeat(fill))
    }
}

/// One value to interpolate into a template.
pub enum Arg<'a> {
    U64(u64),
    I64(i64),
    F64(f64),
    Str(&'a str),
}

/// Render `template`, substituting each `%`-run (other than `%%`) in order
/// with the matching element of `args`.
#[must_use]
pub fn format(template: &str, args: &[Arg]) -> String {
    let chars: Vec<char> = template.chars().collect();
    let mut out = String::new();
    let mut arg_idx = 0usize;
    let mut i = 0usize;
    while i < chars.len() {
        if chars[i] != '%' {
            out.push(chars[i]);
            i += 1;
            continue;
        }
        if chars.get(i + 1) == Some(&'%') {
            out.push('%');
            i += 2;
            continue;
        }
        let (spec, next) = parse_spec(&chars, i + 1);
        i = next;
        let arg = args.get(arg_idx);
        arg_idx += 1;
        let rendered = match (spec.conv, arg) {
            ('u', Some(Arg::U64(v))) => v.to_string(),
            ('d' | 'i', Some(Arg::I64(v))) => {
                if spec.plus_sign && *v >= 0 {
                    format!("+{v}")
                } else {
                    v.to_string()
                }
            }
            ('x', Some(Arg::U64(v))) => format!("{v:x}"),
            ('X', Some(Arg::U64(v))) => format!("{v:X}"),
            ('o', Some(Arg::U64(v))) => format!("{v:o}"),
            ('c', Some(Arg::U64(v))) => char::from_u32(*v as u32).map(String::from).unwrap_or_default(),
            ('f' | 'F', Some(Arg::F64(v))) => format!("{:.*}", spec.precision.unwrap_or(6), v),
            ('e', Some(Arg::F64(v))) => format!("{:.*e}", spec.precision.unwrap_or(6), v),
            ('g' | 'G', Some(Arg::F64(v))) => format!("{v}"),
            ('s', Some(Arg::Str(v))) => match spec.precision {
                Some(p) => v.chars().take(p).collect(),
                None => (*v).to_string(),
            },
            _ => String::new(),
        };
        out.push_str(&pad(rendered, &spec));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_padded_message_number() {
        let rendered = format("%05u", &[Arg::U64(1)]);
        assert_eq!(rendered, "00001");
    }

    #[test]
    fn fixed_precision_float() {
        let rendered = format("%.1f", &[Arg::F64(10.0)]);
        assert_eq!(rendered, "10.0");
    }

    #[test]
    fn literal_percent_is_untouched() {
        assert_eq!(format("100%%", &[]), "100%");
    }
}
