//! Directive recognition (spec.md §4.2): classifies the keyword prefix of
//! a trimmed, `//`-stripped line.

#[derive(Debug, Clone)]
pub enum Directive {
    Msg { k: u8, name: String },
    ExtMsg { k: u8, b: u8, name: String },
    MsgN { len_words: Option<u32>, name: String },
    MsgX { name: String },
    Filter { name: String, description: Option<String> },
    Memo { name: String, init: Option<f64> },
    InFile { name: String, path: String },
    OutFile {
        name: String,
        path: String,
        mode: String,
        initial_text: Option<String>,
    },
    Include { path: String },
    FmtAlign(u32),
    FmtStart(u32),
    SelectInFile(String),
    SelectOutFile { name: String, also_main_log: bool },
    FormatString(String),
}

fn strip_quotes(s: &str) -> &str {
    s.trim().trim_matches('"')
}

fn parse_call(rest: &str) -> Vec<String> {
    // rest is the text between the directive name and its trailing `)`,
    // e.g. `F_name,"desc"` -> ["F_name", "desc"].
    let inner = rest.trim_start_matches('(').trim_end_matches(')');
    let mut args = Vec::new();
    let mut cur = String::new();
    let mut in_quotes = false;
    for c in inner.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                args.push(cur.trim().trim_matches('"').to_string());
                cur.clear();
            }
            _ => cur.push(c),
        }
    }
    if !cur.trim().is_empty() {
        args.push(cur.trim().trim_matches('"').to_string());
    }
    args
}

/// Classify a single directive/format-string line. `line` has already had
/// its `//` prefix stripped and been trimmed.
#[must_use]
pub fn parse_directive(line: &str) -> Option<Directive> {
    if line.starts_with('"') {
        return Some(Directive::FormatString(strip_quotes(line).replace("\\n", "\n").replace("\\t", "\t")));
    }
    if let Some(rest) = line.strip_prefix(">>") {
        return Some(Directive::SelectOutFile {
            name: rest.trim().to_string(),
            also_main_log: true,
        });
    }
    if let Some(rest) = line.strip_prefix('>') {
        return Some(Directive::SelectOutFile {
            name: rest.trim().to_string(),
            also_main_log: false,
        });
    }
    if let Some(rest) = line.strip_prefix('<') {
        return Some(Directive::SelectInFile(rest.trim().to_string()));
    }
    if let Some(rest) = line.strip_prefix("MSGX_") {
        return Some(Directive::MsgX {
            name: rest.split('(').next().unwrap_or(rest).trim().to_string(),
        });
    }
    if let Some(rest) = line.strip_prefix("MSGN_") {
        // MSGN_<n>_NAME or MSGN_NAME
        let head = rest.split('(').next().unwrap_or(rest).trim();
        if let Some((n, name)) = head.split_once('_') {
            if let Ok(words) = n.parse::<u32>() {
                return Some(Directive::MsgN {
                    len_words: Some(words),
                    name: name.to_string(),
                });
            }
        }
        return Some(Directive::MsgN {
            len_words: None,
            name: head.to_string(),
        });
    }
    if let Some(rest) = line.strip_prefix("MSG") {
        if let Some(rest) = rest.strip_prefix("FILTER") {
            let _ = rest;
        }
        let mut chars = rest.chars();
        if let Some(k_char) = chars.next() {
            if let Some(k) = k_char.to_digit(10) {
                let tail = chars.as_str();
                if let Some(name) = tail.strip_prefix("_NAME").or_else(|| tail.strip_prefix('_')) {
                    let _ = name;
                }
                if let Some(pos) = tail.find('_') {
                    let name = tail[pos + 1..].split('(').next().unwrap_or("").trim().to_string();
                    return Some(Directive::Msg {
                        k: k as u8,
                        name,
                    });
                }
            }
        }
    }
    if let Some(rest) = line.strip_prefix("EXT_MSG") {
        // EXT_MSG<k>_<b>_NAME
        let mut it = rest.splitn(2, '_');
        let kb = it.next().unwrap_or("");
        let name_part = it.next().unwrap_or("");
        if kb.len() >= 1 {
            if let Ok(k) = kb[..1].parse::<u8>() {
                if let Some((b_str, name)) = name_part.split_once('_') {
                    if let Ok(b) = b_str.parse::<u8>() {
                        return Some(Directive::ExtMsg {
                            k,
                            b,
                            name: name.split('(').next().unwrap_or("").trim().to_string(),
                        });
                    }
                }
            }
        }
    }
    if let Some(rest) = line.strip_prefix("FILTER(") {
        let args = parse_call(rest);
        return Some(Directive::Filter {
            name: args.first().cloned().unwrap_or_default(),
            description: args.get(1).cloned(),
        });
    }
    if let Some(rest) = line.strip_prefix("MEMO(") {
        let args = parse_call(rest);
        return Some(Directive::Memo {
            name: args.first().cloned().unwrap_or_default(),
            init: args.get(1).and_then(|s| s.parse().ok()),
        });
    }
    if let Some(rest) = line.strip_prefix("IN_FILE(") {
        let args = parse_call(rest);
        return Some(Directive::InFile {
            name: args.first().cloned().unwrap_or_default(),
            path: args.get(1).cloned().unwrap_or_default(),
        });
    }
    if let Some(rest) = line.strip_prefix("OUT_FILE(") {
        let args = parse_call(rest);
        return Some(Directive::OutFile {
            name: args.first().cloned().unwrap_or_default(),
            path: args.get(1).cloned().unwrap_or_default(),
            mode: args.get(2).cloned().unwrap_or_else(|| "w".to_string()),
            initial_text: args.get(3).cloned(),
        });
    }
    if let Some(rest) = line.strip_prefix("INCLUDE(") {
        let args = parse_call(rest);
        return Some(Directive::Include {
            path: args.first().cloned().unwrap_or_default(),
        });
    }
    if let Some(rest) = line.strip_prefix("FMT_ALIGN(") {
        let args = parse_call(rest);
        return args.first().and_then(|s| s.parse().ok()).map(Directive::FmtAlign);
    }
    if let Some(rest) = line.strip_prefix("FMT_START(") {
        let args = parse_call(rest);
        return args.first().and_then(|s| s.parse().ok()).map(Directive::FmtStart);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn msg0_name_directive() {
        match parse_directive("MSG0_HELLO").unwrap() {
            Directive::Msg { k, name } => {
                assert_eq!(k, 0);
                assert_eq!(name, "HELLO");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn msgx_directive() {
        match parse_directive("MSGX_LOG").unwrap() {
            Directive::MsgX { name } => assert_eq!(name, "LOG"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn filter_directive_with_description() {
        match parse_directive("FILTER(F_ADC,\"adc samples\")").unwrap() {
            Directive::Filter { name, description } => {
                assert_eq!(name, "F_ADC");
                assert_eq!(description.as_deref(), Some("adc samples"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn select_out_file_with_main_log_mirror() {
        match parse_directive(">>LOG").unwrap() {
            Directive::SelectOutFile { name, also_main_log } => {
                assert_eq!(name, "LOG");
                assert!(also_main_log);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn format_string_directive_unescapes_newline() {
        match parse_directive("\"hello\\n\"").unwrap() {
            Directive::FormatString(s) => assert_eq!(s, "hello\n"),
            other => panic!("unexpected {other:?}"),
        }
    }
}
