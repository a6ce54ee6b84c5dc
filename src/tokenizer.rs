//! Positional field splitting for access-log lines.
//!
//! ALB log lines are space-delimited, but the request, user-agent and a few
//! trailing fields are double-quoted and may contain embedded spaces. A quoted
//! field is reassembled from its space-separated fragments into one token with
//! the surrounding quotes stripped.

/// Splits one log line into positional fields.
///
/// Splitting happens on single spaces, so consecutive spaces produce empty
/// fields. A fragment that starts with `"` opens an accumulating token that
/// absorbs subsequent fragments (re-joined with single spaces) until a
/// fragment ending in `"` closes it. A fragment that both opens and closes
/// quoting resolves in the same step.
///
/// Never fails: unbalanced quoting leaves the accumulator open through the end
/// of the line, so the trailing token carries the remaining text verbatim with
/// no closing-quote strip.
pub fn split_fields(line: &str) -> Vec<String> {
    let mut fields: Vec<String> = Vec::new();
    let mut quoting = false;

    for fragment in line.split(' ') {
        if quoting {
            let open = fields.pop().unwrap_or_default();
            match fragment.strip_suffix('"') {
                Some(rest) => {
                    quoting = false;
                    fields.push(format!("{open} {rest}"));
                }
                None => {
                    fields.push(format!("{open} {fragment}"));
                }
            }
        } else if let Some(opened) = fragment.strip_prefix('"') {
            quoting = true;
            fields.push(opened.to_string());
            // A lone fragment like `"GET"` closes in the same step; the close
            // check runs against the original fragment so `"` alone also
            // opens and immediately closes as an empty field.
            if fragment.ends_with('"') {
                quoting = false;
                let token = fields.pop().unwrap_or_default();
                let token = token.strip_suffix('"').unwrap_or(token.as_str());
                fields.push(token.to_string());
            }
        } else {
            fields.push(fragment.to_string());
        }
    }

    fields
}
