/// Replace `${ENV_VAR}` placeholders in raw config text.
///
/// `${ENV_VAR:-fallback}` yields `fallback` when the variable is unset or
/// empty. Unresolvable variables without a fallback are left as-is so the
/// parser error (if any) points at the original placeholder.
pub fn substitute_env(input: &str) -> String {
    substitute_with(input, |name| std::env::var(name).ok())
}

fn substitute_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            // Unterminated: emit the remainder literally.
            out.push_str(&rest[start..]);
            return out;
        };

        let expr = &after[..end];
        let (name, fallback) = match expr.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (expr, None),
        };

        match (lookup(name).filter(|v| !v.is_empty()), fallback) {
            _ if name.is_empty() => {
                out.push_str("${");
                out.push_str(expr);
                out.push('}');
            },
            (Some(val), _) => out.push_str(&val),
            (None, Some(fallback)) => out.push_str(fallback),
            (None, None) => {
                out.push_str("${");
                out.push_str(expr);
                out.push('}');
            },
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_env(name: &str) -> Option<String> {
        match name {
            "ZAHRA_TOKEN" => Some("s3cret".into()),
            "ZAHRA_EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[test]
    fn substitutes_known_var() {
        assert_eq!(
            substitute_with("api_token = \"${ZAHRA_TOKEN}\"", fake_env),
            "api_token = \"s3cret\""
        );
    }

    #[test]
    fn leaves_unknown_var() {
        assert_eq!(
            substitute_with("${ZAHRA_NONEXISTENT_XYZ}", fake_env),
            "${ZAHRA_NONEXISTENT_XYZ}"
        );
    }

    #[test]
    fn fallback_used_for_unset_or_empty() {
        assert_eq!(substitute_with("${ZAHRA_MISSING:-3000}", fake_env), "3000");
        assert_eq!(substitute_with("${ZAHRA_EMPTY:-x}", fake_env), "x");
        assert_eq!(substitute_with("${ZAHRA_TOKEN:-x}", fake_env), "s3cret");
    }

    #[test]
    fn malformed_placeholders_are_literal() {
        assert_eq!(substitute_with("a ${unterminated", fake_env), "a ${unterminated");
        assert_eq!(substitute_with("${}", fake_env), "${}");
    }

    #[test]
    fn reads_process_env() {
        let Some(path) = std::env::var("PATH").ok().filter(|p| !p.is_empty()) else {
            return;
        };
        assert_eq!(substitute_env("${PATH}"), path);
    }

    #[test]
    fn no_placeholders() {
        assert_eq!(substitute_env("plain text $HOME"), "plain text $HOME");
    }
}
