//! Static validation of code submissions — phase one of the sandbox.
//!
//! The validator is a pure function over the submission text: it strips
//! string literals and comments with a small scanner, then matches the
//! remaining code against an explicit [`DenyPolicy`]. The policy is plain
//! data, kept separate from the scanning logic so the denied sets can be
//! tightened without touching the scanner.
//!
//! Fail-closed: a denied module import (aliased or not, wherever the
//! statement sits), a reference to a denied built-in (calls and bare
//! aliases alike), any dunder attribute access, or anything the scanner
//! cannot resolve (unterminated strings, f-string interpolations, NUL
//! bytes) rejects the submission. Ambiguity is rejection, never
//! acceptance.

use regex::Regex;
use std::collections::BTreeSet;

/// The denied construct sets. Data only — no scanning logic lives here.
#[derive(Debug, Clone)]
pub struct DenyPolicy {
    /// Module roots whose import is denied.
    pub modules: BTreeSet<String>,

    /// Built-in names whose reference is denied (call or bare alias).
    pub builtins: BTreeSet<String>,
}

impl Default for DenyPolicy {
    fn default() -> Self {
        let modules = [
            // process / OS
            "os", "sys", "subprocess", "shutil", "signal", "resource", "pty", "fcntl",
            "multiprocessing", "threading",
            // network
            "socket", "http", "urllib", "urllib2", "requests", "ftplib", "telnetlib",
            // serialization / reflection escape hatches
            "pickle", "marshal", "shelve", "ctypes", "importlib", "builtins", "code",
            "inspect", "gc",
        ];
        let builtins = [
            "eval",
            "exec",
            "compile",
            "open",
            "input",
            "__import__",
            "getattr",
            "setattr",
            "delattr",
            "globals",
            "locals",
            "vars",
            "breakpoint",
            "memoryview",
        ];
        Self {
            modules: modules.iter().map(|s| s.to_string()).collect(),
            builtins: builtins.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Scans a submission for denied constructs.
pub struct CodeValidator {
    policy: DenyPolicy,
    import_re: Regex,
    from_re: Regex,
    ident_re: Regex,
    dunder_re: Regex,
}

impl CodeValidator {
    pub fn new(policy: DenyPolicy) -> Self {
        Self {
            policy,
            // Import statements start a line or follow a statement
            // separator (`x = 1; import os`, `if True: import os`) —
            // anchoring to line starts alone misses those. The leading
            // group keeps `from x import y` out of the plain-import match.
            import_re: Regex::new(r"(?m)(?:^|[;:])\s*import\s+([^;\n]+)").expect("static regex"),
            from_re: Regex::new(r"(?m)(?:^|[;:])\s*from\s+([A-Za-z_][\w.]*)")
                .expect("static regex"),
            ident_re: Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").expect("static regex"),
            dunder_re: Regex::new(r"__[A-Za-z0-9_]+__").expect("static regex"),
        }
    }

    /// Accept or reject a submission. Pure; never spawns anything.
    ///
    /// Returns every violation found, not just the first, so the model
    /// sees the full list in one observation.
    pub fn validate(&self, code: &str) -> Result<(), Vec<String>> {
        if code.contains('\0') {
            return Err(vec!["NUL byte in submission".into()]);
        }

        let stripped = match strip_strings_and_comments(code) {
            Ok(s) => s,
            // Can't scan it => can't trust it
            Err(reason) => return Err(vec![reason]),
        };

        let mut violations = Vec::new();
        let mut seen = BTreeSet::new();
        let mut push = |v: String| {
            if seen.insert(v.clone()) {
                violations.push(v);
            }
        };

        for caps in self.import_re.captures_iter(&stripped) {
            // `import a.b as x, c` — every comma-separated root counts
            for part in caps[1].split(',') {
                let root = part
                    .split_whitespace()
                    .next()
                    .unwrap_or("")
                    .split('.')
                    .next()
                    .unwrap_or("");
                if self.policy.modules.contains(root) {
                    push(format!("denied import: {root}"));
                }
            }
        }

        for caps in self.from_re.captures_iter(&stripped) {
            let root = caps[1].split('.').next().unwrap_or("");
            if self.policy.modules.contains(root) {
                push(format!("denied import: {root}"));
            }
        }

        // Bare references count too: `f = eval` defeats a call-only check.
        for m in self.ident_re.find_iter(&stripped) {
            if self.policy.builtins.contains(m.as_str()) {
                push(format!("denied builtin: {}", m.as_str()));
            }
        }

        for m in self.dunder_re.find_iter(&stripped) {
            push(format!("denied attribute access: {}", m.as_str()));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(violations)
        }
    }
}

impl Default for CodeValidator {
    fn default() -> Self {
        Self::new(DenyPolicy::default())
    }
}

/// Replace string literal contents and comments with spaces, preserving
/// line structure so the deny scans see only code.
///
/// Handles single/double quotes, triple quotes, and backslash escapes.
/// An unterminated literal is an error, and so is any f-prefixed literal
/// (its interpolations are code) — the scanner refuses to guess.
fn strip_strings_and_comments(code: &str) -> Result<String, String> {
    let chars: Vec<char> = code.chars().collect();
    let mut out = String::with_capacity(code.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '#' {
            // Comment runs to end of line
            while i < chars.len() && chars[i] != '\n' {
                i += 1;
            }
            continue;
        }

        if c == '\'' || c == '"' {
            // An f-prefixed literal embeds executable expressions in its
            // `{...}` interpolations; blanking it like an ordinary string
            // would hide them from the deny scans.
            if has_fstring_prefix(&chars, i) {
                return Err("f-string interpolation cannot be scanned".into());
            }
            let quote = c;
            let triple = i + 2 < chars.len() && chars[i + 1] == quote && chars[i + 2] == quote;
            let delim_len = if triple { 3 } else { 1 };
            i += delim_len;

            let mut closed = false;
            while i < chars.len() {
                if chars[i] == '\\' && !triple {
                    i += 2;
                    continue;
                }
                if chars[i] == quote {
                    if !triple {
                        closed = true;
                        i += 1;
                        break;
                    }
                    if i + 2 < chars.len() && chars[i + 1] == quote && chars[i + 2] == quote {
                        closed = true;
                        i += 3;
                        break;
                    }
                }
                if chars[i] == '\n' {
                    if !triple {
                        // Single-quoted strings don't span lines
                        return Err("unterminated string literal".into());
                    }
                    out.push('\n');
                } else {
                    out.push(' ');
                }
                i += 1;
            }

            if !closed && i >= chars.len() {
                return Err("unterminated string literal".into());
            }
            out.push(' ');
            continue;
        }

        out.push(c);
        i += 1;
    }

    Ok(out)
}

/// Whether the quote at `quote_idx` carries an `f` string prefix
/// (`f"`, `F'`, `rf"`, `fr'`, ...).
///
/// Python string prefixes are at most two letters; a longer identifier
/// run directly before a quote is not a prefix (and not valid Python).
fn has_fstring_prefix(chars: &[char], quote_idx: usize) -> bool {
    let mut start = quote_idx;
    while start > 0 && quote_idx - start < 2 && chars[start - 1].is_ascii_alphabetic() {
        start -= 1;
    }
    if start > 0 {
        let before = chars[start - 1];
        if before.is_alphanumeric() || before == '_' {
            return false;
        }
    }
    chars[start..quote_idx]
        .iter()
        .any(|&c| c == 'f' || c == 'F')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> CodeValidator {
        CodeValidator::default()
    }

    #[test]
    fn plain_computation_accepted() {
        let code = "def fib(n):\n    a, b = 0, 1\n    for _ in range(n):\n        a, b = b, a + b\n    return a\nprint(fib(10))\n";
        assert!(validator().validate(code).is_ok());
    }

    #[test]
    fn denied_import_rejected() {
        let err = validator()
            .validate("import os; os.system(\"ls\")")
            .unwrap_err();
        assert!(err.iter().any(|v| v == "denied import: os"));
    }

    #[test]
    fn aliased_import_rejected() {
        let err = validator().validate("import subprocess as sp").unwrap_err();
        assert!(err.iter().any(|v| v == "denied import: subprocess"));
    }

    #[test]
    fn comma_import_rejected() {
        let err = validator().validate("import math, socket").unwrap_err();
        assert!(err.iter().any(|v| v == "denied import: socket"));
    }

    #[test]
    fn from_import_rejected() {
        let err = validator()
            .validate("from os.path import join")
            .unwrap_err();
        assert!(err.iter().any(|v| v == "denied import: os"));
    }

    #[test]
    fn statement_separated_import_rejected() {
        let err = validator()
            .validate("x = 1; import os\nos.system(\"ls\")")
            .unwrap_err();
        assert!(err.iter().any(|v| v == "denied import: os"));
    }

    #[test]
    fn compound_statement_import_rejected() {
        let err = validator().validate("if True: import socket").unwrap_err();
        assert!(err.iter().any(|v| v == "denied import: socket"));
    }

    #[test]
    fn statement_separated_from_import_rejected() {
        let err = validator()
            .validate("y = 2; from subprocess import run")
            .unwrap_err();
        assert!(err.iter().any(|v| v == "denied import: subprocess"));
    }

    #[test]
    fn fstring_interpolation_rejected_as_unscannable() {
        let err = validator()
            .validate("x = f\"{__import__('os').system('ls')}\"")
            .unwrap_err();
        assert!(err[0].contains("f-string"));
    }

    #[test]
    fn raw_fstring_rejected_as_unscannable() {
        let err = validator().validate("x = rf'{payload}'").unwrap_err();
        assert!(err[0].contains("f-string"));
    }

    #[test]
    fn plain_raw_string_still_accepted() {
        assert!(validator().validate("x = r'\\d+ import os'").is_ok());
    }

    #[test]
    fn eval_call_rejected() {
        let err = validator().validate("eval('1+1')").unwrap_err();
        assert!(err.iter().any(|v| v == "denied builtin: eval"));
    }

    #[test]
    fn bare_alias_of_builtin_rejected() {
        // Indirect reference: binding eval to a new name, calling later
        let err = validator().validate("f = eval\nf('1+1')").unwrap_err();
        assert!(err.iter().any(|v| v == "denied builtin: eval"));
    }

    #[test]
    fn dunder_import_rejected() {
        let err = validator().validate("__import__('os')").unwrap_err();
        assert!(err.iter().any(|v| v.contains("__import__")));
    }

    #[test]
    fn dunder_attribute_access_rejected() {
        let err = validator()
            .validate("().__class__.__bases__[0].__subclasses__()")
            .unwrap_err();
        assert!(err.iter().any(|v| v.contains("__class__")));
    }

    #[test]
    fn open_rejected() {
        let err = validator()
            .validate("data = open('/etc/passwd').read()")
            .unwrap_err();
        assert!(err.iter().any(|v| v == "denied builtin: open"));
    }

    #[test]
    fn denied_name_inside_string_is_fine() {
        let code = "print('you cannot import os from here')";
        assert!(validator().validate(code).is_ok());
    }

    #[test]
    fn denied_name_in_comment_is_fine() {
        let code = "x = 1  # do not import subprocess\nprint(x)";
        assert!(validator().validate(code).is_ok());
    }

    #[test]
    fn triple_quoted_docstring_stripped() {
        let code = "def f():\n    \"\"\"uses eval internally (not really)\"\"\"\n    return 1\n";
        assert!(validator().validate(code).is_ok());
    }

    #[test]
    fn unterminated_string_rejected() {
        let err = validator().validate("x = 'oops").unwrap_err();
        assert!(err[0].contains("unterminated"));
    }

    #[test]
    fn nul_byte_rejected() {
        let err = validator().validate("print(1)\0").unwrap_err();
        assert!(err[0].contains("NUL"));
    }

    #[test]
    fn violations_are_collected_and_deduplicated() {
        let err = validator()
            .validate("import os\nimport os\neval('x')")
            .unwrap_err();
        assert_eq!(
            err.iter().filter(|v| v.as_str() == "denied import: os").count(),
            1
        );
        assert!(err.iter().any(|v| v == "denied builtin: eval"));
    }

    #[test]
    fn identifier_substring_not_confused_with_builtin() {
        // `evaluate` contains `eval` but is a distinct identifier
        let code = "def evaluate(x):\n    return x * 2\nprint(evaluate(3))";
        assert!(validator().validate(code).is_ok());
    }
}
