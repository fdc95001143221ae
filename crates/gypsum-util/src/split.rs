use regex::{Captures, Regex};

pub fn split_filter_empty<'a>(input: &'a str, separator: &'a str) -> impl Iterator<Item = &'a str> {
    input.split(separator).filter(|v| !v.is_empty())
}

/// Split `NAME=VALUE` into its two halves. A bare `NAME` yields `None` for the value.
///
/// ```
/// use gypsum_util::split::split_assignment;
/// assert_eq!(split_assignment("OS=linux"), ("OS", Some("linux")));
/// assert_eq!(split_assignment("a=b=c"), ("a", Some("b=c")));
/// assert_eq!(split_assignment("flag"), ("flag", None));
/// ```
pub fn split_assignment(input: &str) -> (&str, Option<&str>) {
    match input.split_once('=') {
        Some((name, value)) => (name, Some(value)),
        None => (input, None),
    }
}

/// Like `Regex::replace_all`, but the replacement closure may fail.
// From https://docs.rs/regex/latest/regex/struct.Regex.html#method.replace_all
pub fn replace_all<E>(
    re: &Regex,
    haystack: &str,
    mut replacement: impl FnMut(&Captures) -> Result<String, E>,
) -> Result<String, E> {
    let mut new = String::with_capacity(haystack.len());
    let mut last_match = 0;
    for caps in re.captures_iter(haystack) {
        let Some(m) = caps.get(0) else {
            continue;
        };
        new.push_str(&haystack[last_match..m.start()]);
        new.push_str(&replacement(&caps)?);
        last_match = m.end();
    }
    new.push_str(&haystack[last_match..]);
    Ok(new)
}

/// Is `input` an integer in its canonical spelling (no sign on zero, no leading zeros)?
pub fn is_canonical_int(input: &str) -> bool {
    let digits = input.strip_prefix('-').unwrap_or(input);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    if digits == "0" {
        return input == "0";
    }
    !digits.starts_with('0')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn canonical_ints() {
        for ok in ["0", "1", "-1", "42", "-100"] {
            assert!(is_canonical_int(ok), "{ok}");
        }
        for bad in ["", "-", "-0", "01", "1.0", "0x10", " 1", "+1"] {
            assert!(!is_canonical_int(bad), "{bad}");
        }
    }

    #[test]
    fn fallible_replace() {
        let re = Regex::new(r"\$(\w+)").unwrap();
        let out: Result<String, String> = replace_all(&re, "a $b c $d", |caps| {
            Ok(caps[1].to_uppercase())
        });
        assert_eq!(out.unwrap(), "a B c D");

        let out: Result<String, String> =
            replace_all(&re, "a $b c $d", |caps| Err(caps[1].to_string()));
        assert_eq!(out.unwrap_err(), "b");
    }

    #[test]
    fn filter_empty() {
        let parts: Vec<_> = split_filter_empty(",ninja,,make,", ",").collect();
        assert_eq!(parts, vec!["ninja", "make"]);
    }
}
