//! Lexical path helpers. Build files spell paths with `/` on every platform, so these work on
//! `str` rather than `Path` and never touch the filesystem.

use std::path::Path;

pub fn is_absolute(path: &str) -> bool {
    path.starts_with('/') || Path::new(path).is_absolute()
}

/// Collapse `.` components, `name/..` pairs and repeated separators.
///
/// ```
/// use gypsum_util::path::normalize;
/// assert_eq!(normalize("a/./b/../c//d"), "a/c/d");
/// assert_eq!(normalize("../x/../../y"), "../../y");
/// assert_eq!(normalize("a/.."), ".");
/// assert_eq!(normalize("/a/../../b"), "/b");
/// ```
pub fn normalize(path: &str) -> String {
    let absolute = path.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if absolute => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{joined}"),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// Join `path` onto `base`, unless `path` is already absolute.
pub fn join(base: &str, path: &str) -> String {
    if is_absolute(path) || base.is_empty() || base == "." {
        return normalize(path);
    }
    normalize(&format!("{base}/{path}"))
}

/// Express `path` relative to the directory `base`. Both must be relative to the same root (or
/// both absolute).
///
/// ```
/// use gypsum_util::path::relative_to;
/// assert_eq!(relative_to("a/b/c.c", "a"), "b/c.c");
/// assert_eq!(relative_to("x/y.h", "a/b"), "../../x/y.h");
/// assert_eq!(relative_to("a", "a"), ".");
/// assert_eq!(relative_to(".", "a/b"), "../..");
/// ```
pub fn relative_to(path: &str, base: &str) -> String {
    let path = normalize(path);
    let base = normalize(base);
    if base == "." {
        return path;
    }
    let target = if path == "." { "" } else { path.as_str() };
    match pathdiff::diff_paths(target, &base) {
        Some(rel) => {
            let rel = rel.to_string_lossy().replace('\\', "/");
            if rel.is_empty() {
                ".".to_string()
            } else {
                rel
            }
        }
        None => path,
    }
}

pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(0) => "/",
        Some(i) => &path[..i],
        None => "",
    }
}

pub fn basename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Split a basename into its root and extension (without the dot). Dotfiles have no extension.
pub fn split_extension(path: &str) -> (&str, &str) {
    let base = basename(path);
    match base.rfind('.') {
        Some(i) if i > 0 => {
            let cut = path.len() - (base.len() - i);
            (&path[..cut], &path[cut + 1..])
        }
        _ => (path, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn joins() {
        assert_eq!(join("src", "../include/a.h"), "include/a.h");
        assert_eq!(join("", "a.c"), "a.c");
        assert_eq!(join("src", "/usr/include"), "/usr/include");
    }

    #[test]
    fn pieces() {
        assert_eq!(dirname("a/b/c.cc"), "a/b");
        assert_eq!(dirname("c.cc"), "");
        assert_eq!(basename("a/b/c.cc"), "c.cc");
        assert_eq!(split_extension("a/b/c.tar.gz"), ("a/b/c.tar", "gz"));
        assert_eq!(split_extension("a.d/.hidden"), ("a.d/.hidden", ""));
        assert_eq!(split_extension("noext"), ("noext", ""));
    }
}
