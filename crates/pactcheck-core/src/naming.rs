//! Identifier casing helpers used by model pairing and naming rules.

/// Casing convention of a single identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Convention {
    Snake,
    Camel,
    /// Single lowercase word, PascalCase, SCREAMING_CASE and the like.
    Neutral,
}

pub fn convention(ident: &str) -> Convention {
    let has_upper = ident.chars().any(|ch| ch.is_ascii_uppercase());
    let has_lower = ident.chars().any(|ch| ch.is_ascii_lowercase());
    let has_underscore = ident.trim_matches('_').contains('_');
    let starts_lower = ident
        .chars()
        .next()
        .map(|ch| ch.is_ascii_lowercase())
        .unwrap_or(false);

    if has_underscore && !has_upper {
        Convention::Snake
    } else if !has_underscore && starts_lower && has_upper && has_lower {
        Convention::Camel
    } else {
        Convention::Neutral
    }
}

pub fn snake_to_camel(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len());
    let mut upper_next = false;
    for (idx, ch) in ident.chars().enumerate() {
        if ch == '_' && idx > 0 {
            upper_next = true;
        } else if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}

pub fn camel_to_snake(ident: &str) -> String {
    let mut out = String::with_capacity(ident.len() + 4);
    for (idx, ch) in ident.chars().enumerate() {
        if ch.is_ascii_uppercase() {
            if idx > 0 {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

/// True when two identifiers spell the same words in different casing,
/// e.g. `user_id` and `userId`.
pub fn differs_only_in_casing(left: &str, right: &str) -> bool {
    left != right && fold(left) == fold(right)
}

fn fold(ident: &str) -> String {
    ident
        .chars()
        .filter(|ch| *ch != '_')
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

/// Naive English singular of a table name segment.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{stem}y");
    }
    if let Some(stem) = word.strip_suffix("yses") {
        return format!("{stem}ysis");
    }
    for suffix in ["sses", "shes", "ches", "xes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") || word.ends_with("is") {
        return word.to_string();
    }
    word.strip_suffix('s').unwrap_or(word).to_string()
}

/// Type name a row of `table` would conventionally be declared as,
/// e.g. `cv_analyses` -> `CvAnalysis`.
pub fn table_type_name(table: &str) -> String {
    let parts: Vec<&str> = table.split('_').filter(|part| !part.is_empty()).collect();
    let last = parts.len().saturating_sub(1);
    parts
        .iter()
        .enumerate()
        .map(|(idx, part)| {
            let word = if idx == last {
                singularize(part)
            } else {
                (*part).to_string()
            };
            capitalize(&word)
        })
        .collect()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}
