//! Naming utilities - inflection and key naming used when inferring association defaults

use heck::{ToLowerCamelCase, ToSnakeCase};

use crate::config::ForeignKeyConvention;

/// Simple pluralization (English-centric), preserving the case of the stem
pub fn pluralize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.ends_with('y')
        && !lower.ends_with("ay")
        && !lower.ends_with("ey")
        && !lower.ends_with("iy")
        && !lower.ends_with("oy")
        && !lower.ends_with("uy")
    {
        format!("{}ies", &word[..word.len() - 1])
    } else if lower.ends_with('s')
        || lower.ends_with("sh")
        || lower.ends_with("ch")
        || lower.ends_with('x')
        || lower.ends_with('z')
    {
        format!("{}es", word)
    } else {
        format!("{}s", word)
    }
}

/// Simple singularization (English-centric)
pub fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    if lower.ends_with("ies") && word.len() > 3 {
        format!("{}y", &word[..word.len() - 3])
    } else if lower.ends_with("sses")
        || (lower.ends_with("uses") && !lower.ends_with("ouses"))
        || lower.ends_with("ches")
        || lower.ends_with("shes")
        || lower.ends_with("xes")
        || lower.ends_with("zes")
    {
        word[..word.len() - 2].to_string()
    } else if lower.ends_with('s') && !lower.ends_with("ss") && word.len() > 1 {
        word[..word.len() - 1].to_string()
    } else {
        word.to_string()
    }
}

/// Uppercase the first character, leaving the rest untouched
pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Join name parts into a foreign key name following the convention
///
/// `["User", "id"]` becomes `userId` (camel case) or `user_id` (underscore).
pub fn foreign_key_name(parts: &[&str], convention: ForeignKeyConvention) -> String {
    let joined = parts.join("_");
    match convention {
        ForeignKeyConvention::CamelCase => joined.to_lower_camel_case(),
        ForeignKeyConvention::Underscore => joined.to_snake_case(),
    }
}

/// Exposed accessor name for a logical operation, e.g. `get` + `User` = `getUser`
pub fn accessor_name(prefix: &str, name: &str) -> String {
    format!("{}{}", prefix, upper_first(name))
}
