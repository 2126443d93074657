//! English inflection rules.
//!
//! The repository engine consumes inflection as a set of pure functions:
//! word in, transformed word out. The rules here are the reference
//! English grammar tables; they cover the regular suffix forms plus a
//! small irregular table.

/// Irregular singular/plural pairs checked before the suffix rules.
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("octopus", "octopi"),
    ("movie", "movies"),
    ("news", "news"),
    ("status", "status"),
    ("series", "series"),
];

fn is_vowel(c: char) -> bool {
    matches!(c, 'a' | 'e' | 'i' | 'o' | 'u')
}

/// Converts a singular word to plural form.
pub fn to_plural(word: &str) -> String {
    if let Some((_, plural)) = IRREGULAR.iter().find(|(s, _)| *s == word) {
        return (*plural).to_string();
    }

    let chars: Vec<char> = word.chars().collect();
    let n = chars.len();

    if word.ends_with('x') || word.ends_with("ch") || word.ends_with("ss") || word.ends_with("sh") {
        return format!("{word}es");
    }
    if n >= 2 && chars[n - 1] == 'y' {
        let prev = chars[n - 2];
        let qu = prev == 'u' && n >= 3 && chars[n - 3] == 'q';
        if (!is_vowel(prev) && prev != 'y') || qu {
            return format!("{}ies", &word[..word.len() - 1]);
        }
    }
    if word.ends_with('o') {
        return format!("{word}es");
    }
    if n >= 3 && word.ends_with("fe") && chars[n - 3] != 'f' {
        return format!("{}ves", &word[..word.len() - 2]);
    }
    if word.ends_with("lf") || word.ends_with("rf") {
        return format!("{}ves", &word[..word.len() - 1]);
    }
    if word.ends_with("man") {
        return format!("{}men", &word[..word.len() - 3]);
    }
    format!("{word}s")
}

/// Converts a plural word to singular form.
pub fn to_singular(word: &str) -> String {
    if let Some((singular, _)) = IRREGULAR.iter().find(|(_, p)| *p == word) {
        return (*singular).to_string();
    }

    let chars: Vec<char> = word.chars().collect();
    let n = chars.len();

    if word.ends_with("xes") || word.ends_with("ches") || word.ends_with("sses") || word.ends_with("shes") {
        return word[..word.len() - 2].to_string();
    }
    if n >= 4 && word.ends_with("ies") {
        let prev = chars[n - 4];
        let qu = prev == 'u' && n >= 5 && chars[n - 5] == 'q';
        if (!is_vowel(prev) && prev != 'y') || qu {
            return format!("{}y", &word[..word.len() - 3]);
        }
    }
    if word.ends_with("lves") || word.ends_with("rves") {
        return format!("{}f", &word[..word.len() - 3]);
    }
    if n >= 4 && word.ends_with("ves") && chars[n - 4] != 'f' {
        return format!("{}fe", &word[..word.len() - 3]);
    }
    for stem in ["analy", "ba", "diagno", "parenthe", "progno", "synop", "the"] {
        if word.ends_with(&format!("{stem}ses")) {
            return format!("{}sis", &word[..word.len() - 3]);
        }
    }
    if word.ends_with("ta") || word.ends_with("ia") {
        return format!("{}um", &word[..word.len() - 1]);
    }
    if word.ends_with("men") {
        return format!("{}man", &word[..word.len() - 3]);
    }
    if word.ends_with('s') {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// Converts a snake_case or kebab-case word to a PascalCase identifier.
pub fn to_identifier(word: &str) -> String {
    word.split(['_', '-', ' '])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Converts a camelCase property name to its snake_case column form.
pub fn property_to_column(name: &str) -> String {
    let mut column = String::with_capacity(name.len() + 4);
    for (i, c) in name.chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                column.push('_');
            }
            column.extend(c.to_lowercase());
        } else {
            column.push(c);
        }
    }
    column
}

/// Converts a snake_case column name to its camelCase property form.
pub fn column_to_property(name: &str) -> String {
    let identifier = to_identifier(name);
    let mut chars = identifier.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Derives the table name for a record type: pluralized snake_case.
pub fn table_name(type_name: &str) -> String {
    to_plural(&property_to_column(type_name))
}

/// Derives the foreign-key column for an owner name: snake_case + `_id`.
pub fn foreign_key(name: &str) -> String {
    format!("{}_id", property_to_column(name))
}
