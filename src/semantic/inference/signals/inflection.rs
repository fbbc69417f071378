//! Shared string inflection utilities.
//!
//! Provides pluralization and singularization for resolving the remainder of
//! a matched column name (`category` from `category_id`) to a table name.
//! Uses the `inflector` crate with additional handling for irregular plurals
//! that show up in database schemas. Only the last `_`-separated segment of a
//! compound name is inflected: `order_item` -> `order_items`.

use inflector::Inflector;

/// Known irregular plurals that inflector doesn't handle well for database contexts.
static IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("leaf", "leaves"),
    ("life", "lives"),
    ("half", "halves"),
    ("shelf", "shelves"),
    ("hero", "heroes"),
    ("analysis", "analyses"),
    ("basis", "bases"),
    ("diagnosis", "diagnoses"),
    ("criterion", "criteria"),
    ("datum", "data"),
    ("medium", "media"),
    ("index", "indices"),
    ("appendix", "appendices"),
    ("matrix", "matrices"),
    ("vertex", "vertices"),
    ("status", "statuses"),
    ("address", "addresses"),
];

/// Words that are the same in singular and plural.
static UNCOUNTABLE: &[&str] = &["series", "species", "equipment", "information", "metadata"];

fn inflect_word(word: &str, to_plural: bool) -> String {
    if word.is_empty() {
        return String::new();
    }

    let lower = word.to_lowercase();
    if UNCOUNTABLE.contains(&lower.as_str()) {
        return lower;
    }

    for (singular, plural) in IRREGULAR_PLURALS {
        if lower == *singular || lower == *plural {
            return if to_plural { plural } else { singular }.to_string();
        }
    }

    if to_plural {
        lower.to_plural()
    } else {
        lower.to_singular()
    }
}

fn inflect_last_segment(name: &str, to_plural: bool) -> String {
    match name.rsplit_once('_') {
        Some((head, last)) if !last.is_empty() => {
            format!("{}_{}", head.to_lowercase(), inflect_word(last, to_plural))
        }
        _ => inflect_word(name, to_plural),
    }
}

/// Pluralize a (possibly compound) name.
///
/// # Examples
/// ```ignore
/// assert_eq!(pluralize("category"), "categories");
/// assert_eq!(pluralize("order_item"), "order_items");
/// assert_eq!(pluralize("person"), "people");
/// ```
pub fn pluralize(name: &str) -> String {
    inflect_last_segment(name, true)
}

/// Singularize a (possibly compound) name.
///
/// # Examples
/// ```ignore
/// assert_eq!(singularize("categories"), "category");
/// assert_eq!(singularize("line_items"), "line_item");
/// assert_eq!(singularize("people"), "person");
/// ```
pub fn singularize(name: &str) -> String {
    inflect_last_segment(name, false)
}

/// Candidate table names for a column-name remainder, with a form factor.
///
/// The plural form comes first with factor 1.0 (tables are conventionally
/// plural); the literal remainder and its singular follow with `literal_factor`.
/// Duplicate forms are removed, keeping the first (highest) factor.
pub fn table_name_forms(remainder: &str, literal_factor: f64) -> Vec<(String, f64)> {
    let remainder = remainder.trim_matches('_').to_lowercase();
    if remainder.is_empty() {
        return Vec::new();
    }

    let mut forms: Vec<(String, f64)> = Vec::with_capacity(3);
    for (form, factor) in [
        (pluralize(&remainder), 1.0),
        (remainder.clone(), literal_factor),
        (singularize(&remainder), literal_factor),
    ] {
        if !form.is_empty() && !forms.iter().any(|(f, _)| *f == form) {
            forms.push((form, factor));
        }
    }
    forms
}
