//! English pluralization for collection endpoint names
//!
//! Works on snake_case names: only the last word is inflected, so
//! `project_category` becomes `project_categories`.

/// Nouns whose plural does not follow a suffix rule
const IRREGULAR: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("man", "men"),
    ("woman", "women"),
    ("mouse", "mice"),
    ("goose", "geese"),
    ("foot", "feet"),
    ("tooth", "teeth"),
    ("ox", "oxen"),
    ("criterion", "criteria"),
    ("datum", "data"),
    ("medium", "media"),
    ("index", "indices"),
    ("matrix", "matrices"),
    ("vertex", "vertices"),
    ("analysis", "analyses"),
    ("crisis", "crises"),
    ("thesis", "theses"),
    ("leaf", "leaves"),
    ("chef", "chefs"),
    ("roof", "roofs"),
    ("belief", "beliefs"),
];

/// Nouns with no distinct plural form
const UNCOUNTABLE: &[&str] = &[
    "equipment",
    "information",
    "rice",
    "money",
    "species",
    "series",
    "fish",
    "sheep",
    "deer",
    "news",
    "metadata",
    "feedback",
    "software",
    "hardware",
    "audio",
    "traffic",
];

/// Utility for converting singular nouns to their plural form
pub struct Pluralizer;

impl Pluralizer {
    /// Convert a singular noun to its plural form
    ///
    /// # Examples
    ///
    /// ```
    /// use resource::core::pluralize::Pluralizer;
    ///
    /// assert_eq!(Pluralizer::pluralize("project"), "projects");
    /// assert_eq!(Pluralizer::pluralize("company"), "companies");
    /// assert_eq!(Pluralizer::pluralize("person"), "people");
    /// assert_eq!(Pluralizer::pluralize("blog_post"), "blog_posts");
    /// ```
    pub fn pluralize(singular: &str) -> String {
        if singular.is_empty() {
            return String::new();
        }

        let (head, word) = match singular.rfind('_') {
            Some(pos) => singular.split_at(pos + 1),
            None => ("", singular),
        };

        format!("{}{}", head, Self::pluralize_word(word))
    }

    fn pluralize_word(word: &str) -> String {
        let lower = word.to_lowercase();

        if UNCOUNTABLE.contains(&lower.as_str()) {
            return word.to_string();
        }

        if let Some((_, plural)) = IRREGULAR.iter().find(|(s, _)| *s == lower) {
            return plural.to_string();
        }

        match word {
            // consonant + y -> ies
            s if s.len() > 1
                && s.ends_with('y')
                && !matches!(s.as_bytes()[s.len() - 2], b'a' | b'e' | b'i' | b'o' | b'u') =>
            {
                format!("{}ies", &s[..s.len() - 1])
            }

            // sibilants -> es
            s if s.ends_with('s')
                || s.ends_with("sh")
                || s.ends_with("ch")
                || s.ends_with('x')
                || s.ends_with('z') =>
            {
                format!("{}es", s)
            }

            s if s.ends_with("fe") && s.len() > 2 => format!("{}ves", &s[..s.len() - 2]),

            s if s.ends_with('f') && !s.ends_with("ff") && s.len() > 1 => {
                format!("{}ves", &s[..s.len() - 1])
            }

            // consonant + o -> oes, with the usual exceptions
            s if s.len() > 1 && s.ends_with('o') => {
                let vowel_before = matches!(s.as_bytes()[s.len() - 2], b'a' | b'e' | b'i' | b'o' | b'u');
                match s {
                    _ if vowel_before => format!("{}s", s),
                    "photo" | "piano" | "halo" | "memo" | "logo" | "demo" => format!("{}s", s),
                    _ => format!("{}es", s),
                }
            }

            s => format!("{}s", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pluralize_regular() {
        assert_eq!(Pluralizer::pluralize("project"), "projects");
        assert_eq!(Pluralizer::pluralize("task"), "tasks");
    }

    #[test]
    fn test_pluralize_y_ending() {
        assert_eq!(Pluralizer::pluralize("company"), "companies");
        assert_eq!(Pluralizer::pluralize("category"), "categories");
        assert_eq!(Pluralizer::pluralize("day"), "days");
        assert_eq!(Pluralizer::pluralize("key"), "keys");
    }

    #[test]
    fn test_pluralize_sibilants() {
        assert_eq!(Pluralizer::pluralize("address"), "addresses");
        assert_eq!(Pluralizer::pluralize("box"), "boxes");
        assert_eq!(Pluralizer::pluralize("church"), "churches");
        assert_eq!(Pluralizer::pluralize("dish"), "dishes");
    }

    #[test]
    fn test_pluralize_f_endings() {
        assert_eq!(Pluralizer::pluralize("knife"), "knives");
        assert_eq!(Pluralizer::pluralize("wolf"), "wolves");
        assert_eq!(Pluralizer::pluralize("staff"), "staffs");
        assert_eq!(Pluralizer::pluralize("chef"), "chefs");
    }

    #[test]
    fn test_pluralize_o_endings() {
        assert_eq!(Pluralizer::pluralize("hero"), "heroes");
        assert_eq!(Pluralizer::pluralize("photo"), "photos");
        assert_eq!(Pluralizer::pluralize("video"), "videos");
    }

    #[test]
    fn test_irregular_and_uncountable() {
        assert_eq!(Pluralizer::pluralize("person"), "people");
        assert_eq!(Pluralizer::pluralize("child"), "children");
        assert_eq!(Pluralizer::pluralize("equipment"), "equipment");
        assert_eq!(Pluralizer::pluralize("news"), "news");
    }

    #[test]
    fn test_only_last_word_inflected() {
        assert_eq!(Pluralizer::pluralize("blog_post"), "blog_posts");
        assert_eq!(Pluralizer::pluralize("sales_person"), "sales_people");
        assert_eq!(Pluralizer::pluralize("project_category"), "project_categories");
    }

    #[test]
    fn test_pluralize_empty_string() {
        assert_eq!(Pluralizer::pluralize(""), "");
    }
}
