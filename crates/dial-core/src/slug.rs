//! URL slug derivation for suggestion rows.
//!
//! Deterministic and pure: the same name always yields the same slug, so
//! re-submitting a suggestion never mints a second identity.

/// Derive a slug from a display name: lower-cased, diacritics folded to
/// ASCII, runs of anything non-alphanumeric collapsed to single hyphens,
/// leading and trailing hyphens trimmed.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut gap = false;

    for c in name.chars() {
        match c {
            'ß' | 'ẞ' => push_folded(&mut slug, &mut gap, "ss"),
            'æ' | 'Æ' => push_folded(&mut slug, &mut gap, "ae"),
            'œ' | 'Œ' => push_folded(&mut slug, &mut gap, "oe"),
            _ => match fold_char(c) {
                Some(f) => {
                    if gap && !slug.is_empty() {
                        slug.push('-');
                    }
                    gap = false;
                    slug.push(f);
                }
                None => gap = true,
            },
        }
    }

    slug
}

fn push_folded(slug: &mut String, gap: &mut bool, folded: &str) {
    if *gap && !slug.is_empty() {
        slug.push('-');
    }
    *gap = false;
    slug.push_str(folded);
}

/// Fold one character to its lowercase ASCII base, or `None` when it has
/// no alphanumeric rendering and acts as a separator.
fn fold_char(c: char) -> Option<char> {
    if c.is_ascii_alphanumeric() {
        return Some(c.to_ascii_lowercase());
    }
    let folded = match c {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
        'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' | 'Ā' | 'Ă' | 'Ą' => 'a',
        'ç' | 'ć' | 'č' | 'Ç' | 'Ć' | 'Č' => 'c',
        'ď' | 'đ' | 'Ď' | 'Đ' => 'd',
        'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ě' | 'ę' => 'e',
        'È' | 'É' | 'Ê' | 'Ë' | 'Ē' | 'Ė' | 'Ě' | 'Ę' => 'e',
        'ğ' | 'Ğ' => 'g',
        'ì' | 'í' | 'î' | 'ï' | 'ī' | 'ı' | 'Ì' | 'Í' | 'Î' | 'Ï' | 'Ī' | 'İ' => 'i',
        'ł' | 'Ł' => 'l',
        'ñ' | 'ń' | 'ň' | 'Ñ' | 'Ń' | 'Ň' => 'n',
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
        'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' | 'Ø' | 'Ō' | 'Ő' => 'o',
        'ř' | 'Ř' => 'r',
        'ś' | 'š' | 'ş' | 'ș' | 'Ś' | 'Š' | 'Ş' | 'Ș' => 's',
        'ť' | 'ț' | 'ţ' | 'Ť' | 'Ț' | 'Ţ' => 't',
        'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => 'u',
        'Ù' | 'Ú' | 'Û' | 'Ü' | 'Ū' | 'Ů' | 'Ű' => 'u',
        'ý' | 'ÿ' | 'Ý' | 'Ÿ' => 'y',
        'ź' | 'ž' | 'ż' | 'Ź' | 'Ž' | 'Ż' => 'z',
        _ => return None,
    };
    Some(folded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_name() {
        assert_eq!(slugify("Radio Okapi!"), "radio-okapi");
    }

    #[test]
    fn test_diacritics_folded() {
        assert_eq!(slugify("Télé-Congo 2000"), "tele-congo-2000");
    }

    #[test]
    fn test_punctuation_runs_collapse() {
        assert_eq!(slugify("Jazz...& Blues   FM"), "jazz-blues-fm");
    }

    #[test]
    fn test_edges_trimmed() {
        assert_eq!(slugify("  --Radio One-- "), "radio-one");
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(slugify("Ondes Fève"), slugify("Ondes Fève"));
    }

    #[test]
    fn test_multichar_folds() {
        assert_eq!(slugify("Straße FM"), "strasse-fm");
        assert_eq!(slugify("Œuvre Radio"), "oeuvre-radio");
    }

    #[test]
    fn test_unfoldable_chars_become_separators() {
        assert_eq!(slugify("東京 Radio"), "radio");
        assert_eq!(slugify("日本"), "");
    }

    #[test]
    fn test_already_slug_shaped() {
        assert_eq!(slugify("radio-okapi"), "radio-okapi");
    }
}
