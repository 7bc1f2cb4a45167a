use keel_config::FileFormat;
use keel_core::{MigrationError, Version};

const PATH_UNSAFE: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Reject names that are blank or could escape the migrations directory.
pub fn validate_name(name: &str) -> Result<(), MigrationError> {
    if name.trim().is_empty() {
        return Err(MigrationError::invalid_name(name, "name cannot be empty"));
    }
    if name.contains("..") {
        return Err(MigrationError::invalid_name(name, "name cannot contain '..'"));
    }
    if let Some(ch) = name
        .chars()
        .find(|ch| PATH_UNSAFE.contains(ch) || ch.is_control())
    {
        return Err(MigrationError::invalid_name(
            name,
            format!("name contains path-unsafe character {ch:?}"),
        ));
    }
    Ok(())
}

/// Validate `name` and turn it into a lowercase slug for the filename.
pub fn sanitize_name(name: &str) -> Result<String, MigrationError> {
    validate_name(name)?;
    let slug = name
        .to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() || ch == ' ' { ch } else { '_' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        return Err(MigrationError::invalid_name(
            name,
            "name has no letters or digits",
        ));
    }
    Ok(slug)
}

/// Generate a migration filename from version and slug with format and pattern.
pub fn migration_filename(
    version: Version,
    slug: &str,
    format: FileFormat,
    pattern: &str,
) -> String {
    let name = render_migration_name(pattern, version, slug);
    format!("{name}.{}", format.extension())
}

/// Leading version digits of a migration file stem.
pub(crate) fn parse_version(stem: &str) -> Option<Version> {
    let digits: String = stem.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Stem with the leading version and separator removed.
pub(crate) fn name_from_stem(stem: &str) -> String {
    let rest = stem
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_start_matches(['_', '-', '.']);
    if rest.is_empty() {
        stem.to_string()
    } else {
        rest.to_string()
    }
}

fn render_migration_name(pattern: &str, version: Version, slug: &str) -> String {
    let default_version = format!("{:04}", version);
    let chars: Vec<char> = pattern.chars().collect();
    let mut i = 0;
    let mut out = String::new();

    while i < chars.len() {
        if chars[i] == '%' && i + 1 < chars.len() {
            // %v, %m, and %0Nv (width-padded).
            let next = chars[i + 1];
            if next == 'v' {
                out.push_str(&version.to_string());
                i += 2;
                continue;
            } else if next == 'm' {
                out.push_str(slug);
                i += 2;
                continue;
            } else if next == '0' {
                let mut j = i + 2;
                let mut width = String::new();
                while j < chars.len() && chars[j].is_ascii_digit() {
                    width.push(chars[j]);
                    j += 1;
                }
                if j < chars.len() && chars[j] == 'v' {
                    let w: usize = width.parse().unwrap_or(0);
                    if w == 0 {
                        out.push_str(&default_version);
                    } else {
                        out.push_str(&format!("{:0width$}", version, width = w));
                    }
                    i = j + 1;
                    continue;
                }
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    let mut name = out;

    // Trim redundant trailing separators.
    while name.ends_with('_') || name.ends_with('-') || name.ends_with('.') {
        name.pop();
    }

    if name.is_empty() { default_version } else { name }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::default_pattern("%04v_%m", 1, "create_users", FileFormat::Json, "0001_create_users.json")]
    #[case::plain_version("%v_%m", 12, "add_email", FileFormat::Sql, "12_add_email.sql")]
    #[case::wide("%06v-%m", 7, "x", FileFormat::Yaml, "000007-x.yaml")]
    #[case::zero_width("%00v_%m", 3, "y", FileFormat::Yml, "0003_y.yml")]
    #[case::literal_text("%04v_%m_migration", 2, "z", FileFormat::Json, "0002_z_migration.json")]
    fn filenames(
        #[case] pattern: &str,
        #[case] version: Version,
        #[case] slug: &str,
        #[case] format: FileFormat,
        #[case] expected: &str,
    ) {
        assert_eq!(migration_filename(version, slug, format, pattern), expected);
    }

    #[rstest]
    #[case("Create Users", "create_users")]
    #[case("  add   email column ", "add_email_column")]
    #[case("drop-legacy.table", "drop_legacy_table")]
    #[case("v2", "v2")]
    fn sanitize_produces_slug(#[case] name: &str, #[case] expected: &str) {
        assert_eq!(sanitize_name(name).unwrap(), expected);
    }

    #[rstest]
    #[case::empty("")]
    #[case::blank("   ")]
    #[case::slash("users/admins")]
    #[case::backslash("users\\admins")]
    #[case::parent("..")]
    #[case::traversal("../../etc")]
    #[case::colon("c:drive")]
    #[case::newline("a\nb")]
    #[case::only_symbols("!!!")]
    fn invalid_names(#[case] name: &str) {
        let err = sanitize_name(name).unwrap_err();
        assert!(matches!(err, MigrationError::InvalidName { .. }), "{name:?}");
    }

    #[rstest]
    #[case("0001_create_users", Some(1), "create_users")]
    #[case("12-add_email", Some(12), "add_email")]
    #[case("0042", Some(42), "0042")]
    #[case("create_users", None, "create_users")]
    fn stem_parsing(#[case] stem: &str, #[case] version: Option<Version>, #[case] name: &str) {
        assert_eq!(parse_version(stem), version);
        assert_eq!(name_from_stem(stem), name);
    }
}
