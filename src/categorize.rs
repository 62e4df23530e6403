//! Partition a fragment's references into web-platform tests, tests, and code.

use serde::Serialize;

use crate::types::Reference;

/// Extensions that make a path containing `test` count as a test file.
const TEST_EXTENSIONS: [&str; 3] = [".html", ".xhtml", ".js"];

/// Path prefix of the imported web-platform-tests suite.
const WPT_PREFIX: &str = "testing/web-platform";

/// Reference category, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Category {
    /// Under `testing/web-platform`.
    WebPlatformTest,
    /// Mochitest-style test files.
    Test,
    /// Everything else.
    Code,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Self; 3] = [Self::WebPlatformTest, Self::Test, Self::Code];

    /// Label shown in overlays.
    pub const fn label(self) -> &'static str {
        return match self {
            Self::WebPlatformTest => "Web-Platform Test",
            Self::Test => "Test",
            Self::Code => "Code",
        };
    }
}

/// References of one fragment split by category. Every category is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CategorizedReferences {
    /// `Category::Code`.
    code: Vec<Reference>,
    /// `Category::Test`.
    tests: Vec<Reference>,
    /// `Category::WebPlatformTest`.
    web_platform_tests: Vec<Reference>,
}

impl CategorizedReferences {
    /// References in one category.
    pub fn get(&self, category: Category) -> &[Reference] {
        return match category {
            Category::WebPlatformTest => &self.web_platform_tests,
            Category::Test => &self.tests,
            Category::Code => &self.code,
        };
    }

    /// Mutable bucket for one category.
    fn bucket_mut(&mut self, category: Category) -> &mut Vec<Reference> {
        return match category {
            Category::WebPlatformTest => &mut self.web_platform_tests,
            Category::Test => &mut self.tests,
            Category::Code => &mut self.code,
        };
    }

    /// Categories with their references, in display order, empty ones included.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[Reference])> {
        return Category::ALL.into_iter().map(|c| return (c, self.get(c)));
    }

    /// Categories that hold at least one reference.
    pub fn non_empty(&self) -> impl Iterator<Item = (Category, &[Reference])> {
        return self.iter().filter(|(_, refs)| return !refs.is_empty());
    }

    /// Total number of references across categories.
    pub fn total(&self) -> usize {
        return self.iter().map(|(_, refs)| return refs.len()).sum();
    }
}

/// Extension of a lower-cased path, with a leading dot.
/// A path without any `.` yields the whole path behind the dot, which never
/// equals a real test extension.
fn extension_of(lower_path: &str) -> String {
    let last = lower_path.rsplit('.').next().unwrap_or(lower_path);
    return format!(".{last}");
}

/// Category for a single file path. First matching rule wins.
pub fn category_for_path(filepath: &str) -> Category {
    let lower = filepath.to_lowercase();
    if lower.starts_with(WPT_PREFIX) {
        return Category::WebPlatformTest;
    }
    if lower.contains("test") && TEST_EXTENSIONS.contains(&extension_of(&lower).as_str()) {
        return Category::Test;
    }
    return Category::Code;
}

/// Assign every reference to exactly one category, keeping input order per category.
pub fn categorize(references: &[Reference]) -> CategorizedReferences {
    let mut out = CategorizedReferences::default();
    for reference in references {
        out.bucket_mut(category_for_path(reference.filepath())).push(reference.clone());
    }
    return out;
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn refs(paths: &[&str]) -> Vec<Reference> {
        paths
            .iter()
            .enumerate()
            .map(|(i, p)| Reference::new("https://a.org/#x", *p, u32::try_from(i + 1).unwrap()).unwrap())
            .collect()
    }

    #[test]
    fn partitions_by_rule() {
        let input = refs(&["testing/web-platform/tests/a.html", "dom/base/test_foo.js", "dom/base/Foo.cpp"]);
        let out = categorize(&input);
        assert_eq!(out.get(Category::WebPlatformTest), &input[0..1]);
        assert_eq!(out.get(Category::Test), &input[1..2]);
        assert_eq!(out.get(Category::Code), &input[2..3]);
    }

    #[rstest]
    #[case("Testing/Web-Platform/meta/x.ini", Category::WebPlatformTest)]
    #[case("dom/tests/mochitest/test_a.XHTML", Category::Test)]
    #[case("dom/Test/helper.html", Category::Test)]
    #[case("dom/tests/test_a.cpp", Category::Code)]
    #[case("dom/base/foo.js", Category::Code)]
    #[case("tests/html", Category::Code)]
    #[case("testjs", Category::Code)]
    fn single_path(#[case] path: &str, #[case] expected: Category) {
        assert_eq!(category_for_path(path), expected);
    }

    #[test]
    fn extension_without_dot_is_whole_path() {
        assert_eq!(extension_of("dom/tests/makefile"), ".dom/tests/makefile");
        assert_eq!(extension_of("a/b.tar.js"), ".js");
    }

    #[test]
    fn output_is_a_permutation_of_input() {
        let input = refs(&[
            "a/test_1.html",
            "testing/web-platform/b.js",
            "c.cpp",
            "a/test_1.html",
            "README",
            "x/tests/y.xhtml",
            "testing/web-platform/z",
        ]);
        let out = categorize(&input);
        assert_eq!(out.total(), input.len());

        let mut flattened: Vec<Reference> = out.iter().flat_map(|(_, r)| r.to_vec()).collect();
        let mut expected = input.clone();
        flattened.sort_by_key(|r| (r.filepath().to_string(), r.line_number()));
        expected.sort_by_key(|r| (r.filepath().to_string(), r.line_number()));
        assert_eq!(flattened, expected);
    }

    #[test]
    fn empty_input_keeps_all_categories() {
        let out = categorize(&[]);
        assert_eq!(out.iter().count(), 3);
        assert_eq!(out.non_empty().count(), 0);
    }
}
