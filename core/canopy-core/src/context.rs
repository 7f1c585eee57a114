//! Project description lookup for prompt context.
//!
//! Sources, first hit wins: `package.json` `description`, `Cargo.toml`
//! `[package].description`, then the first prose paragraph of the README.

use std::path::Path;

const README_NAMES: &[&str] = &["README.md", "README", "readme.md", "README.txt"];

/// Returns a short description of the project rooted at `root`, if any.
pub fn read_project_context(root: &Path) -> Option<String> {
    package_json_description(root)
        .or_else(|| cargo_toml_description(root))
        .or_else(|| readme_first_paragraph(root))
}

fn non_blank(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn package_json_description(root: &Path) -> Option<String> {
    let content = fs_err::read_to_string(root.join("package.json")).ok()?;
    let parsed: serde_json::Value = serde_json::from_str(&content).ok()?;
    parsed.get("description")?.as_str().and_then(non_blank)
}

fn cargo_toml_description(root: &Path) -> Option<String> {
    let content = fs_err::read_to_string(root.join("Cargo.toml")).ok()?;
    let parsed: toml::Value = toml::from_str(&content).ok()?;
    parsed
        .get("package")?
        .get("description")?
        .as_str()
        .and_then(non_blank)
}

fn readme_first_paragraph(root: &Path) -> Option<String> {
    let content = README_NAMES
        .iter()
        .find_map(|name| fs_err::read_to_string(root.join(name)).ok())?;
    first_paragraph(&content)
}

/// First block of consecutive prose lines, skipping headings, badges,
/// HTML and fenced code.
fn first_paragraph(markdown: &str) -> Option<String> {
    let mut in_fence = false;
    let mut paragraph: Vec<&str> = Vec::new();

    for line in markdown.lines() {
        let line = line.trim();
        if line.starts_with("```") || line.starts_with("~~~") {
            in_fence = !in_fence;
            if !paragraph.is_empty() {
                break;
            }
            continue;
        }
        if in_fence {
            continue;
        }

        let is_prose = !line.is_empty()
            && !line.starts_with('#')
            && !line.starts_with('!')
            && !line.starts_with('[')
            && !line.starts_with('<')
            && !line.starts_with('|')
            && !line.starts_with("---")
            && !line.starts_with("===");

        if is_prose {
            paragraph.push(line);
        } else if !paragraph.is_empty() {
            break;
        }
    }

    non_blank(&paragraph.join(" "))
}
