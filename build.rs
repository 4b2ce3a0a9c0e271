use std::fs;

const FONTS: [&str; 8] = [
    "body",
    "title1",
    "title2",
    "title3",
    "headline",
    "subheadline",
    "caption",
    "footnote",
];

fn main() {
    // Validate the bundled style sheet at compile time
    let styles_path = "src/default_styles.toml";
    println!("cargo:rerun-if-changed={}", styles_path);

    let content = fs::read_to_string(styles_path).expect("Failed to read default_styles.toml");

    let table = match content.parse::<toml::Table>() {
        Ok(table) => table,
        Err(e) => panic!("Invalid default_styles.toml: {}", e),
    };

    if !table.contains_key("root") {
        panic!("default_styles.toml has no [root] entry");
    }

    // Mirror the fields `Style` accepts so a bad sheet never reaches the fallback
    for (tag, entry) in &table {
        let Some(entry) = entry.as_table() else {
            panic!("default_styles.toml: `{}` is not a table", tag);
        };
        for (key, value) in entry {
            let ok = match key.as_str() {
                "font" => value.as_str().is_some_and(|font| FONTS.contains(&font)),
                "color" => value.is_str(),
                "bold" | "italic" | "underline" => value.is_bool(),
                _ => false,
            };
            if !ok {
                panic!("default_styles.toml: bad `{}` in [{}]: {}", key, tag, value);
            }
        }
    }
}
