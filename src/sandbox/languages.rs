/// Sandbox language id used when the requested language is unknown (Python 3)
pub const FALLBACK_LANGUAGE_ID: u32 = 71;

/// Map an editor language name to the sandbox's language id
pub fn language_id(name: &str) -> u32 {
    match name.trim().to_ascii_lowercase().as_str() {
        "python" | "python3" | "py" => 71,
        "javascript" | "js" | "node" => 63,
        "java" => 62,
        "cpp" | "c++" | "cxx" => 54,
        "c" => 50,
        "csharp" | "c#" | "cs" => 51,
        "go" | "golang" => 60,
        "rust" | "rs" => 73,
        "typescript" | "ts" => 74,
        _ => FALLBACK_LANGUAGE_ID,
    }
}
