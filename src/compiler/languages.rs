//! Languages known to the syntax highlighter.

/// Registered language names and aliases
const REGISTERED: &[&str] = &[
    "bash", "sh", "zsh", "shell", "console", "c", "h", "cpp", "cc", "c++", "hpp", "cxx",
    "csharp", "cs", "css", "diff", "patch", "go", "golang", "graphql", "gql", "ini", "toml",
    "java", "javascript", "js", "jsx", "mjs", "cjs", "json", "jsonc", "kotlin", "kt", "less",
    "lua", "makefile", "mk", "markdown", "md", "mdx", "objectivec", "objc", "perl", "pl",
    "php", "plaintext", "text", "txt", "python", "py", "gyp", "r", "ruby", "rb", "rust", "rs",
    "scss", "sql", "swift", "typescript", "ts", "tsx", "mts", "cts", "vbnet", "vb", "wasm",
    "xml", "html", "xhtml", "svg", "yaml", "yml", "dockerfile", "docker", "nginx", "powershell",
    "ps1", "scala", "haskell", "hs", "elixir", "ex", "erlang", "dart", "zig", "nix", "protobuf",
    "proto",
];

/// Whether a fence language can be highlighted (case-insensitive).
pub fn is_registered(language: &str) -> bool {
    let language = language.to_ascii_lowercase();
    REGISTERED.contains(&language.as_str())
}

/// Language named by a fence info string (`rust title="x"` gives `rust`).
pub fn fence_language(info: &str) -> Option<String> {
    info.trim()
        .split(|c: char| c.is_whitespace() || c == ',' || c == '{')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}
