//! Whisper model size selection and on-disk resolution.
//!
//! Users pick a model by size name (`small`, `base.en`, `large-v3-turbo`, …) and we
//! resolve it to a GGML file inside the models directory, following whisper.cpp's
//! `ggml-<size>.bin` naming. An explicit path is accepted verbatim for models living
//! elsewhere.

use std::path::{Path, PathBuf};

/// Environment variable overriding the models directory.
pub const MODEL_DIR_ENV: &str = "SYSCRIBE_MODEL_DIR";

/// Default models directory, relative to the working directory.
pub const DEFAULT_MODEL_DIR: &str = "./models";

/// Model size names we know how to resolve.
///
/// Matches the whisper.cpp GGML artifact names; the downloader binary shares this
/// allowlist.
pub const MODEL_SIZES: &[&str] = &[
    "tiny",
    "tiny.en",
    "base",
    "base.en",
    "small",
    "small.en",
    "medium",
    "medium.en",
    "large-v1",
    "large-v2",
    "large-v3",
    "large-v3-turbo",
];

/// Default model size when the user doesn't pick one.
pub const DEFAULT_MODEL_SIZE: &str = "small";

pub fn is_known_size(name: &str) -> bool {
    MODEL_SIZES.contains(&name)
}

/// The GGML filename for a model size.
pub fn ggml_filename(size: &str) -> String {
    format!("ggml-{size}.bin")
}

/// The directory model files are resolved from.
pub fn models_dir() -> PathBuf {
    match std::env::var_os(MODEL_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => PathBuf::from(DEFAULT_MODEL_DIR),
    }
}

/// Resolve a model selector (size name or explicit path) to a file path.
///
/// The returned path is not guaranteed to exist; engine availability probes check
/// that separately so they can report a useful hint.
pub fn resolve_model(selector: &str) -> PathBuf {
    resolve_model_in(selector, &models_dir())
}

/// Resolution logic behind [`resolve_model`], parameterized for testing.
pub(crate) fn resolve_model_in(selector: &str, dir: &Path) -> PathBuf {
    if is_known_size(selector) {
        return dir.join(ggml_filename(selector));
    }
    // Anything else is treated as a path to a model file.
    PathBuf::from(selector)
}

/// A hint for the user when a model file is missing.
pub fn missing_model_hint(selector: &str, resolved: &Path) -> String {
    if is_known_size(selector) {
        format!(
            "model '{selector}' not found at {} (download it with `model-downloader --name {selector}`, \
             or point {MODEL_DIR_ENV} at your models directory)",
            resolved.display()
        )
    } else {
        format!("model file not found: {}", resolved.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_names_resolve_inside_models_dir() {
        let dir = Path::new("/opt/models");
        assert_eq!(
            resolve_model_in("small", dir),
            Path::new("/opt/models/ggml-small.bin")
        );
        assert_eq!(
            resolve_model_in("large-v3-turbo", dir),
            Path::new("/opt/models/ggml-large-v3-turbo.bin")
        );
    }

    #[test]
    fn explicit_paths_pass_through() {
        let dir = Path::new("/opt/models");
        assert_eq!(
            resolve_model_in("/srv/whisper/custom.bin", dir),
            Path::new("/srv/whisper/custom.bin")
        );
        assert_eq!(
            resolve_model_in("./ggml-base.bin", dir),
            Path::new("./ggml-base.bin")
        );
    }

    #[test]
    fn allowlist_contains_the_default() {
        assert!(is_known_size(DEFAULT_MODEL_SIZE));
        assert!(!is_known_size("gigantic"));
    }

    #[test]
    fn missing_model_hint_mentions_downloader_for_known_sizes() {
        let hint = missing_model_hint("small", Path::new("./models/ggml-small.bin"));
        assert!(hint.contains("model-downloader"));
        assert!(hint.contains("ggml-small.bin"));

        let hint = missing_model_hint("/x/y.bin", Path::new("/x/y.bin"));
        assert!(!hint.contains("model-downloader"));
    }
}
