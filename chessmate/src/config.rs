//! Backend endpoint configuration.
//!
//! Priority:
//! 1. CHESSMATE_BACKEND_URL env variable if set
//! 2. http://localhost:5000 (development default)

const DEFAULT_BACKEND_URL: &str = "http://localhost:5000";

pub fn backend_url() -> String {
    std::env::var("CHESSMATE_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_url_has_a_value() {
        // Either the env var or the default; never empty
        assert!(!backend_url().is_empty());
    }
}
