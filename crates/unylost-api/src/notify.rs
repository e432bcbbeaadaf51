use rand::Rng;
use tracing::info;

/// Outgoing user notifications. Delivery providers are not wired in; every
/// message is written to the log so codes can be read during development.
#[derive(Debug, Default, Clone)]
pub struct Notifier;

impl Notifier {
    pub fn send_verification_email(&self, to: &str, code: &str) {
        info!(
            to,
            subject = "Kode Verifikasi untuk Akun UNY Lost App Anda",
            "Verification email queued (code {})",
            code
        );
    }

    pub fn send_password_reset(&self, to: &str, token: &str) {
        info!(to, "Password reset requested (token {})", token);
    }

    /// Sends a fresh WhatsApp verification code and returns it.
    pub fn send_whatsapp_code(&self, phone: &str) -> String {
        let code = verification_code();
        info!(
            phone = %normalize_phone(phone),
            "WhatsApp verification code {} queued",
            code
        );
        code
    }
}

/// Six decimal digits, never starting with zero.
pub fn verification_code() -> String {
    rand::rng().random_range(100_000..1_000_000).to_string()
}

/// Strips non-digits and rewrites a leading `0` to the `62` country code.
pub fn normalize_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.strip_prefix('0') {
        Some(rest) => format!("62{}", rest),
        None => digits,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_phone() {
        assert_eq!(normalize_phone("0812-3456-7890"), "6281234567890");
        assert_eq!(normalize_phone("+62 812 3456 7890"), "6281234567890");
        assert_eq!(normalize_phone("6281234567890"), "6281234567890");
    }

    #[test]
    fn test_verification_code_is_six_digits() {
        for _ in 0..100 {
            let code = verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert!(!code.starts_with('0'));
        }
    }
}
