//! Normalisation of the contact identifiers OTPs are keyed on, plus the small
//! formatting helpers used in OTP messages.

use rand::Rng;
use std::time::Duration;
use validator::ValidateEmail;

/// Trim and lower-case an email address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    email.validate_email()
}

/// Digits only. Used to key phone OTP records.
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Format a phone number to E.164 using `country_code` for national numbers.
///
/// Accepts 10 to 15 digits after stripping punctuation. A leading trunk `0`
/// is replaced by the country code, a number already starting with the
/// country code is kept, and a bare mobile subscriber number (leading `8`)
/// is prefixed with the country code.
pub fn format_phone_number(phone: &str, country_code: &str) -> Result<String, String> {
    let digits = normalize_phone(phone);

    if digits.len() < 10 || digits.len() > 15 {
        return Err(format!("Invalid phone number length: {}", digits.len()));
    }

    if let Some(rest) = digits.strip_prefix('0') {
        return Ok(format!("+{}{}", country_code, rest));
    }
    if digits.starts_with(country_code) {
        return Ok(format!("+{}", digits));
    }
    if digits.starts_with('8') {
        return Ok(format!("+{}{}", country_code, digits));
    }

    Err("Invalid phone number format".to_string())
}

/// Human wording of an OTP validity window, e.g. "45 seconds", "1 minutes".
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{} seconds", secs)
    } else if secs < 3600 {
        format!("{} minutes", secs / 60)
    } else {
        format!("{} hours", secs / 3600)
    }
}

/// Random numeric code of `length` digits, leading zeros allowed.
pub fn generate_otp(length: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..length)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_normalisation() {
        assert_eq!(normalize_email("  A@X.Com "), "a@x.com");
        assert!(is_valid_email("a@x.com"));
        assert!(!is_valid_email("not-an-email"));
    }

    #[test]
    fn phone_normalisation_keeps_digits() {
        assert_eq!(normalize_phone("+62 812-3456-7890"), "6281234567890");
    }

    #[test]
    fn phone_formatting_rules() {
        assert_eq!(format_phone_number("081234567890", "62").unwrap(), "+6281234567890");
        assert_eq!(format_phone_number("+62 812 3456 7890", "62").unwrap(), "+6281234567890");
        assert_eq!(format_phone_number("81234567890", "62").unwrap(), "+6281234567890");
        assert!(format_phone_number("12345", "62").is_err());
        assert!(format_phone_number("71234567890", "62").is_err());
    }

    #[test]
    fn duration_wording() {
        assert_eq!(format_duration(Duration::from_secs(60)), "1 minutes");
        assert_eq!(format_duration(Duration::from_secs(45)), "45 seconds");
        assert_eq!(format_duration(Duration::from_secs(15 * 60)), "15 minutes");
        assert_eq!(format_duration(Duration::from_secs(2 * 3600)), "2 hours");
    }

    #[test]
    fn otp_has_requested_length_and_only_digits() {
        let code = generate_otp(6);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
    }
}
